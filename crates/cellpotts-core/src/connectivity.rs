//! Local topology filter applied to every proposal before its energy is computed.
//!
//! Only the 3^d box around the proposed location is inspected. For the cell
//! losing the location, all of its neighbors of that location must stay in a
//! single component of the box once the centre is gone; any path through the
//! centre can then be rerouted inside the box, so an accepted move never splits
//! a cell. For the cell gaining the location the same must already hold,
//! otherwise claiming the centre could close a loop around foreign locations.
//! On fixed axes the gaining cell is treated as owning the positions past the
//! edge, so a loop closed against the wall counts as well.
//! The rule is conservative: some moves a global flood fill would allow are
//! rejected. Medium is exempt on both sides.

use cellpotts_space::CellSpace;

use crate::grid::Occupancy;
use crate::{CellId, MEDIUM};

/// How an owner's neighbors of a location are linked inside the local box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalLinks {
    /// The owner has no neighbor of the location.
    Isolated,
    /// All neighbors lie in one component of the box, centre excluded.
    Joined,
    /// The neighbors fall into two or more local components.
    Split,
}

/// Classify how `owner`'s neighbors of `loc` connect without passing through `loc`.
///
/// Positions past a fixed edge count as foreign.
#[must_use]
pub fn local_links(
    space: &CellSpace,
    occupancy: &Occupancy,
    loc: usize,
    owner: CellId,
) -> LocalLinks {
    classify(space, occupancy, loc, owner, false)
}

fn classify(
    space: &CellSpace,
    occupancy: &Occupancy,
    loc: usize,
    owner: CellId,
    owns_walls: bool,
) -> LocalLinks {
    let center = space.box_center();
    let mut owned = 0u32;
    for index in 0..space.box_len() {
        if index == center {
            continue;
        }
        let held = match space.box_location(loc, index) {
            Some(n) => occupancy.get(n) == owner,
            None => owns_walls,
        };
        if held {
            owned |= 1 << index;
        }
    }

    let required = owned & space.neighbor_box_mask();
    if required == 0 {
        return LocalLinks::Isolated;
    }

    let mut reached = 1u32 << required.trailing_zeros();
    let mut frontier = reached;
    while frontier != 0 {
        let mut next = 0u32;
        let mut pending = frontier;
        while pending != 0 {
            let index = pending.trailing_zeros() as usize;
            pending &= pending - 1;
            next |= space.box_adjacency(index) & owned;
        }
        frontier = next & !reached;
        reached |= next;
    }

    if required & !reached == 0 {
        LocalLinks::Joined
    } else {
        LocalLinks::Split
    }
}

/// Whether handing `loc` to `new` keeps both affected cells locally connected.
///
/// A cell may only give up its last location when `allow_cell_death` is set.
#[must_use]
pub fn preserves_connectivity(
    space: &CellSpace,
    occupancy: &Occupancy,
    loc: usize,
    new: CellId,
    allow_cell_death: bool,
) -> bool {
    let old = occupancy.get(loc);
    if old != MEDIUM {
        match local_links(space, occupancy, loc, old) {
            LocalLinks::Joined => {}
            LocalLinks::Isolated if allow_cell_death => {}
            LocalLinks::Isolated | LocalLinks::Split => return false,
        }
    }
    if new != MEDIUM && classify(space, occupancy, loc, new, true) == LocalLinks::Split {
        return false;
    }
    true
}
