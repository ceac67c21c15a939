//! Volume and perimeter bookkeeping shared by penalties and the stepper.

use cellpotts_space::CellSpace;

use crate::table::CellTable;
use crate::{CellId, MEDIUM};

/// Minimal perimeter of a region of `volume` locations.
///
/// Perimeter is counted as neighbor pairs with a different owner under the
/// Moore neighborhood; a compact square of side `s` scores `12s - 4`.
#[must_use]
pub fn estimate_perimeter(volume: u32) -> u32 {
    if volume == 0 {
        return 0;
    }
    (12.0 * f64::from(volume).sqrt() - 4.0).floor() as u32
}

/// Perimeter changes of the two cells involved in a proposed ownership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerimeterChange {
    /// Change for the cell losing the location.
    pub old: i64,
    /// Change for the cell gaining the location.
    pub new: i64,
}

/// Local perimeter changes if `loc` moved from `old` to `new`.
///
/// The losing cell drops the location's foreign edges and gains one edge per
/// own neighbor; the gaining cell does the reverse. Edges of third cells are
/// unaffected.
#[must_use]
pub fn perimeter_change(
    space: &CellSpace,
    ids: &[CellId],
    loc: usize,
    old: CellId,
    new: CellId,
) -> PerimeterChange {
    let mut old_same = 0i64;
    let mut new_same = 0i64;
    let neighbors = space.neighbors(loc);
    for &n in neighbors {
        let owner = ids[n];
        if owner == old {
            old_same += 1;
        } else if owner == new {
            new_same += 1;
        }
    }
    let total = neighbors.len() as i64;
    PerimeterChange {
        old: old_same - (total - old_same),
        new: (total - new_same) - new_same,
    }
}

/// Number of neighbors of `loc` owned by someone other than its owner.
#[inline]
#[must_use]
pub fn foreign_neighbors(space: &CellSpace, ids: &[CellId], loc: usize) -> u32 {
    let owner = ids[loc];
    space
        .neighbors(loc)
        .iter()
        .filter(|&&n| ids[n] != owner)
        .count() as u32
}

/// Recount every volume and perimeter from scratch. Medium keeps a zero perimeter.
pub fn recount(space: &CellSpace, ids: &[CellId], table: &mut CellTable) {
    table.clear_geometry();
    for loc in 0..space.len() {
        let owner = ids[loc] as usize;
        table.volumes_mut()[owner] += 1;
        if owner != MEDIUM as usize {
            table.perimeters_mut()[owner] += foreign_neighbors(space, ids, loc);
        }
    }
}
