//! Dense ownership map and the set of locations on a cell boundary.

use cellpotts_space::CellSpace;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{CellId, MEDIUM};

/// Owner id of every grid location; 0 is medium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    ids: Vec<CellId>,
}

impl Occupancy {
    /// A grid of `len` medium locations.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            ids: vec![MEDIUM; len],
        }
    }

    /// Wrap an existing id array.
    #[must_use]
    pub fn from_ids(ids: Vec<CellId>) -> Self {
        Self { ids }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, loc: usize) -> CellId {
        self.ids[loc]
    }

    /// Flat id array in location order, for rendering.
    #[must_use]
    pub fn ids(&self) -> &[CellId] {
        &self.ids
    }

    #[inline]
    pub(crate) fn set(&mut self, loc: usize, id: CellId) {
        self.ids[loc] = id;
    }

    /// Number of locations owned by `id`.
    #[must_use]
    pub fn count(&self, id: CellId) -> usize {
        self.ids.iter().filter(|&&owner| owner == id).count()
    }

    /// Locations owned by `id` in ascending order.
    pub fn locations_of(&self, id: CellId) -> impl Iterator<Item = usize> + '_ {
        self.ids
            .iter()
            .enumerate()
            .filter(move |&(_, &owner)| owner == id)
            .map(|(loc, _)| loc)
    }

    /// Hand `id`'s locations to medium and shift every higher id down by one.
    pub(crate) fn release(&mut self, id: CellId) {
        debug_assert_ne!(id, MEDIUM);
        for owner in &mut self.ids {
            if *owner == id {
                *owner = MEDIUM;
            } else if *owner > id {
                *owner -= 1;
            }
        }
    }
}

/// Indexed set of locations with at least one differently-owned neighbor.
///
/// Insert, remove and uniform sampling are O(1).
#[derive(Debug, Clone, Default)]
pub struct BoundarySet {
    members: Vec<usize>,
    slots: Vec<usize>,
}

const ABSENT: usize = usize::MAX;

impl BoundarySet {
    /// Build the set for the current occupancy.
    #[must_use]
    pub fn build(space: &CellSpace, occupancy: &Occupancy) -> Self {
        let mut set = Self {
            members: Vec::new(),
            slots: vec![ABSENT; space.len()],
        };
        for loc in 0..space.len() {
            if is_boundary(space, occupancy, loc) {
                set.insert(loc);
            }
        }
        set
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn contains(&self, loc: usize) -> bool {
        self.slots.get(loc).is_some_and(|&slot| slot != ABSENT)
    }

    /// Members in insertion order, perturbed by removals.
    #[must_use]
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    fn insert(&mut self, loc: usize) {
        if self.slots[loc] != ABSENT {
            return;
        }
        self.slots[loc] = self.members.len();
        self.members.push(loc);
    }

    fn remove(&mut self, loc: usize) {
        let slot = self.slots[loc];
        if slot == ABSENT {
            return;
        }
        self.members.swap_remove(slot);
        if let Some(&moved) = self.members.get(slot) {
            self.slots[moved] = slot;
        }
        self.slots[loc] = ABSENT;
    }

    /// Draw a member uniformly; `None` when empty.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.members.is_empty() {
            return None;
        }
        Some(self.members[rng.random_range(0..self.members.len())])
    }

    /// Re-evaluate `loc` and its neighbors after `loc` changed owner.
    pub fn refresh(&mut self, space: &CellSpace, occupancy: &Occupancy, loc: usize) {
        self.update(space, occupancy, loc);
        for &n in space.neighbors(loc) {
            self.update(space, occupancy, n);
        }
    }

    fn update(&mut self, space: &CellSpace, occupancy: &Occupancy, loc: usize) {
        if is_boundary(space, occupancy, loc) {
            self.insert(loc);
        } else {
            self.remove(loc);
        }
    }
}

/// True when some neighbor of `loc` has a different owner.
#[inline]
#[must_use]
pub fn is_boundary(space: &CellSpace, occupancy: &Occupancy, loc: usize) -> bool {
    let owner = occupancy.get(loc);
    space
        .neighbors(loc)
        .iter()
        .any(|&n| occupancy.get(n) != owner)
}
