//! Seeding cells onto the grid and growing them toward their desired volumes.

use std::collections::VecDeque;

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::model::{CellPotts, ModelError};
use crate::table::PropertyKind;
use crate::{CellId, MEDIUM};

/// Name of the property column read by [`CellPotts::position_cells`].
pub const POSITIONS: &str = "positions";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("no `{POSITIONS}` property column")]
    MissingPositions,
    #[error("`{POSITIONS}` holds {0:?} values, not positions")]
    NotPositions(PropertyKind),
    #[error("cell {id} position {coords:?} is not on the grid")]
    OutOfBounds { id: CellId, coords: Vec<usize> },
    #[error("cell {id} would be seeded on a location owned by cell {owner}")]
    Occupied { id: CellId, owner: CellId },
    #[error("not enough free locations to seed {needed} cells ({available} available)")]
    NoRoom { needed: usize, available: usize },
}

impl CellPotts {
    /// Seed every unplaced cell at its `positions` value and grow it outwards.
    ///
    /// Cells without a value, or already holding locations, are skipped.
    /// Returns the number of cells seeded.
    pub fn position_cells(&mut self) -> Result<usize, ModelError> {
        let column = self
            .table()
            .property(POSITIONS)
            .ok_or(PlacementError::MissingPositions)?;
        let positions = column
            .positions()
            .ok_or(PlacementError::NotPositions(column.kind()))?;

        let mut seeds: Vec<(CellId, usize)> = Vec::new();
        for id in self.table().cell_ids() {
            let Some(coords) = &positions[id as usize] else {
                continue;
            };
            if self.table().volumes()[id as usize] > 0 {
                continue;
            }
            let loc = self
                .space()
                .location(coords)
                .ok_or_else(|| PlacementError::OutOfBounds {
                    id,
                    coords: coords.clone(),
                })?;
            let owner = self.occupancy().get(loc);
            if owner != MEDIUM {
                return Err(PlacementError::Occupied { id, owner }.into());
            }
            if let Some(&(other, _)) = seeds.iter().find(|&&(_, seeded)| seeded == loc) {
                return Err(PlacementError::Occupied { id, owner: other }.into());
            }
            seeds.push((id, loc));
        }

        self.grow(&seeds);
        debug!(seeded = seeds.len(), "cells positioned from properties");
        Ok(seeds.len())
    }

    /// Seed every unplaced cell at a random medium location and grow it outwards.
    pub fn position_cells_random(&mut self) -> Result<usize, ModelError> {
        let unplaced: Vec<CellId> = self
            .table()
            .cell_ids()
            .filter(|&id| self.table().volumes()[id as usize] == 0)
            .collect();
        let mut free: Vec<usize> = self.occupancy().locations_of(MEDIUM).collect();
        if free.len() < unplaced.len() {
            return Err(PlacementError::NoRoom {
                needed: unplaced.len(),
                available: free.len(),
            }
            .into());
        }

        let mut seeds = Vec::with_capacity(unplaced.len());
        for (i, id) in unplaced.into_iter().enumerate() {
            let pick = self.rng().random_range(i..free.len());
            free.swap(i, pick);
            seeds.push((id, free[i]));
        }

        self.grow(&seeds);
        debug!(seeded = seeds.len(), "cells positioned at random");
        Ok(seeds.len())
    }

    /// Claim one medium location per cell per round, breadth first from each seed.
    fn grow(&mut self, seeds: &[(CellId, usize)]) {
        let mut fronts: Vec<VecDeque<usize>> = Vec::with_capacity(seeds.len());
        let mut sizes = vec![1u32; seeds.len()];
        for &(id, loc) in seeds {
            self.place(loc, id);
            fronts.push(VecDeque::from([loc]));
        }

        let targets: Vec<u32> = seeds
            .iter()
            .map(|&(id, _)| self.table().desired_volumes()[id as usize])
            .collect();
        let mut progressed = true;
        while progressed {
            progressed = false;
            for (i, &(id, _)) in seeds.iter().enumerate() {
                if sizes[i] >= targets[i] {
                    continue;
                }
                while let Some(&loc) = fronts[i].front() {
                    let free = self
                        .space()
                        .neighbors(loc)
                        .iter()
                        .copied()
                        .find(|&n| self.occupancy().get(n) == MEDIUM);
                    if let Some(n) = free {
                        self.place(n, id);
                        fronts[i].push_back(n);
                        sizes[i] += 1;
                        progressed = true;
                        break;
                    }
                    fronts[i].pop_front();
                }
            }
        }
        self.recount_geometry();
    }
}
