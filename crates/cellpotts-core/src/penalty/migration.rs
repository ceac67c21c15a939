use cellpotts_space::CellSpace;

use super::{ModelView, Penalty, PenaltyError, Proposal, TypeScales};
use crate::table::CellTable;
use crate::{CellId, MEDIUM};

/// Activity-driven protrusion (the "Act" model).
///
/// A location claimed by a cell whose type has a positive coefficient becomes
/// fully active and loses one unit of activity after every elementary move.
/// Moves that extend a cell from highly active regions are rewarded. Activity
/// is stored as the move at which it was last set, so decay costs nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPenalty {
    max_act: u32,
    scales: TypeScales,
    /// `moves + 1` when the location was last activated; 0 means inactive.
    stamps: Vec<u64>,
}

impl MigrationPenalty {
    pub fn new(max_act: u32, per_type: &[f64]) -> Result<Self, PenaltyError> {
        if max_act == 0 {
            return Err(PenaltyError::InvalidConfig("max_act must be positive"));
        }
        Ok(Self {
            max_act,
            scales: TypeScales::new(per_type)?,
            stamps: Vec::new(),
        })
    }

    #[must_use]
    pub fn max_act(&self) -> u32 {
        self.max_act
    }

    /// Activity of `loc` once `moves` elementary moves have been attempted.
    #[must_use]
    pub fn activity(&self, loc: usize, moves: u64) -> u32 {
        let stamp = self.stamps.get(loc).copied().unwrap_or(0);
        if stamp == 0 {
            return 0;
        }
        let age = (moves + 1).saturating_sub(stamp);
        u64::from(self.max_act).saturating_sub(age) as u32
    }

    /// Geometric mean of the activities at `locs`; zero if any of them is inactive.
    fn geometric_mean(&self, locs: impl Iterator<Item = usize>, moves: u64) -> f64 {
        let mut count = 0u32;
        let mut log_sum = 0.0;
        for loc in locs {
            let activity = self.activity(loc, moves);
            if activity == 0 {
                return 0.0;
            }
            log_sum += f64::from(activity).ln();
            count += 1;
        }
        if count == 0 {
            0.0
        } else {
            (log_sum / f64::from(count)).exp()
        }
    }

    fn owned_neighbors<'a>(
        view: &'a ModelView<'_>,
        loc: usize,
        id: CellId,
    ) -> impl Iterator<Item = usize> + 'a {
        let ids = view.occupancy.ids();
        view.space
            .neighbors(loc)
            .iter()
            .copied()
            .filter(move |&n| ids[n] == id)
    }
}

impl Penalty for MigrationPenalty {
    fn kind(&self) -> &'static str {
        "Migration"
    }

    fn attach(&mut self, space: &CellSpace, table: &CellTable) -> Result<(), PenaltyError> {
        self.scales.check(self.kind(), table)?;
        self.stamps = vec![0; space.len()];
        Ok(())
    }

    fn delta(&self, view: &ModelView<'_>, proposal: &Proposal) -> f64 {
        let moves = view.moves;
        let loc = proposal.location;
        let table = view.table;

        let pull = if proposal.new == MEDIUM {
            0.0
        } else {
            let scale = self.scales.get(table.type_of(proposal.new));
            if scale == 0.0 {
                0.0
            } else {
                scale
                    * self.geometric_mean(Self::owned_neighbors(view, loc, proposal.new), moves)
            }
        };
        let hold = if proposal.old == MEDIUM {
            0.0
        } else {
            let scale = self.scales.get(table.type_of(proposal.old));
            if scale == 0.0 {
                0.0
            } else {
                let region =
                    std::iter::once(loc).chain(Self::owned_neighbors(view, loc, proposal.old));
                scale * self.geometric_mean(region, moves)
            }
        };
        -(pull - hold) / f64::from(self.max_act)
    }

    fn on_commit(&mut self, view: &ModelView<'_>, proposal: &Proposal) {
        let active = proposal.new != MEDIUM
            && self.scales.get(view.table.type_of(proposal.new)) > 0.0;
        if let Some(stamp) = self.stamps.get_mut(proposal.location) {
            *stamp = if active { view.moves + 1 } else { 0 };
        }
    }
}
