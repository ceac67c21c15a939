use cellpotts_space::CellSpace;

use super::{ModelView, Penalty, PenaltyError, Proposal, TypeScales, quadratic_change};
use crate::table::CellTable;
use crate::{CellId, MEDIUM};

/// Quadratic pull of each cell's volume toward its desired volume.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumePenalty {
    scales: TypeScales,
}

impl VolumePenalty {
    /// One coefficient per cell type, medium excluded.
    pub fn new(per_type: &[f64]) -> Result<Self, PenaltyError> {
        Ok(Self {
            scales: TypeScales::new(per_type)?,
        })
    }

    fn term(&self, table: &CellTable, id: CellId, change: f64) -> f64 {
        if id == MEDIUM {
            return 0.0;
        }
        let i = id as usize;
        quadratic_change(
            self.scales.get(table.type_of(id)),
            f64::from(table.volumes()[i]),
            f64::from(table.desired_volumes()[i]),
            change,
        )
    }
}

impl Penalty for VolumePenalty {
    fn kind(&self) -> &'static str {
        "Volume"
    }

    fn attach(&mut self, _space: &CellSpace, table: &CellTable) -> Result<(), PenaltyError> {
        self.scales.check(self.kind(), table)
    }

    fn delta(&self, view: &ModelView<'_>, proposal: &Proposal) -> f64 {
        self.term(view.table, proposal.old, -1.0) + self.term(view.table, proposal.new, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::penalty::fixtures::Fixture;

    #[test]
    fn growth_toward_target_is_favoured() {
        // Cell 1 has volume 1 and wants 4.
        let fixture = Fixture::new(&[(3, 3, 1)]);
        let penalty = VolumePenalty::new(&[5.0, 1.0]).expect("penalty");
        let grow = Proposal {
            location: fixture.loc(4, 3),
            old: MEDIUM,
            new: 1,
        };
        // 5 * ((2 - 4)^2 - (1 - 4)^2) = 5 * (4 - 9)
        assert_eq!(penalty.delta(&fixture.view(0), &grow), -25.0);
    }

    #[test]
    fn exchange_between_cells_counts_both_sides() {
        let fixture = Fixture::new(&[(3, 3, 1), (4, 3, 1), (5, 3, 2)]);
        let penalty = VolumePenalty::new(&[2.0, 3.0]).expect("penalty");
        let proposal = Proposal {
            location: fixture.loc(4, 3),
            old: 1,
            new: 2,
        };
        // Loser: 2 * ((1 - 4)^2 - (2 - 4)^2) = 10; gainer: 3 * ((2 - 4)^2 - (1 - 4)^2) = -15.
        assert_eq!(penalty.delta(&fixture.view(0), &proposal), -5.0);
    }

    #[test]
    fn zero_scale_types_are_free() {
        let fixture = Fixture::new(&[(3, 3, 2)]);
        let penalty = VolumePenalty::new(&[5.0, 0.0]).expect("penalty");
        let proposal = Proposal {
            location: fixture.loc(4, 3),
            old: MEDIUM,
            new: 2,
        };
        assert_eq!(penalty.delta(&fixture.view(0), &proposal), 0.0);
    }
}
