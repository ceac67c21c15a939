use cellpotts_space::CellSpace;

use super::{ModelView, Penalty, PenaltyError, Proposal, TypeScales, quadratic_change};
use crate::geometry::perimeter_change;
use crate::table::CellTable;
use crate::{CellId, MEDIUM};

/// Quadratic pull of each cell's perimeter toward its desired perimeter.
#[derive(Debug, Clone, PartialEq)]
pub struct PerimeterPenalty {
    scales: TypeScales,
}

impl PerimeterPenalty {
    pub fn new(per_type: &[f64]) -> Result<Self, PenaltyError> {
        Ok(Self {
            scales: TypeScales::new(per_type)?,
        })
    }

    fn term(&self, table: &CellTable, id: CellId, change: i64) -> f64 {
        if id == MEDIUM || change == 0 {
            return 0.0;
        }
        let i = id as usize;
        quadratic_change(
            self.scales.get(table.type_of(id)),
            f64::from(table.perimeters()[i]),
            f64::from(table.desired_perimeters()[i]),
            change as f64,
        )
    }
}

impl Penalty for PerimeterPenalty {
    fn kind(&self) -> &'static str {
        "Perimeter"
    }

    fn attach(&mut self, _space: &CellSpace, table: &CellTable) -> Result<(), PenaltyError> {
        self.scales.check(self.kind(), table)
    }

    fn delta(&self, view: &ModelView<'_>, proposal: &Proposal) -> f64 {
        let change = perimeter_change(
            view.space,
            view.occupancy.ids(),
            proposal.location,
            proposal.old,
            proposal.new,
        );
        self.term(view.table, proposal.old, change.old)
            + self.term(view.table, proposal.new, change.new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::penalty::fixtures::Fixture;

    #[test]
    fn delta_tracks_recounted_perimeters() {
        let mut fixture = Fixture::new(&[(3, 3, 1), (4, 3, 1), (5, 3, 2)]);
        let penalty = PerimeterPenalty::new(&[1.5, 0.5]).expect("penalty");
        let energy = |f: &Fixture| {
            (1..f.table.len())
                .map(|i| {
                    let scale = penalty.scales.get(f.table.type_ids()[i]);
                    let diff = f64::from(f.table.perimeters()[i])
                        - f64::from(f.table.desired_perimeters()[i]);
                    scale * diff * diff
                })
                .sum::<f64>()
        };
        let proposal = Proposal {
            location: fixture.loc(4, 4),
            old: MEDIUM,
            new: 2,
        };
        let before = energy(&fixture);
        let delta = penalty.delta(&fixture.view(0), &proposal);
        fixture.apply(proposal.location, proposal.new);
        assert!((energy(&fixture) - before - delta).abs() < 1e-9);
    }

    #[test]
    fn attach_rejects_wrong_type_count() {
        let fixture = Fixture::new(&[]);
        let mut penalty = PerimeterPenalty::new(&[1.0]).expect("penalty");
        assert!(penalty.attach(&fixture.space, &fixture.table).is_err());
    }
}
