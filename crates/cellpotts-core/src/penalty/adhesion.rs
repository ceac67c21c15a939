use cellpotts_space::CellSpace;

use super::{ModelView, Penalty, PenaltyError, Proposal};
use crate::TypeId;
use crate::table::CellTable;

/// Contact energy between neighboring locations owned by different cells.
///
/// The matrix is indexed by type id with medium at 0.
#[derive(Debug, Clone, PartialEq)]
pub struct AdhesionPenalty {
    size: usize,
    weights: Vec<f64>,
}

impl AdhesionPenalty {
    /// Build from a square, symmetric, non-negative matrix covering medium and every cell type.
    pub fn new(matrix: Vec<Vec<f64>>) -> Result<Self, PenaltyError> {
        let size = matrix.len();
        if size < 2 {
            return Err(PenaltyError::InvalidConfig(
                "adhesion matrix must cover medium and at least one cell type",
            ));
        }
        if matrix.iter().any(|row| row.len() != size) {
            return Err(PenaltyError::InvalidConfig("adhesion matrix must be square"));
        }
        let mut weights = Vec::with_capacity(size * size);
        for row in &matrix {
            weights.extend_from_slice(row);
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(PenaltyError::InvalidConfig(
                "adhesion weights must be finite and non-negative",
            ));
        }
        for i in 0..size {
            for j in (i + 1)..size {
                if weights[i * size + j] != weights[j * size + i] {
                    return Err(PenaltyError::InvalidConfig(
                        "adhesion matrix must be symmetric",
                    ));
                }
            }
        }
        Ok(Self { size, weights })
    }

    #[inline]
    #[must_use]
    pub fn weight(&self, a: TypeId, b: TypeId) -> f64 {
        self.weights[a as usize * self.size + b as usize]
    }
}

impl Penalty for AdhesionPenalty {
    fn kind(&self) -> &'static str {
        "Adhesion"
    }

    fn attach(&mut self, _space: &CellSpace, table: &CellTable) -> Result<(), PenaltyError> {
        if self.size - 1 != table.type_count() {
            return Err(PenaltyError::TypeCountMismatch {
                penalty: self.kind(),
                expected: self.size - 1,
                actual: table.type_count(),
            });
        }
        Ok(())
    }

    fn delta(&self, view: &ModelView<'_>, proposal: &Proposal) -> f64 {
        let ids = view.occupancy.ids();
        let table = view.table;
        let old_type = table.type_of(proposal.old);
        let new_type = table.type_of(proposal.new);
        let mut delta = 0.0;
        for &n in view.space.neighbors(proposal.location) {
            let owner = ids[n];
            let owner_type = table.type_of(owner);
            if owner != proposal.new {
                delta += self.weight(new_type, owner_type);
            }
            if owner != proposal.old {
                delta -= self.weight(old_type, owner_type);
            }
        }
        delta
    }
}
