//! Energy terms evaluated for every proposed ownership change.

mod adhesion;
mod migration;
mod perimeter;
mod volume;

use std::fmt;

use cellpotts_space::CellSpace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::Occupancy;
use crate::table::CellTable;
use crate::{CellId, Step, TypeId};

pub use adhesion::AdhesionPenalty;
pub use migration::MigrationPenalty;
pub use perimeter::PerimeterPenalty;
pub use volume::VolumePenalty;

/// Errors raised while building or attaching a penalty.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PenaltyError {
    #[error("invalid penalty parameters: {0}")]
    InvalidConfig(&'static str),
    /// Parameters were sized for a different number of cell types.
    #[error("{penalty} penalty has parameters for {expected} cell types but the table has {actual}")]
    TypeCountMismatch {
        penalty: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// A proposed change of ownership for one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub location: usize,
    /// Current owner.
    pub old: CellId,
    /// Candidate owner taken from a neighbor.
    pub new: CellId,
}

/// Read-only model state handed to penalties.
#[derive(Debug, Clone, Copy)]
pub struct ModelView<'a> {
    pub space: &'a CellSpace,
    pub occupancy: &'a Occupancy,
    pub table: &'a CellTable,
    /// Completed sweeps.
    pub step: Step,
    /// Elementary moves attempted so far, the current one included.
    pub moves: u64,
}

/// Energy contribution of one term of the Hamiltonian.
///
/// `delta` is evaluated before the move is applied; `on_commit` runs after the
/// grid and table reflect an accepted move.
pub trait Penalty: Send + Sync + fmt::Debug {
    /// Static identifier used in summaries.
    fn kind(&self) -> &'static str;

    /// Size per-location state and check per-type parameters against the table.
    fn attach(&mut self, _space: &CellSpace, _table: &CellTable) -> Result<(), PenaltyError> {
        Ok(())
    }

    /// Energy change if `proposal` were applied.
    fn delta(&self, view: &ModelView<'_>, proposal: &Proposal) -> f64;

    fn on_commit(&mut self, _view: &ModelView<'_>, _proposal: &Proposal) {}

    /// Called once after each completed sweep.
    fn on_sweep(&mut self, _view: &ModelView<'_>) {}
}

/// Per-type coefficients with medium fixed at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeScales(Vec<f64>);

impl TypeScales {
    /// One coefficient per cell type, in type id order starting at 1.
    pub fn new(per_type: &[f64]) -> Result<Self, PenaltyError> {
        if per_type.is_empty() {
            return Err(PenaltyError::InvalidConfig(
                "at least one per-type coefficient is required",
            ));
        }
        if per_type.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(PenaltyError::InvalidConfig(
                "coefficients must be finite and non-negative",
            ));
        }
        let mut scales = Vec::with_capacity(per_type.len() + 1);
        scales.push(0.0);
        scales.extend_from_slice(per_type);
        Ok(Self(scales))
    }

    #[inline]
    #[must_use]
    pub fn get(&self, type_id: TypeId) -> f64 {
        self.0.get(type_id as usize).copied().unwrap_or(0.0)
    }

    /// Number of cell types covered, medium excluded.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.0.len() - 1
    }

    fn check(&self, penalty: &'static str, table: &CellTable) -> Result<(), PenaltyError> {
        if self.type_count() != table.type_count() {
            return Err(PenaltyError::TypeCountMismatch {
                penalty,
                expected: self.type_count(),
                actual: table.type_count(),
            });
        }
        Ok(())
    }
}

/// Serializable description of a penalty, used by scenario files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PenaltySpec {
    /// Square matrix over medium plus every cell type.
    Adhesion { matrix: Vec<Vec<f64>> },
    Volume { scales: Vec<f64> },
    Perimeter { scales: Vec<f64> },
    Migration { max_act: u32, scales: Vec<f64> },
}

impl PenaltySpec {
    pub fn build(&self) -> Result<Box<dyn Penalty>, PenaltyError> {
        Ok(match self {
            PenaltySpec::Adhesion { matrix } => Box::new(AdhesionPenalty::new(matrix.clone())?),
            PenaltySpec::Volume { scales } => Box::new(VolumePenalty::new(scales)?),
            PenaltySpec::Perimeter { scales } => Box::new(PerimeterPenalty::new(scales)?),
            PenaltySpec::Migration { max_act, scales } => {
                Box::new(MigrationPenalty::new(*max_act, scales)?)
            }
        })
    }
}

/// Energy change of a quadratic `scale * (value - target)^2` term when `value` moves by `change`.
#[inline]
pub(crate) fn quadratic_change(scale: f64, value: f64, target: f64, change: f64) -> f64 {
    let before = value - target;
    let after = before + change;
    scale * (after * after - before * before)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_pin_medium_to_zero() {
        let scales = TypeScales::new(&[5.0, 2.5]).expect("scales");
        assert_eq!(scales.get(0), 0.0);
        assert_eq!(scales.get(1), 5.0);
        assert_eq!(scales.get(2), 2.5);
        assert_eq!(scales.type_count(), 2);
    }

    #[test]
    fn negative_scales_are_rejected() {
        assert!(matches!(
            TypeScales::new(&[1.0, -1.0]),
            Err(PenaltyError::InvalidConfig(_))
        ));
        assert!(TypeScales::new(&[]).is_err());
        assert!(TypeScales::new(&[f64::NAN]).is_err());
    }

    #[test]
    fn specs_parse_from_json() {
        let raw = r#"[
            {"kind": "adhesion", "matrix": [[0, 20], [20, 0]]},
            {"kind": "volume", "scales": [5]},
            {"kind": "migration", "max_act": 50, "scales": [10]}
        ]"#;
        let specs: Vec<PenaltySpec> = serde_json::from_str(raw).expect("parse");
        let kinds: Vec<&str> = specs
            .iter()
            .map(|spec| spec.build().expect("build").kind())
            .collect();
        assert_eq!(kinds, vec!["Adhesion", "Volume", "Migration"]);
    }

    #[test]
    fn quadratic_change_matches_expansion() {
        // (3 + 1 - 5)^2 - (3 - 5)^2 = 1 - 4
        assert_eq!(quadratic_change(2.0, 3.0, 5.0, 1.0), -6.0);
        assert_eq!(quadratic_change(1.0, 5.0, 5.0, -1.0), 1.0);
    }
}
