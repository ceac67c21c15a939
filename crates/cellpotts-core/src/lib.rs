//! Core types for the Cellular Potts workspace: the cell table, occupancy grid,
//! penalties and the Metropolis stepper that ties them together.

pub mod config;
pub mod connectivity;
pub mod geometry;
pub mod grid;
pub mod model;
pub mod penalty;
pub mod placement;
pub mod table;

use serde::{Deserialize, Serialize};

pub use cellpotts_space::{Boundary, CellSpace, Neighborhood, SpaceConfig, SpaceError};
pub use config::PottsConfig;
pub use grid::{BoundarySet, Occupancy};
pub use model::{CellPotts, ModelError, MoveOutcome, MoveStats, SweepSummary, run_replicates};
pub use penalty::{
    AdhesionPenalty, MigrationPenalty, ModelView, Penalty, PenaltyError, PenaltySpec,
    PerimeterPenalty, Proposal, VolumePenalty,
};
pub use placement::{POSITIONS, PlacementError};
pub use table::{
    CellRecord, CellRow, CellTable, PropertyColumn, PropertyKind, PropertyScope, PropertyValue,
    TableError,
};

/// Row index into the cell table; also the value stored in the occupancy grid.
pub type CellId = u32;
/// Index into the registered type names; 0 is medium.
pub type TypeId = u32;

/// Id of the background pseudo-cell.
pub const MEDIUM: CellId = 0;
/// Reserved name of the medium type.
pub const MEDIUM_NAME: &str = "Medium";

/// Number of completed sweeps.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Step(pub u64);

impl Step {
    /// Returns the next sequential step.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}
