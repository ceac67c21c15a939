//! The Metropolis stepper and the model state it drives.

use std::collections::VecDeque;
use std::fmt;

use cellpotts_space::{CellSpace, SpaceError};
use rand::{Rng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::{PottsConfig, validate_temperature};
use crate::connectivity::preserves_connectivity;
use crate::geometry;
use crate::grid::{BoundarySet, Occupancy};
use crate::penalty::{ModelView, Penalty, PenaltyError, Proposal};
use crate::placement::PlacementError;
use crate::table::{CellRecord, CellRow, CellTable, PropertyScope, PropertyValue, TableError};
use crate::{CellId, MEDIUM, Step};

/// Errors raised by model construction and mutation. State is unchanged on error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("occupancy covers {actual} locations but the space has {expected}")]
    GridSizeMismatch { expected: usize, actual: usize },
    #[error("occupancy references cell {0}, which is not in the table")]
    UnknownOwner(CellId),
    /// Penalty parameters are sized when the model is built.
    #[error("cell type `{0}` was not registered when the model was built")]
    UnregisteredType(String),
    /// Tracked geometry disagrees with a full recount.
    #[error("tracked state is inconsistent: {0}")]
    Inconsistent(String),
    #[error(transparent)]
    Space(#[from] SpaceError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Penalty(#[from] PenaltyError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
}

/// Result of a single proposal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
    /// No location lies on a boundary; nothing to propose.
    Idle,
    /// The connectivity filter refused the proposal; no energy was computed.
    Blocked(Proposal),
    Rejected { proposal: Proposal, delta: f64 },
    Accepted { proposal: Proposal, delta: f64 },
}

impl MoveOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, MoveOutcome::Accepted { .. })
    }
}

/// Running proposal counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStats {
    pub attempted: u64,
    pub accepted: u64,
    pub blocked: u64,
    pub rejected: u64,
    pub idle: u64,
}

impl MoveStats {
    /// Fraction of attempted proposals that were accepted.
    #[must_use]
    pub fn acceptance_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempted as f64
        }
    }

    fn since(&self, earlier: &MoveStats) -> MoveStats {
        MoveStats {
            attempted: self.attempted - earlier.attempted,
            accepted: self.accepted - earlier.accepted,
            blocked: self.blocked - earlier.blocked,
            rejected: self.rejected - earlier.rejected,
            idle: self.idle - earlier.idle,
        }
    }
}

/// Summary recorded after every sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub step: Step,
    pub moves: MoveStats,
    pub cell_count: usize,
    pub boundary_len: usize,
    pub temperature: f64,
}

/// A Cellular Potts model: grid, cell table, penalties and stepper state.
pub struct CellPotts {
    config: PottsConfig,
    space: CellSpace,
    occupancy: Occupancy,
    table: CellTable,
    penalties: Vec<Box<dyn Penalty>>,
    boundary: BoundarySet,
    temperature: f64,
    step: Step,
    rng: SmallRng,
    stats: MoveStats,
    candidates: Vec<CellId>,
    history: VecDeque<SweepSummary>,
}

impl fmt::Debug for CellPotts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellPotts")
            .field("dims", &self.space.dims())
            .field("cell_count", &self.table.count_cells())
            .field("penalties", &self.penalty_kinds().collect::<Vec<_>>())
            .field("temperature", &self.temperature)
            .field("step", &self.step)
            .field("stats", &self.stats)
            .finish()
    }
}

impl CellPotts {
    /// Build a model over an all-medium grid. Cells stay unplaced until positioned.
    pub fn new(
        space: CellSpace,
        table: CellTable,
        penalties: Vec<Box<dyn Penalty>>,
        config: PottsConfig,
    ) -> Result<Self, ModelError> {
        let occupancy = Occupancy::new(space.len());
        Self::with_occupancy(space, occupancy, table, penalties, config)
    }

    /// Build a model from an existing ownership grid.
    pub fn with_occupancy(
        space: CellSpace,
        occupancy: Occupancy,
        mut table: CellTable,
        mut penalties: Vec<Box<dyn Penalty>>,
        config: PottsConfig,
    ) -> Result<Self, ModelError> {
        config.validate()?;
        if occupancy.len() != space.len() {
            return Err(ModelError::GridSizeMismatch {
                expected: space.len(),
                actual: occupancy.len(),
            });
        }
        if let Some(&owner) = occupancy.ids().iter().find(|&&id| !table.contains(id)) {
            return Err(ModelError::UnknownOwner(owner));
        }
        for penalty in &mut penalties {
            penalty.attach(&space, &table)?;
        }
        geometry::recount(&space, occupancy.ids(), &mut table);
        let boundary = BoundarySet::build(&space, &occupancy);
        debug!(
            dims = ?space.dims(),
            cells = table.count_cells(),
            penalties = penalties.len(),
            "cellular potts model constructed"
        );
        Ok(Self {
            rng: config.seeded_rng(),
            temperature: config.temperature,
            history: VecDeque::with_capacity(config.history_capacity),
            config,
            space,
            occupancy,
            table,
            penalties,
            boundary,
            step: Step::zero(),
            stats: MoveStats::default(),
            candidates: Vec::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &PottsConfig {
        &self.config
    }

    #[must_use]
    pub fn space(&self) -> &CellSpace {
        &self.space
    }

    #[must_use]
    pub fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }

    #[must_use]
    pub fn table(&self) -> &CellTable {
        &self.table
    }

    #[must_use]
    pub fn boundary(&self) -> &BoundarySet {
        &self.boundary
    }

    pub fn penalties(&self) -> impl Iterator<Item = &dyn Penalty> {
        self.penalties.iter().map(|penalty| &**penalty)
    }

    pub fn penalty_kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.penalties.iter().map(|p| p.kind())
    }

    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f64) -> Result<(), ModelError> {
        validate_temperature(temperature)?;
        self.temperature = temperature;
        Ok(())
    }

    /// Completed sweeps.
    #[must_use]
    pub fn step(&self) -> Step {
        self.step
    }

    #[must_use]
    pub fn stats(&self) -> MoveStats {
        self.stats
    }

    /// Recent sweep summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &SweepSummary> {
        self.history.iter()
    }

    #[must_use]
    pub fn count_cells(&self) -> usize {
        self.table.count_cells()
    }

    #[must_use]
    pub fn count_cell_types(&self) -> usize {
        self.table.count_cell_types()
    }

    /// Mutable access to the model RNG.
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Proposals per sweep: the configured value or the occupied-location count.
    #[must_use]
    pub fn moves_per_step(&self) -> usize {
        self.config.moves_per_step.unwrap_or_else(|| {
            let medium = self.table.volumes()[MEDIUM as usize] as usize;
            (self.space.len() - medium).max(1)
        })
    }

    /// Propose one ownership change and apply it if accepted.
    pub fn attempt_move(&mut self) -> MoveOutcome {
        self.stats.attempted += 1;
        let Some(location) = self.boundary.sample(&mut self.rng) else {
            self.stats.idle += 1;
            return MoveOutcome::Idle;
        };
        let old = self.occupancy.get(location);
        self.candidates.clear();
        for &n in self.space.neighbors(location) {
            let owner = self.occupancy.get(n);
            if owner != old && !self.candidates.contains(&owner) {
                self.candidates.push(owner);
            }
        }
        if self.candidates.is_empty() {
            self.stats.idle += 1;
            return MoveOutcome::Idle;
        }
        let new = self.candidates[self.rng.random_range(0..self.candidates.len())];
        let proposal = Proposal { location, old, new };

        if !preserves_connectivity(
            &self.space,
            &self.occupancy,
            location,
            new,
            self.config.allow_cell_death,
        ) {
            self.stats.blocked += 1;
            return MoveOutcome::Blocked(proposal);
        }

        let delta = {
            let view = self.view();
            self.penalties
                .iter()
                .map(|penalty| penalty.delta(&view, &proposal))
                .sum::<f64>()
        };
        if !self.accepts(delta) {
            self.stats.rejected += 1;
            return MoveOutcome::Rejected { proposal, delta };
        }
        self.commit(proposal);
        MoveOutcome::Accepted { proposal, delta }
    }

    /// Metropolis rule; NaN deltas are rejected.
    fn accepts(&mut self, delta: f64) -> bool {
        if delta <= 0.0 {
            return true;
        }
        if self.temperature == 0.0 {
            return false;
        }
        self.rng.random::<f64>() < (-delta / self.temperature).exp()
    }

    fn commit(&mut self, proposal: Proposal) {
        let Proposal { location, old, new } = proposal;
        let change = geometry::perimeter_change(
            &self.space,
            self.occupancy.ids(),
            location,
            old,
            new,
        );
        self.occupancy.set(location, new);

        let volumes = self.table.volumes_mut();
        volumes[old as usize] -= 1;
        volumes[new as usize] += 1;
        let perimeters = self.table.perimeters_mut();
        if old != MEDIUM {
            shift(&mut perimeters[old as usize], change.old);
        }
        if new != MEDIUM {
            shift(&mut perimeters[new as usize], change.new);
        }

        self.boundary.refresh(&self.space, &self.occupancy, location);
        let view = ModelView {
            space: &self.space,
            occupancy: &self.occupancy,
            table: &self.table,
            step: self.step,
            moves: self.stats.attempted,
        };
        for penalty in &mut self.penalties {
            penalty.on_commit(&view, &proposal);
        }
        self.stats.accepted += 1;

        if old != MEDIUM && self.table.volumes()[old as usize] == 0 {
            let step = self.step.0;
            if self.remove_cell(old).is_ok() {
                debug!(cell = old, step, "cell lost its last location and was removed");
            }
        }
    }

    /// Run `moves` proposals, returning the counters they produced.
    pub fn run_moves(&mut self, moves: usize) -> MoveStats {
        let before = self.stats;
        for _ in 0..moves {
            self.attempt_move();
        }
        self.stats.since(&before)
    }

    /// Run one sweep and record its summary.
    pub fn model_step(&mut self) -> SweepSummary {
        let moves = self.run_moves(self.moves_per_step());
        let view = ModelView {
            space: &self.space,
            occupancy: &self.occupancy,
            table: &self.table,
            step: self.step,
            moves: self.stats.attempted,
        };
        for penalty in &mut self.penalties {
            penalty.on_sweep(&view);
        }
        self.step = self.step.next();

        let summary = SweepSummary {
            step: self.step,
            moves,
            cell_count: self.table.count_cells(),
            boundary_len: self.boundary.len(),
            temperature: self.temperature,
        };
        trace!(
            step = summary.step.0,
            accepted = moves.accepted,
            blocked = moves.blocked,
            rejected = moves.rejected,
            "sweep complete"
        );
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary.clone());
        summary
    }

    /// Run `sweeps` sweeps.
    pub fn advance(&mut self, sweeps: u64) {
        for _ in 0..sweeps {
            self.model_step();
        }
    }

    /// Add an unplaced cell of an already registered type.
    pub fn add_cell(&mut self, record: CellRecord) -> Result<CellId, ModelError> {
        if self.table.type_id(&record.name).is_none() {
            return Err(ModelError::UnregisteredType(record.name));
        }
        let id = self.table.add_cell(record)?;
        debug!(cell = id, "cell added");
        Ok(id)
    }

    /// Remove a cell; its locations become medium and higher ids shift down by one.
    pub fn remove_cell(&mut self, id: CellId) -> Result<CellRow, ModelError> {
        let row = self.table.remove_cell(id)?;
        self.occupancy.release(id);
        self.table.volumes_mut()[MEDIUM as usize] += row.volume;
        self.boundary = BoundarySet::build(&self.space, &self.occupancy);
        debug!(cell = id, volume = row.volume, "cell removed");
        Ok(row)
    }

    pub fn add_property(
        &mut self,
        name: &str,
        default: impl Into<PropertyValue>,
        scope: PropertyScope,
    ) -> Result<(), ModelError> {
        Ok(self.table.add_property(name, default, scope)?)
    }

    pub fn add_property_values(
        &mut self,
        name: &str,
        values: Vec<PropertyValue>,
    ) -> Result<(), ModelError> {
        Ok(self.table.add_property_values(name, values)?)
    }

    /// Recount every volume and perimeter and rebuild the boundary set.
    pub fn recount_geometry(&mut self) {
        geometry::recount(&self.space, self.occupancy.ids(), &mut self.table);
        self.boundary = BoundarySet::build(&self.space, &self.occupancy);
    }

    /// Compare the tracked volumes, perimeters and boundary set against a full recount.
    pub fn audit(&self) -> Result<(), ModelError> {
        let mut fresh = self.table.clone();
        geometry::recount(&self.space, self.occupancy.ids(), &mut fresh);
        if fresh.volumes() != self.table.volumes() {
            return Err(ModelError::Inconsistent(format!(
                "volumes {:?} != recount {:?}",
                self.table.volumes(),
                fresh.volumes()
            )));
        }
        if fresh.perimeters() != self.table.perimeters() {
            return Err(ModelError::Inconsistent(format!(
                "perimeters {:?} != recount {:?}",
                self.table.perimeters(),
                fresh.perimeters()
            )));
        }
        let rebuilt = BoundarySet::build(&self.space, &self.occupancy);
        if rebuilt.len() != self.boundary.len()
            || rebuilt.members().iter().any(|&loc| !self.boundary.contains(loc))
        {
            return Err(ModelError::Inconsistent(
                "boundary set does not match the grid".to_owned(),
            ));
        }
        Ok(())
    }

    pub(crate) fn view(&self) -> ModelView<'_> {
        ModelView {
            space: &self.space,
            occupancy: &self.occupancy,
            table: &self.table,
            step: self.step,
            moves: self.stats.attempted,
        }
    }

    pub(crate) fn place(&mut self, loc: usize, id: CellId) {
        self.occupancy.set(loc, id);
    }
}

/// Apply a perimeter change. Out-of-range results are left for `audit` to report.
#[inline]
fn shift(value: &mut u32, change: i64) {
    let shifted = i64::from(*value) + change;
    debug_assert!(
        u32::try_from(shifted).is_ok(),
        "perimeter {value} shifted out of range by {change}"
    );
    *value = shifted as u32;
}

impl fmt::Display for CellPotts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cell Potts Model:")?;
        let dims: Vec<String> = self.space.dims().iter().map(ToString::to_string).collect();
        writeln!(f, "Grid: {}", dims.join("×"))?;
        write!(f, "Cell Counts:")?;
        let mut per_type = vec![0usize; self.table.type_names().len()];
        for &type_id in &self.table.type_ids()[1..] {
            per_type[type_id as usize] += 1;
        }
        for (name, count) in self.table.type_names().iter().zip(&per_type).skip(1) {
            if *count > 0 {
                write!(f, " [{name} → {count}]")?;
            }
        }
        writeln!(f, " [Total → {}]", self.table.count_cells())?;
        write!(f, "Model Penalties:")?;
        for kind in self.penalty_kinds() {
            write!(f, " {kind}")?;
        }
        writeln!(f)?;
        writeln!(f, "Temperature: {}", self.temperature)?;
        write!(f, "Steps: {}", self.step.0)
    }
}

/// Build and advance one model per seed in parallel.
pub fn run_replicates<F, E>(seeds: &[u64], sweeps: u64, build: F) -> Result<Vec<CellPotts>, E>
where
    F: Fn(u64) -> Result<CellPotts, E> + Sync,
    E: Send,
{
    seeds
        .par_iter()
        .map(|&seed| {
            let mut model = build(seed)?;
            model.advance(sweeps);
            Ok(model)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::penalty::{AdhesionPenalty, MigrationPenalty, VolumePenalty};
    use cellpotts_space::{Boundary, Neighborhood};

    fn block_model(config: PottsConfig) -> CellPotts {
        let space =
            CellSpace::new(&[12, 12], Boundary::Periodic, Neighborhood::Moore).expect("space");
        let mut occupancy = Occupancy::new(space.len());
        for y in 4..8 {
            for x in 3..6 {
                occupancy.set(space.location(&[x, y]).expect("loc"), 1);
            }
            for x in 6..9 {
                occupancy.set(space.location(&[x, y]).expect("loc"), 2);
            }
        }
        let table = CellTable::from_types(&["A", "B"], &[12, 16], &[1, 1]).expect("table");
        let penalties: Vec<Box<dyn Penalty>> = vec![
            Box::new(
                AdhesionPenalty::new(vec![
                    vec![0.0, 10.0, 10.0],
                    vec![10.0, 4.0, 8.0],
                    vec![10.0, 8.0, 4.0],
                ])
                .expect("adhesion"),
            ),
            Box::new(VolumePenalty::new(&[2.0, 2.0]).expect("volume")),
        ];
        CellPotts::with_occupancy(space, occupancy, table, penalties, config).expect("model")
    }

    fn seeded(seed: u64) -> PottsConfig {
        PottsConfig {
            rng_seed: Some(seed),
            ..PottsConfig::default()
        }
    }

    #[test]
    fn construction_recounts_geometry() {
        let model = block_model(seeded(1));
        assert_eq!(model.table().volumes(), &[120, 12, 12]);
        assert_eq!(model.count_cells(), 2);
        assert_eq!(model.count_cell_types(), 2);
        assert!(model.audit().is_ok());
        assert_eq!(model.moves_per_step(), 24);
    }

    #[test]
    fn rejects_mismatched_inputs() {
        let space =
            CellSpace::new(&[5, 5], Boundary::Periodic, Neighborhood::Moore).expect("space");
        let table = CellTable::from_types(&["A"], &[4], &[1]).expect("table");
        let err = CellPotts::with_occupancy(
            space.clone(),
            Occupancy::new(10),
            table.clone(),
            Vec::new(),
            PottsConfig::default(),
        )
        .expect_err("size mismatch");
        assert_eq!(err, ModelError::GridSizeMismatch { expected: 25, actual: 10 });

        let mut ids = vec![0; space.len()];
        ids[3] = 7;
        let err = CellPotts::with_occupancy(
            space.clone(),
            Occupancy::from_ids(ids),
            table.clone(),
            Vec::new(),
            PottsConfig::default(),
        )
        .expect_err("unknown owner");
        assert_eq!(err, ModelError::UnknownOwner(7));

        let volume: Vec<Box<dyn Penalty>> =
            vec![Box::new(VolumePenalty::new(&[1.0, 1.0]).expect("volume"))];
        let err = CellPotts::new(space, table, volume, PottsConfig::default())
            .expect_err("type count");
        assert!(matches!(err, ModelError::Penalty(PenaltyError::TypeCountMismatch { .. })));
    }

    #[test]
    fn sweeps_keep_tracked_state_consistent() {
        let mut model = block_model(seeded(7));
        for _ in 0..20 {
            model.model_step();
            let total: u64 = model.table().volumes().iter().map(|&v| u64::from(v)).sum();
            assert_eq!(total, model.space().len() as u64);
            model.audit().expect("consistent");
        }
        assert_eq!(model.step(), Step(20));
        let stats = model.stats();
        assert_eq!(
            stats.attempted,
            stats.accepted + stats.blocked + stats.rejected + stats.idle
        );
    }

    #[test]
    fn zero_temperature_never_raises_energy() {
        let mut model = block_model(seeded(3));
        model.set_temperature(0.0).expect("temperature");
        for _ in 0..2_000 {
            match model.attempt_move() {
                MoveOutcome::Accepted { delta, .. } => assert!(delta <= 0.0),
                MoveOutcome::Rejected { delta, .. } => assert!(delta > 0.0),
                MoveOutcome::Blocked(_) | MoveOutcome::Idle => {}
            }
        }
    }

    #[test]
    fn non_positive_deltas_are_always_accepted() {
        let mut model = block_model(seeded(11));
        model.set_temperature(1e-6).expect("temperature");
        for _ in 0..2_000 {
            if let MoveOutcome::Rejected { delta, .. } = model.attempt_move() {
                assert!(delta > 0.0);
            }
        }
    }

    #[test]
    fn temperature_is_validated() {
        let mut model = block_model(seeded(1));
        assert!(model.set_temperature(-0.5).is_err());
        assert!(model.set_temperature(f64::NAN).is_err());
        assert_eq!(model.temperature(), 20.0);
    }

    #[test]
    fn history_is_bounded() {
        let mut model = block_model(PottsConfig {
            history_capacity: 3,
            ..seeded(5)
        });
        model.advance(5);
        let steps: Vec<u64> = model.history().map(|s| s.step.0).collect();
        assert_eq!(steps, vec![3, 4, 5]);
    }

    #[test]
    fn removal_renumbers_and_frees_locations() {
        let mut model = block_model(seeded(2));
        let before = model.table().row(2).expect("row");
        let removed = model.remove_cell(1).expect("remove");
        assert_eq!(removed.volume, 12);
        assert_eq!(model.count_cells(), 1);
        assert_eq!(model.occupancy().count(2), 0);
        let shifted = model.table().row(1).expect("row");
        assert_eq!(shifted.volume, before.volume);
        assert_eq!(shifted.perimeter, before.perimeter);
        assert_eq!(model.occupancy().count(1), before.volume as usize);
        assert_eq!(model.table().volumes()[0], 132);
        assert!(model.audit().is_ok());
        assert!(matches!(
            model.remove_cell(5),
            Err(ModelError::Table(TableError::UnknownCell(5)))
        ));
    }

    #[test]
    fn add_cell_requires_a_known_type() {
        let mut model = block_model(seeded(2));
        let id = model.add_cell(CellRecord::new("A", 12)).expect("add");
        assert_eq!(id, 3);
        assert_eq!(model.table().volumes()[3], 0);
        assert!(matches!(
            model.add_cell(CellRecord::new("C", 12)),
            Err(ModelError::UnregisteredType(name)) if name == "C"
        ));
    }

    #[test]
    fn lone_location_dies_only_when_allowed() {
        let build = |allow_cell_death: bool| {
            let space =
                CellSpace::new(&[6, 6], Boundary::Periodic, Neighborhood::Moore).expect("space");
            let mut occupancy = Occupancy::new(space.len());
            occupancy.set(space.location(&[2, 2]).expect("loc"), 1);
            let table = CellTable::from_types(&["A"], &[1], &[1]).expect("table");
            let penalties: Vec<Box<dyn Penalty>> = vec![Box::new(
                AdhesionPenalty::new(vec![vec![0.0, 50.0], vec![50.0, 0.0]]).expect("adhesion"),
            )];
            let config = PottsConfig {
                temperature: 0.0,
                allow_cell_death,
                ..seeded(9)
            };
            CellPotts::with_occupancy(space, occupancy, table, penalties, config).expect("model")
        };

        let mut kept = build(false);
        kept.run_moves(500);
        assert_eq!(kept.count_cells(), 1);

        let mut dying = build(true);
        dying.run_moves(500);
        assert_eq!(dying.count_cells(), 0);
        assert!(dying.occupancy().ids().iter().all(|&id| id == MEDIUM));
        assert_eq!(dying.attempt_move(), MoveOutcome::Idle);
    }

    #[test]
    fn summary_lists_types_and_penalties() {
        let model = block_model(seeded(1));
        let text = model.to_string();
        assert!(text.contains("Grid: 12×12"));
        assert!(text.contains("[A → 1] [B → 1] [Total → 2]"));
        assert!(text.contains("Model Penalties: Adhesion Volume"));
        assert!(text.contains("Steps: 0"));
    }

    #[test]
    fn replicates_match_sequential_runs() {
        let build = |seed: u64| Ok::<_, ModelError>(block_model(seeded(seed)));
        let models = run_replicates(&[1, 2, 3], 4, build).expect("replicates");
        for (model, seed) in models.iter().zip([1u64, 2, 3]) {
            let mut sequential = block_model(seeded(seed));
            sequential.advance(4);
            assert_eq!(model.occupancy(), sequential.occupancy());
            assert_eq!(model.step(), Step(4));
        }
    }

    #[test]
    #[should_panic(expected = "shifted out of range")]
    fn negative_perimeter_is_not_clamped() {
        let mut perimeter = 1;
        shift(&mut perimeter, -2);
    }

    #[test]
    fn migration_activity_decays_between_moves() {
        let space =
            CellSpace::new(&[9, 9], Boundary::Periodic, Neighborhood::Moore).expect("space");
        let mut occupancy = Occupancy::new(space.len());
        occupancy.set(space.location(&[3, 3]).expect("loc"), 1);
        let table = CellTable::from_types(&["A"], &[2], &[1]).expect("table");
        let penalties: Vec<Box<dyn Penalty>> = vec![
            Box::new(MigrationPenalty::new(50, &[10.0]).expect("migration")),
            // Any volume change away from 2 is prohibitive, so the grid stays put.
            Box::new(VolumePenalty::new(&[1e6]).expect("volume")),
        ];
        let config = PottsConfig {
            temperature: 0.0,
            ..seeded(9)
        };
        let mut model =
            CellPotts::with_occupancy(space, occupancy, table, penalties, config).expect("model");

        let claimed = model.space().location(&[4, 3]).expect("loc");
        model.stats.attempted += 1;
        model.commit(Proposal {
            location: claimed,
            old: MEDIUM,
            new: 1,
        });
        let extend = Proposal {
            location: model.space().location(&[5, 3]).expect("loc"),
            old: MEDIUM,
            new: 1,
        };
        let migration_delta = |model: &CellPotts| {
            let view = model.view();
            model
                .penalties()
                .find(|penalty| penalty.kind() == "Migration")
                .map(|penalty| penalty.delta(&view, &extend))
                .expect("migration penalty")
        };
        // Fresh claim at full activity 50: -(10 * 50) / 50.
        assert!((migration_delta(&model) + 10.0).abs() < 1e-9);

        let before = model.occupancy().clone();
        let stats = model.run_moves(20);
        assert_eq!(stats.accepted, 0);
        assert_eq!(model.occupancy(), &before);
        assert_eq!(model.step(), Step(0));
        // Twenty moves later activity is 30: -(10 * 30) / 50.
        assert!((migration_delta(&model) + 6.0).abs() < 1e-9);
    }
}
