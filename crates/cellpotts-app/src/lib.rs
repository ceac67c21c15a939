//! Scenario files and the headless runner behind the `cellpotts` binary.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use cellpotts_core::{
    CellPotts, CellTable, MoveStats, POSITIONS, Penalty, PenaltySpec, PottsConfig, PropertyValue,
    SpaceConfig, Step, run_replicates,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One cell type and how many cells of it to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellTypeSpec {
    pub name: String,
    pub desired_volume: u32,
    pub count: usize,
}

/// How cells are put on the grid before the first sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Placement {
    /// Seed each cell at a random medium location.
    Random,
    /// Seed cells in id order at the listed coordinates.
    Positions { positions: Vec<Vec<usize>> },
}

/// Everything needed to build and run a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub space: SpaceConfig,
    #[serde(default)]
    pub potts: PottsConfig,
    pub cell_types: Vec<CellTypeSpec>,
    pub penalties: Vec<PenaltySpec>,
    pub placement: Placement,
    /// Sweeps to run when the command line does not say otherwise.
    #[serde(default = "default_sweeps")]
    pub sweeps: u64,
}

fn default_sweeps() -> u64 {
    100
}

impl Default for Scenario {
    fn default() -> Self {
        Self::hello_world()
    }
}

impl Scenario {
    /// A single epithelial cell growing from the centre of a 50x50 periodic grid.
    #[must_use]
    pub fn hello_world() -> Self {
        Self {
            space: SpaceConfig::default(),
            potts: PottsConfig::default(),
            cell_types: vec![CellTypeSpec {
                name: "Epithelial".to_owned(),
                desired_volume: 500,
                count: 1,
            }],
            penalties: vec![
                PenaltySpec::Adhesion {
                    matrix: vec![vec![0.0, 20.0], vec![20.0, 0.0]],
                },
                PenaltySpec::Volume { scales: vec![5.0] },
            ],
            placement: Placement::Positions {
                positions: vec![vec![25, 25]],
            },
            sweeps: default_sweeps(),
        }
    }

    /// Read a scenario from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse scenario {}", path.display()))?;
        debug!(path = %path.display(), types = scenario.cell_types.len(), "scenario loaded");
        Ok(scenario)
    }

    /// Build the model and place its cells.
    pub fn build(&self) -> Result<CellPotts> {
        let space = self.space.build().context("invalid grid")?;
        let names: Vec<&str> = self.cell_types.iter().map(|t| t.name.as_str()).collect();
        let volumes: Vec<u32> = self.cell_types.iter().map(|t| t.desired_volume).collect();
        let counts: Vec<usize> = self.cell_types.iter().map(|t| t.count).collect();
        let table =
            CellTable::from_types(&names, &volumes, &counts).context("invalid cell types")?;
        let penalties = self
            .penalties
            .iter()
            .map(PenaltySpec::build)
            .collect::<Result<Vec<Box<dyn Penalty>>, _>>()
            .context("invalid penalty")?;
        let mut model = CellPotts::new(space, table, penalties, self.potts.clone())
            .context("failed to build model")?;

        match &self.placement {
            Placement::Random => {
                model.position_cells_random().context("random placement failed")?;
            }
            Placement::Positions { positions } => {
                if positions.len() != model.count_cells() {
                    bail!(
                        "{} positions given for {} cells",
                        positions.len(),
                        model.count_cells()
                    );
                }
                let values = positions.iter().cloned().map(PropertyValue::from).collect();
                model.add_property_values(POSITIONS, values)?;
                model.position_cells().context("placement failed")?;
            }
        }
        Ok(model)
    }
}

/// Per-cell state reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellReport {
    pub id: u32,
    pub name: String,
    pub volume: u32,
    pub desired_volume: u32,
    pub perimeter: u32,
}

/// Final state of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub seed: Option<u64>,
    pub step: Step,
    pub temperature: f64,
    pub stats: MoveStats,
    pub cells: Vec<CellReport>,
}

impl RunReport {
    #[must_use]
    pub fn from_model(model: &CellPotts) -> Self {
        let table = model.table();
        let cells = table
            .cell_ids()
            .map(|id| {
                let i = id as usize;
                CellReport {
                    id,
                    name: table.names()[i].clone(),
                    volume: table.volumes()[i],
                    desired_volume: table.desired_volumes()[i],
                    perimeter: table.perimeters()[i],
                }
            })
            .collect();
        Self {
            seed: model.config().rng_seed,
            step: model.step(),
            temperature: model.temperature(),
            stats: model.stats(),
            cells,
        }
    }
}

/// Run `sweeps` sweeps, logging a summary every `report_every` sweeps (0 disables).
pub fn run(model: &mut CellPotts, sweeps: u64, report_every: u64) -> RunReport {
    info!(%model, "starting run");
    for _ in 0..sweeps {
        let summary = model.model_step();
        if report_every > 0 && summary.step.0.is_multiple_of(report_every) {
            info!(
                step = summary.step.0,
                accepted = summary.moves.accepted,
                blocked = summary.moves.blocked,
                rejected = summary.moves.rejected,
                cells = summary.cell_count,
                "sweep summary"
            );
        }
    }
    let report = RunReport::from_model(model);
    info!(
        step = report.step.0,
        acceptance = model.stats().acceptance_rate(),
        "run complete"
    );
    report
}

/// Run one replicate per seed in parallel.
pub fn run_seeds(scenario: &Scenario, seeds: &[u64], sweeps: u64) -> Result<Vec<RunReport>> {
    let models = run_replicates(seeds, sweeps, |seed| {
        let mut scenario = scenario.clone();
        scenario.potts.rng_seed = Some(seed);
        scenario
            .build()
            .with_context(|| format!("replicate with seed {seed}"))
    })?;
    Ok(models.iter().map(RunReport::from_model).collect())
}
