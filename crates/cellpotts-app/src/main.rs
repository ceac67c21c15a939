use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use cellpotts_app::{RunReport, Scenario, run, run_seeds};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "cellpotts",
    version,
    about = "Run a Cellular Potts scenario headlessly"
)]
struct Cli {
    /// Scenario JSON file; the built-in single-cell scenario is used when absent.
    #[arg(long, env = "CPM_SCENARIO")]
    scenario: Option<PathBuf>,

    /// Sweeps to run, overriding the scenario.
    #[arg(long, env = "CPM_SWEEPS")]
    sweeps: Option<u64>,

    /// RNG seed, overriding the scenario.
    #[arg(long, env = "CPM_SEED")]
    seed: Option<u64>,

    /// Metropolis temperature, overriding the scenario.
    #[arg(long, env = "CPM_TEMPERATURE")]
    temperature: Option<f64>,

    /// Independent replicates run in parallel with consecutive seeds.
    #[arg(long, default_value_t = 1)]
    replicates: u64,

    /// Log a sweep summary every N sweeps (0 disables).
    #[arg(long, env = "CPM_REPORT_EVERY", default_value_t = 10)]
    report_every: u64,

    /// Print the final report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Print the effective scenario as JSON and exit.
    #[arg(long)]
    print_scenario: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut scenario = match &cli.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::hello_world(),
    };
    if let Some(seed) = cli.seed {
        scenario.potts.rng_seed = Some(seed);
    }
    if let Some(temperature) = cli.temperature {
        scenario.potts.temperature = temperature;
    }
    let sweeps = cli.sweeps.unwrap_or(scenario.sweeps);

    if cli.print_scenario {
        println!("{}", serde_json::to_string_pretty(&scenario)?);
        return Ok(());
    }
    if cli.replicates == 0 {
        bail!("--replicates must be at least 1");
    }

    let reports = if cli.replicates == 1 {
        let mut model = scenario.build()?;
        vec![run(&mut model, sweeps, cli.report_every)]
    } else {
        let base = scenario.potts.rng_seed.unwrap_or_else(rand::random);
        let seeds: Vec<u64> = (0..cli.replicates).map(|i| base.wrapping_add(i)).collect();
        info!(replicates = seeds.len(), base_seed = base, sweeps, "running replicates");
        run_seeds(&scenario, &seeds, sweeps)?
    };

    for report in &reports {
        log_report(report);
    }
    if cli.json {
        let out = if reports.len() == 1 {
            serde_json::to_string_pretty(&reports[0])
        } else {
            serde_json::to_string_pretty(&reports)
        }
        .context("failed to encode report")?;
        println!("{out}");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn log_report(report: &RunReport) {
    for cell in &report.cells {
        if cell.volume == 0 {
            warn!(cell = cell.id, name = %cell.name, "cell holds no locations");
        }
    }
    let total: u64 = report.cells.iter().map(|c| u64::from(c.volume)).sum();
    info!(
        seed = ?report.seed,
        step = report.step.0,
        cells = report.cells.len(),
        occupied = total,
        accepted = report.stats.accepted,
        "final state"
    );
}
