use cellpotts_core::{
    AdhesionPenalty, Boundary, CellPotts, CellSpace, CellTable, MigrationPenalty, Neighborhood,
    Penalty, PerimeterPenalty, PottsConfig, VolumePenalty,
};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::time::Duration;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

fn build_model(side: usize, cells: usize, migration: bool) -> CellPotts {
    let space =
        CellSpace::new(&[side, side], Boundary::Periodic, Neighborhood::Moore).expect("space");
    let table = CellTable::from_types(&["Epithelial"], &[100], &[cells]).expect("table");
    let mut penalties: Vec<Box<dyn Penalty>> = vec![
        Box::new(AdhesionPenalty::new(vec![vec![0.0, 20.0], vec![20.0, 10.0]]).expect("adhesion")),
        Box::new(VolumePenalty::new(&[5.0]).expect("volume")),
        Box::new(PerimeterPenalty::new(&[1.0]).expect("perimeter")),
    ];
    if migration {
        penalties.push(Box::new(MigrationPenalty::new(50, &[20.0]).expect("migration")));
    }
    let config = PottsConfig {
        rng_seed: Some(0xBEEF),
        ..PottsConfig::default()
    };
    let mut model = CellPotts::new(space, table, penalties, config).expect("model");
    model.position_cells_random().expect("placement");
    model
}

fn bench_model_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_step");
    group.sample_size(env_or("CPM_BENCH_SAMPLES", 20usize).max(10));
    group.warm_up_time(Duration::from_secs(env_or("CPM_BENCH_WARMUP_SECS", 2)));
    group.measurement_time(Duration::from_secs(env_or("CPM_BENCH_MEASURE_SECS", 8)));
    let sweeps: u64 = env_or("CPM_BENCH_SWEEPS", 4u64).max(1);

    for &(side, cells) in &[(100usize, 40usize), (200, 160)] {
        for migration in [false, true] {
            let label = if migration { "act" } else { "plain" };
            group.bench_function(format!("{label}_{side}x{side}_cells{cells}_sweeps{sweeps}"), |b| {
                b.iter_batched(
                    || build_model(side, cells, migration),
                    |mut model| {
                        model.advance(sweeps);
                        model
                    },
                    BatchSize::LargeInput,
                );
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_model_steps);
criterion_main!(benches);
