use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;

use propfinder::catalog::Catalog;
use propfinder::index::build_index;
use propfinder::query::{Constraint, Constraints, QueryEngine};
use propfinder::types::{AggregatedFeatureRow, Column};

fn synthetic_catalog(props: usize) -> Catalog {
    let mut rows = Vec::with_capacity(props * 10);
    for p in 0..props {
        let diameter = 4.0 + (p % 24) as f64;
        let pitch = 2.0 + (p % 11) as f64;
        let prop_type = ["E", "MR", "SF", "Standard"][p % 4];
        for s in 1..=10u32 {
            let speed = s * 1000;
            let load = diameter * diameter * pitch * speed as f64 * 1e-6;
            rows.push(AggregatedFeatureRow {
                prop_id: format!("{}x{}{}", diameter, pitch, prop_type),
                prop_type: prop_type.to_string(),
                source_filename: format!("PER3_{}x{}{}-{}.dat", diameter, pitch, prop_type, p),
                diameter,
                pitch,
                speed,
                max_thrust: load * 3.1,
                max_power: load * 40.0,
                max_torque: load * 0.2,
                max_figure_of_merit: 0.4 + (p % 7) as f64 * 0.05,
                max_thrust_per_power: 3.1 / 40.0 * 1000.0 / (1.0 + s as f64 * 0.1),
                advance_ratio_curve: vec![0.0, 0.2, 0.4],
                thrust_coeff_curve: vec![0.1, 0.08, 0.05],
                power_coeff_curve: vec![0.05, 0.045, 0.04],
                efficiency_curve: vec![0.0, 0.35, 0.5],
                static_power: Some(load * 36.0),
                static_thrust: Some(load * 3.1),
            });
        }
    }
    Catalog::from_rows(rows)
}

fn engine(props: usize) -> QueryEngine {
    let features: Vec<String> = Column::DEFAULT_FEATURES
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    QueryEngine::new(build_index(synthetic_catalog(props), &features).unwrap())
}

fn bench_nearest(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest");

    let query: HashMap<String, f64> = [
        ("RPM", 6500.0),
        ("maxThrust (N)", 9.0),
        ("maxPower (W)", 120.0),
        ("maxTorque (Nm)", 0.6),
        ("maxFoM", 0.55),
        ("max THR/PWR (g/W)", 45.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    for props in [100, 1_000, 5_000] {
        let engine = engine(props);
        for k in [1, 10] {
            group.bench_with_input(
                BenchmarkId::new(format!("rows_{}", props * 10), k),
                &k,
                |b, &k| b.iter(|| engine.nearest(black_box(&query), k).unwrap().len()),
            );
        }
    }

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let engine = engine(1_000);
    let constraints = Constraints::new()
        .with(Column::PropType, Constraint::OneOf(vec!["E".into(), "MR".into()]))
        .with(Column::Speed, Constraint::between(Some(3000.0), Some(7000.0)));

    c.bench_function("filter_rows_10000", |b| {
        b.iter(|| {
            engine
                .filter(black_box(&constraints), Column::MaxThrust)
                .unwrap()
                .len()
        })
    });
}

criterion_group!(benches, bench_nearest, bench_filter);
criterion_main!(benches);
