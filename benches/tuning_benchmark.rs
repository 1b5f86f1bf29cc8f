//! Benchmarks for logistic regression fitting and the cross-validated grid search
//!
//! Run with: cargo bench --bench tuning_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polars::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;

use flightpipe::pipeline::logistic::{ELASTIC_NET_PARAM, REG_PARAM};
use flightpipe::pipeline::{
    BinaryClassificationEvaluator, CrossValidator, Estimator, LogisticRegression,
    ParamGridBuilder, Transformer, VectorAssembler,
};

/// Assembled feature table with a noisy linear decision boundary
fn generate_feature_table(n_rows: usize, n_features: usize, seed: u64) -> DataFrame {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    let weights: Vec<f64> = (0..n_features).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(n_rows); n_features];
    let mut labels: Vec<i32> = Vec::with_capacity(n_rows);

    for _ in 0..n_rows {
        let mut z = 0.0;
        for (j, column) in columns.iter_mut().enumerate() {
            let x = rng.gen::<f64>() * 10.0 - 5.0;
            z += weights[j] * x;
            column.push(x);
        }
        let noise = rng.gen::<f64>() * 2.0 - 1.0;
        labels.push(if z + noise > 0.0 { 1 } else { 0 });
    }

    let names: Vec<String> = (0..n_features).map(|j| format!("x{}", j)).collect();
    let mut cols: Vec<Column> = names
        .iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name.as_str().into(), values))
        .collect();
    cols.push(Column::new("label".into(), labels));

    let df = DataFrame::new(cols).unwrap();
    VectorAssembler::new(names, "features").transform(&df).unwrap()
}

fn bench_logistic_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("logistic_fit");

    for n_rows in [1_000usize, 10_000] {
        let df = generate_feature_table(n_rows, 10, 42);
        group.throughput(Throughput::Elements(n_rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n_rows), &df, |b, df| {
            let lr = LogisticRegression::new().with_reg_param(0.01);
            b.iter(|| lr.fit(black_box(df)).unwrap())
        });
    }

    group.finish();
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_validated_grid_search");
    group.sample_size(10);

    let df = generate_feature_table(5_000, 10, 7);
    for n_reg in [2usize, 5] {
        let reg_params: Vec<f64> = (0..n_reg).map(|i| i as f64 * 0.02).collect();
        group.bench_with_input(
            BenchmarkId::new("grid_points", n_reg * 2),
            &reg_params,
            |b, reg_params| {
                b.iter(|| {
                    let grid = ParamGridBuilder::new()
                        .add_grid(REG_PARAM, reg_params.iter().copied())
                        .add_grid(ELASTIC_NET_PARAM, [0.0, 1.0])
                        .build()
                        .unwrap();
                    CrossValidator::new(
                        LogisticRegression::new(),
                        grid,
                        BinaryClassificationEvaluator::new(),
                    )
                    .with_num_folds(3)
                    .fit(black_box(&df))
                    .unwrap()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_logistic_fit, bench_grid_search);
criterion_main!(benches);
