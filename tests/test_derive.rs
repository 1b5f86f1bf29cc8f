//! Integration tests for coercion, derived columns and null-row filtering

mod common;

use common::*;
use flightpipe::pipeline::{
    coerce_columns, derive_features, drop_null_rows, join_sources, load_dataset, ColumnCast,
    NumericType, WorkflowConfig,
};
use polars::prelude::*;

#[test]
fn test_malformed_csv_values_become_null() {
    let mut df = df! {
        "arr_delay" => ["5", "NA", "-2", "n/a", "17"],
        "air_time" => ["120", "95", "", "300", "88"],
    }
    .unwrap();
    let (_dir, path) = create_temp_csv(&mut df);
    let loaded = load_dataset(&path, 10000).unwrap();

    let casts = [
        ColumnCast::new("arr_delay", NumericType::Int64),
        ColumnCast::new("air_time", NumericType::Int64),
    ];
    let (coerced, summaries) = coerce_columns(&loaded, &casts).unwrap();

    let delays: Vec<Option<i64>> = coerced
        .column("arr_delay")
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(delays, vec![Some(5), None, Some(-2), None, Some(17)]);
    assert_eq!(summaries[0].introduced_nulls, 2);
    assert_eq!(coerced.column("air_time").unwrap().null_count(), 1);
}

#[test]
fn test_null_filter_removes_exactly_rows_with_a_null() {
    // Rows 1, 3 and 4 have a null in A, B or C; row 5 only in D, which is not required
    let df = df! {
        "A" => [Some(1i64), None, Some(3), Some(4), Some(5), Some(6)],
        "B" => [Some(1.0f64), Some(2.0), Some(3.0), None, Some(5.0), Some(6.0)],
        "C" => [Some("x"), Some("y"), Some("z"), Some("w"), None, Some("v")],
        "D" => [Some(1i64), Some(2), Some(3), Some(4), Some(5), None],
        "id" => [0i64, 1, 2, 3, 4, 5],
    }
    .unwrap();

    let filtered = drop_null_rows(&df, &["A", "B", "C"]).unwrap();
    let ids: Vec<i64> = filtered
        .column("id")
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    assert_eq!(ids, vec![0, 2, 5]);
}

#[test]
fn test_derive_features_on_synthetic_flights() {
    let mut sources = synthetic_sources(5);
    // Five flights whose plane is unknown lose their plane_year and get filtered
    let tailnums: Vec<String> = (0..100)
        .map(|i| {
            if i < 5 {
                "N999".to_string()
            } else {
                sources.flights.column("tailnum").unwrap().str().unwrap().get(i).unwrap().to_string()
            }
        })
        .collect();
    sources
        .flights
        .with_column(Column::new("tailnum".into(), tailnums))
        .unwrap();

    let config = WorkflowConfig::default();
    let joined = join_sources(&sources, &config).unwrap();
    let derived = derive_features(&joined, &config).unwrap();

    assert_eq!(derived.rows_before, 100);
    assert_eq!(derived.dropped_rows(), 5);
    assert_has_columns(&derived.table, &["plane_age", "label"]);

    let labels: Vec<i32> = derived
        .table
        .column("label")
        .unwrap()
        .i32()
        .unwrap()
        .into_no_null_iter()
        .collect();
    assert!(labels.iter().all(|&l| l == 0 || l == 1));

    // plane_age = 2014 - plane_year, and synthetic planes are built 1990..=2009
    let ages: Vec<i64> = derived
        .table
        .column("plane_age")
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    assert!(ages.iter().all(|&a| (5..=24).contains(&a)));
}
