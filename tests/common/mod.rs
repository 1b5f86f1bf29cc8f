//! Shared test utilities and fixture generators
#![allow(dead_code)]

use flightpipe::pipeline::Sources;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const CARRIERS: [&str; 4] = ["UA", "AA", "DL", "AS"];
pub const DESTS: [&str; 4] = ["SEA", "PDX", "LAX", "SFO"];
pub const NUM_PLANES: usize = 20;

/// Synthetic flights table with exactly `round(n * late_rate)` late arrivals.
///
/// Late flights lean towards carrier UA, longer air times and positive
/// departure delays, so a fitted model has some signal to find.
/// Columns: year, month, carrier, tailnum, dest, air_time, dep_delay, arr_delay.
pub fn synthetic_flights(n: usize, late_rate: f64, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_late = (n as f64 * late_rate).round() as usize;
    let mut late: Vec<bool> = (0..n).map(|i| i < n_late).collect();
    late.shuffle(&mut rng);

    let mut month = Vec::with_capacity(n);
    let mut carrier = Vec::with_capacity(n);
    let mut tailnum = Vec::with_capacity(n);
    let mut dest = Vec::with_capacity(n);
    let mut air_time = Vec::with_capacity(n);
    let mut dep_delay = Vec::with_capacity(n);
    let mut arr_delay = Vec::with_capacity(n);

    for &is_late in &late {
        month.push(rng.gen_range(1i64..=12));
        carrier.push(if is_late && rng.gen_bool(0.6) {
            "UA"
        } else {
            CARRIERS[rng.gen_range(0..CARRIERS.len())]
        });
        tailnum.push(format!("N{:03}", rng.gen_range(0..NUM_PLANES)));
        dest.push(DESTS[rng.gen_range(0..DESTS.len())]);
        air_time.push(rng.gen_range(40i64..300) + if is_late { 60 } else { 0 });
        if is_late {
            dep_delay.push(rng.gen_range(5i64..90));
            arr_delay.push(rng.gen_range(1i64..120));
        } else {
            dep_delay.push(rng.gen_range(-10i64..5));
            arr_delay.push(rng.gen_range(-30i64..=0));
        }
    }

    df! {
        "year" => vec![2014i64; n],
        "month" => month,
        "carrier" => carrier,
        "tailnum" => tailnum,
        "dest" => dest,
        "air_time" => air_time,
        "dep_delay" => dep_delay,
        "arr_delay" => arr_delay,
    }
    .unwrap()
}

/// Planes N000..N019, built 1990 onwards. Its `year` column collides with flights.
pub fn synthetic_planes() -> DataFrame {
    df! {
        "tailnum" => (0..NUM_PLANES).map(|i| format!("N{:03}", i)).collect::<Vec<_>>(),
        "year" => (0..NUM_PLANES as i64).map(|i| 1990 + i).collect::<Vec<_>>(),
        "seats" => (0..NUM_PLANES as i64).map(|i| 100 + 10 * i).collect::<Vec<_>>(),
    }
    .unwrap()
}

/// Airports keyed by `faa`, covering every synthetic destination plus one unused
pub fn synthetic_airports() -> DataFrame {
    df! {
        "faa" => ["SEA", "PDX", "LAX", "SFO", "JFK"],
        "name" => [
            "Seattle Tacoma Intl",
            "Portland Intl",
            "Los Angeles Intl",
            "San Francisco Intl",
            "John F Kennedy Intl",
        ],
        "lat" => [47.45f64, 45.59, 33.94, 37.62, 40.64],
    }
    .unwrap()
}

/// The standard 100-row, 30%-late scenario
pub fn synthetic_sources(seed: u64) -> Sources {
    Sources {
        flights: synthetic_flights(100, 0.3, seed),
        planes: synthetic_planes(),
        airports: Some(synthetic_airports()),
    }
}

/// Write a table to `dir/name` as CSV
pub fn write_csv(dir: &Path, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
    path
}

/// Paths of the three synthetic sources written as CSV
pub struct SourceFiles {
    pub dir: TempDir,
    pub flights: PathBuf,
    pub planes: PathBuf,
    pub airports: PathBuf,
}

pub fn write_synthetic_sources(seed: u64) -> SourceFiles {
    let dir = TempDir::new().unwrap();
    let mut sources = synthetic_sources(seed);
    let flights = write_csv(dir.path(), "flights.csv", &mut sources.flights);
    let planes = write_csv(dir.path(), "planes.csv", &mut sources.planes);
    let mut airports_df = synthetic_airports();
    let airports = write_csv(dir.path(), "airports.csv", &mut airports_df);
    SourceFiles {
        dir,
        flights,
        planes,
        airports,
    }
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = write_csv(temp_dir.path(), "test_data.csv", df);
    (temp_dir, csv_path)
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}

/// Labelled scores where `signal` perfectly separates the classes.
///
/// Labels alternate so every reasonable fold sees both classes; `id` is the row number.
pub fn separable_scores(n: usize) -> DataFrame {
    let label: Vec<i32> = (0..n).map(|i| (i % 2) as i32).collect();
    let signal: Vec<f64> = (0..n)
        .map(|i| (i % 2) as f64 * 0.5 + i as f64 / (4.0 * n as f64))
        .collect();
    df! {
        "id" => (0..n as i64).collect::<Vec<_>>(),
        "signal" => signal,
        "label" => label,
    }
    .unwrap()
}
