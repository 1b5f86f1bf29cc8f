//! Dataset loader for CSV and Parquet files

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

use super::error::PipelineError;

/// Load a dataset from a file (CSV or Parquet based on extension).
///
/// CSV column types are sniffed from the first `infer_schema_length` rows
/// (0 means a full scan). Declared types are applied afterwards by
/// [`coerce_columns`](super::coerce_columns), which turns unparsable values into nulls.
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let schema_length = if infer_schema_length == 0 {
        None
    } else {
        Some(infer_schema_length)
    };

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(schema_length)
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    lf.collect()
        .with_context(|| format!("Failed to read dataset: {}", path.display()))
}

/// Column names of a table as owned strings.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Fail with [`PipelineError::MissingColumn`] unless every named column exists.
pub fn require_columns<S: AsRef<str>>(
    df: &DataFrame,
    required: &[S],
) -> std::result::Result<(), PipelineError> {
    let available = column_names(df);
    for name in required {
        let name = name.as_ref();
        if !available.iter().any(|c| c == name) {
            return Err(PipelineError::MissingColumn {
                column: name.to_string(),
                available,
            });
        }
    }
    Ok(())
}

/// Estimated in-memory size of a table in megabytes.
pub fn estimated_size_mb(df: &DataFrame) -> f64 {
    df.estimated_size() as f64 / (1024.0 * 1024.0)
}
