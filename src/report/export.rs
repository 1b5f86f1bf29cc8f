//! JSON run report and scored-table export

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use polars::prelude::*;
use serde::Serialize;

use crate::pipeline::{
    CoercionSummary, FoldFailure, GridScore, LogisticRegressionModel, ParamMap, PipelineModel,
    WorkflowConfig, WorkflowOutcome,
};

/// Metadata about the run
#[derive(Serialize)]
pub struct RunMetadata {
    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,
    pub flightpipe_version: String,
    pub flights_file: String,
    pub planes_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airports_file: Option<String>,
}

/// Row counts through the pipeline
#[derive(Serialize)]
pub struct RowCounts {
    pub joined: usize,
    pub after_null_filter: usize,
    pub train: usize,
    pub test: usize,
}

/// Cross-validation record
#[derive(Serialize)]
pub struct SearchReport<'a> {
    pub metric: String,
    pub num_folds: usize,
    pub fold_fits: usize,
    pub best_index: usize,
    pub best_params: &'a ParamMap,
    pub scores: &'a [GridScore],
    pub failures: &'a [FoldFailure],
}

/// Complete run report
#[derive(Serialize)]
pub struct RunReport<'a> {
    pub metadata: RunMetadata,
    pub config: &'a WorkflowConfig,
    pub rows: RowCounts,
    pub coercions: &'a [CoercionSummary],
    pub encoder: &'a PipelineModel,
    pub search: SearchReport<'a>,
    pub model: &'a LogisticRegressionModel,
    pub test_metric: f64,
}

/// Input paths recorded in the report
pub struct ReportInputs<'a> {
    pub flights: &'a Path,
    pub planes: &'a Path,
    pub airports: Option<&'a Path>,
}

impl<'a> RunReport<'a> {
    pub fn new(
        outcome: &'a WorkflowOutcome,
        config: &'a WorkflowConfig,
        inputs: &ReportInputs<'_>,
    ) -> Self {
        Self {
            metadata: RunMetadata {
                timestamp: Utc::now().to_rfc3339(),
                flightpipe_version: env!("CARGO_PKG_VERSION").to_string(),
                flights_file: inputs.flights.display().to_string(),
                planes_file: inputs.planes.display().to_string(),
                airports_file: inputs.airports.map(|p| p.display().to_string()),
            },
            config,
            rows: RowCounts {
                joined: outcome.joined_rows,
                after_null_filter: outcome.clean_rows,
                train: outcome.train_rows,
                test: outcome.test_rows,
            },
            coercions: &outcome.coercions,
            encoder: &outcome.encoder,
            search: SearchReport {
                metric: config.metric.to_string(),
                num_folds: outcome.cv.num_folds,
                fold_fits: outcome.cv.fold_fits,
                best_index: outcome.cv.best_index,
                best_params: &outcome.cv.best_params,
                scores: &outcome.cv.scores,
                failures: &outcome.cv.failures,
            },
            model: &outcome.cv.best_model,
            test_metric: outcome.test_metric,
        }
    }
}

/// Write the run report as pretty JSON.
pub fn export_run_report(
    outcome: &WorkflowOutcome,
    config: &WorkflowConfig,
    inputs: &ReportInputs<'_>,
    output_path: &Path,
) -> Result<()> {
    let report = RunReport::new(outcome, config, inputs);
    let json =
        serde_json::to_string_pretty(&report).context("Failed to serialize run report to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write run report to {}", output_path.display()))?;

    Ok(())
}

/// Write a table to CSV, leaving out vector columns CSV cannot hold.
///
/// Returns the names of the columns that were left out.
pub fn save_scored_table(df: &DataFrame, output_path: &Path) -> Result<Vec<String>> {
    let vector_cols: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::List(_)))
        .map(|c| c.name().to_string())
        .collect();

    let mut flat = df.drop_many(vector_cols.iter().map(String::as_str));

    let mut file = File::create(output_path)
        .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;
    CsvWriter::new(&mut file)
        .finish(&mut flat)
        .with_context(|| format!("Failed to write CSV: {}", output_path.display()))?;

    Ok(vector_cols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::columns::vectors_to_column;
    use tempfile::tempdir;

    #[test]
    fn test_save_scored_table_drops_vectors() {
        let mut df = df! {
            "label" => [0i32, 1],
            "probability" => [0.2f64, 0.9],
        }
        .unwrap();
        df.with_column(vectors_to_column("features", &[vec![1.0], vec![2.0]]))
            .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("scored.csv");
        let dropped = save_scored_table(&df, &path).unwrap();
        assert_eq!(dropped, vec!["features".to_string()]);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("label,probability"));
        assert!(!text.contains("features"));
    }
}
