//! End-to-end flight-delay workflow: join, derive, encode, split, tune, evaluate
//!
//! Each step is a plain function so the binary can report progress between
//! steps; [`run`] chains them for library callers and tests.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use super::assembler::VectorAssembler;
use super::derive::{
    coerce_columns, drop_null_rows, with_difference, with_threshold_label, CoercionSummary,
    ColumnCast, NumericType,
};
use super::encoder::HandleInvalid;
use super::error::PipelineError;
use super::evaluation::{BinaryClassificationEvaluator, ClassificationMetric};
use super::join::{left_join, JoinSpec};
use super::loader::{column_names, load_dataset};
use super::logistic::{LogisticRegression, LogisticRegressionModel, ELASTIC_NET_PARAM, REG_PARAM};
use super::split::train_test_split;
use super::stage::{Pipeline, PipelineBuilder, PipelineModel};
use super::traits::{Estimator, Transformer};
use super::tuning::{CrossValidator, CrossValidatorModel, ParamGrid, ParamGridBuilder};

/// `output = left - right`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferenceSpec {
    pub left: String,
    pub right: String,
    pub output: String,
}

/// `output = (column > threshold)` as 0/1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub column: String,
    pub threshold: f64,
    pub output: String,
}

/// Declarative description of a run, loadable from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub planes_join: JoinSpec,
    /// Only used when an airports table is supplied
    pub airports_join: JoinSpec,
    pub casts: Vec<ColumnCast>,
    pub difference: DifferenceSpec,
    pub label: LabelSpec,
    /// Rows with a null in any of these columns are dropped before encoding
    pub required: Vec<String>,
    /// String columns indexed and one-hot encoded into `{column}_fact`
    pub categorical: Vec<String>,
    /// Assembled in this order into `features_col`
    pub features: Vec<String>,
    pub features_col: String,
    pub handle_invalid: HandleInvalid,
    pub train_ratio: f64,
    pub seed: u64,
    pub num_folds: usize,
    pub reg_params: Vec<f64>,
    pub elastic_net_params: Vec<f64>,
    pub max_iter: usize,
    pub metric: ClassificationMetric,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            planes_join: JoinSpec::new("tailnum").with_rename("year", "plane_year"),
            airports_join: JoinSpec::new("dest").with_rename("faa", "dest"),
            casts: ["arr_delay", "air_time", "month", "plane_year"]
                .into_iter()
                .map(|c| ColumnCast::new(c, NumericType::Int64))
                .collect(),
            difference: DifferenceSpec {
                left: "year".to_string(),
                right: "plane_year".to_string(),
                output: "plane_age".to_string(),
            },
            label: LabelSpec {
                column: "arr_delay".to_string(),
                threshold: 0.0,
                output: "label".to_string(),
            },
            required: [
                "arr_delay",
                "dep_delay",
                "air_time",
                "plane_year",
                "plane_age",
                "month",
                "carrier",
                "dest",
            ]
            .map(String::from)
            .to_vec(),
            categorical: vec!["carrier".to_string(), "dest".to_string()],
            features: ["month", "air_time", "carrier_fact", "dest_fact", "plane_age"]
                .map(String::from)
                .to_vec(),
            features_col: "features".to_string(),
            handle_invalid: HandleInvalid::Error,
            train_ratio: 0.8,
            seed: 42,
            num_folds: 3,
            reg_params: (0..10).map(|i| i as f64 / 100.0).collect(),
            elastic_net_params: vec![0.0, 1.0],
            max_iter: 100,
            metric: ClassificationMetric::AreaUnderRoc,
        }
    }
}

impl WorkflowConfig {
    /// Load a (possibly partial) config; absent fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: WorkflowConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return invalid(format!(
                "train_ratio must be strictly between 0 and 1, got {}",
                self.train_ratio
            ));
        }
        if self.num_folds < 2 {
            return invalid(format!("num_folds must be at least 2, got {}", self.num_folds));
        }
        if self.features.is_empty() {
            return invalid("at least one feature column is required".to_string());
        }
        if self.reg_params.is_empty() || self.elastic_net_params.is_empty() {
            return invalid("reg_params and elastic_net_params need at least one value".to_string());
        }
        if let Some(bad) = self.reg_params.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return invalid(format!("reg_params must be non-negative, got {}", bad));
        }
        if let Some(bad) = self
            .elastic_net_params
            .iter()
            .find(|v| !(0.0..=1.0).contains(*v))
        {
            return invalid(format!(
                "elastic_net_params must be between 0 and 1, got {}",
                bad
            ));
        }
        if self.max_iter == 0 {
            return invalid("max_iter must be at least 1".to_string());
        }
        Ok(())
    }

    fn fact_col(column: &str) -> String {
        format!("{}_fact", column)
    }

    /// Columns the joined table must carry, i.e. everything read but not derived here.
    pub fn input_columns(&self) -> Vec<String> {
        let derived: HashSet<String> = [self.difference.output.clone(), self.label.output.clone()]
            .into_iter()
            .chain(self.categorical.iter().map(|c| Self::fact_col(c)))
            .collect();

        let mut needed: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !derived.contains(name) && !needed.iter().any(|n| n == name) {
                needed.push(name.to_string());
            }
        };

        for cast in &self.casts {
            push(&cast.column);
        }
        push(&self.difference.left);
        push(&self.difference.right);
        push(&self.label.column);
        self.required.iter().for_each(|c| push(c));
        self.categorical.iter().for_each(|c| push(c));
        self.features.iter().for_each(|c| push(c));
        needed
    }
}

/// The three input tables
#[derive(Debug, Clone)]
pub struct Sources {
    pub flights: DataFrame,
    pub planes: DataFrame,
    pub airports: Option<DataFrame>,
}

impl Sources {
    pub fn load(
        flights: &Path,
        planes: &Path,
        airports: Option<&Path>,
        infer_schema_length: usize,
    ) -> Result<Self> {
        Ok(Self {
            flights: load_dataset(flights, infer_schema_length)?,
            planes: load_dataset(planes, infer_schema_length)?,
            airports: airports
                .map(|p| load_dataset(p, infer_schema_length))
                .transpose()?,
        })
    }
}

/// Fail with `MissingColumn` if the joined table could not carry every input column.
///
/// Runs on the raw sources so a misnamed column is reported before any join.
pub fn check_inputs(
    sources: &Sources,
    config: &WorkflowConfig,
) -> std::result::Result<(), PipelineError> {
    let mut available: Vec<String> = column_names(&sources.flights);
    let mut add_secondary = |df: &DataFrame, spec: &JoinSpec| {
        for name in column_names(df) {
            let renamed = spec
                .renames
                .iter()
                .find(|(from, _)| *from == name)
                .map(|(_, to)| to.clone())
                .unwrap_or(name);
            if !available.contains(&renamed) {
                available.push(renamed);
            }
        }
    };
    add_secondary(&sources.planes, &config.planes_join);
    if let Some(airports) = &sources.airports {
        add_secondary(airports, &config.airports_join);
    }

    for column in config.input_columns() {
        if !available.contains(&column) {
            return Err(PipelineError::MissingColumn { column, available });
        }
    }
    Ok(())
}

/// flights ⟕ planes (⟕ airports)
pub fn join_sources(sources: &Sources, config: &WorkflowConfig) -> Result<DataFrame> {
    let joined = left_join(&sources.flights, &sources.planes, &config.planes_join)
        .context("Failed to join flights with planes")?;

    match &sources.airports {
        Some(airports) => left_join(&joined, airports, &config.airports_join)
            .context("Failed to join flights with airports"),
        None => Ok(joined),
    }
}

/// Result of the derivation step
#[derive(Debug, Clone)]
pub struct DerivedTable {
    pub table: DataFrame,
    pub coercions: Vec<CoercionSummary>,
    pub rows_before: usize,
}

impl DerivedTable {
    pub fn dropped_rows(&self) -> usize {
        self.rows_before - self.table.height()
    }
}

/// Casts, derived columns, then null-row filtering, in that order.
pub fn derive_features(df: &DataFrame, config: &WorkflowConfig) -> Result<DerivedTable> {
    let (table, coercions) =
        coerce_columns(df, &config.casts).context("Failed to coerce column types")?;
    let table = with_difference(
        &table,
        &config.difference.left,
        &config.difference.right,
        &config.difference.output,
    )?;
    let table = with_threshold_label(
        &table,
        &config.label.column,
        config.label.threshold,
        &config.label.output,
    )?;
    let rows_before = table.height();
    let table = drop_null_rows(&table, &config.required)?;

    Ok(DerivedTable {
        table,
        coercions,
        rows_before,
    })
}

/// Index + one-hot stages per categorical column, then feature assembly.
pub fn encoding_pipeline(config: &WorkflowConfig) -> Result<Pipeline> {
    let builder = config
        .categorical
        .iter()
        .fold(PipelineBuilder::new(), |b, column| {
            b.categorical(column, config.handle_invalid)
        });

    Ok(builder
        .stage(VectorAssembler::new(
            config.features.iter().cloned(),
            config.features_col.clone(),
        ))
        .build()?)
}

pub fn param_grid(config: &WorkflowConfig) -> Result<ParamGrid> {
    Ok(ParamGridBuilder::new()
        .add_grid(REG_PARAM, config.reg_params.iter().copied())
        .add_grid(ELASTIC_NET_PARAM, config.elastic_net_params.iter().copied())
        .build()?)
}

pub fn evaluator(config: &WorkflowConfig) -> BinaryClassificationEvaluator {
    BinaryClassificationEvaluator::new()
        .with_label_col(config.label.output.clone())
        .with_metric(config.metric)
}

pub fn cross_validator(
    config: &WorkflowConfig,
    show_progress: bool,
) -> Result<CrossValidator<LogisticRegression>> {
    let estimator = LogisticRegression::new()
        .with_features_col(config.features_col.clone())
        .with_label_col(config.label.output.clone())
        .with_max_iter(config.max_iter);

    Ok(CrossValidator::new(estimator, param_grid(config)?, evaluator(config))
        .with_num_folds(config.num_folds)
        .with_seed(config.seed)
        .with_progress(show_progress))
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub joined_rows: usize,
    pub clean_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub coercions: Vec<CoercionSummary>,
    pub encoder: PipelineModel,
    pub cv: CrossValidatorModel<LogisticRegressionModel>,
    /// Test table with probability and prediction columns
    pub predictions: DataFrame,
    pub test_metric: f64,
}

/// Run every step without terminal output.
///
/// The encoder is fit on the full cleaned table before the split, so train
/// and test rows share one category-to-code mapping.
pub fn run(sources: &Sources, config: &WorkflowConfig) -> Result<WorkflowOutcome> {
    config.validate()?;
    check_inputs(sources, config)?;

    let joined = join_sources(sources, config)?;
    let derived = derive_features(&joined, config)?;

    let encoder = encoding_pipeline(config)?
        .fit(&derived.table)
        .context("Failed to fit categorical encoders")?;
    let encoded = encoder.transform(&derived.table)?;

    let (train, test) = train_test_split(&encoded, config.train_ratio, config.seed)?;

    let cv = cross_validator(config, false)?
        .fit(&train)
        .context("Cross-validation failed")?;

    let predictions = cv.transform(&test)?;
    let test_metric = evaluator(config)
        .evaluate(&predictions)
        .context("Failed to evaluate the test set")?;

    Ok(WorkflowOutcome {
        joined_rows: joined.height(),
        clean_rows: derived.table.height(),
        train_rows: train.height(),
        test_rows: test.height(),
        coercions: derived.coercions,
        encoder,
        cv,
        predictions,
        test_metric,
    })
}
