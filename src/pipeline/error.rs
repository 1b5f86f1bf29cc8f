//! Error types for pipeline stages.
//!
//! `PipelineError` covers the failure modes of the stages themselves
//! (schema checks, encoding, assembly, fitting, evaluation). Orchestration
//! code wraps these in `anyhow` with context, like the rest of the binary.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Result alias used by every stage in the pipeline module.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while fitting or applying pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A column required by a stage is absent from the input table.
    ///
    /// Raised before any processing starts, so a misconfigured run fails fast.
    #[error("Required column '{column}' not found. Available columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    /// A fitted stage met a value it was not fitted on.
    #[error("{stage} cannot apply to column '{column}': unseen value '{value}'")]
    StageApplication {
        stage: &'static str,
        column: String,
        value: String,
    },

    /// A null reached a stage that does not tolerate missing data.
    #[error("Column '{column}' has a null value at row {row}; filter missing rows before assembling features")]
    NullFeature { column: String, row: usize },

    /// A column has a type the stage cannot consume.
    #[error("{stage} cannot use column '{column}' of type {dtype}")]
    UnsupportedType {
        stage: &'static str,
        column: String,
        dtype: String,
    },

    /// Fitting produced no usable model (e.g. only one label class present).
    #[error("Degenerate fit: {0}")]
    DegenerateFit(String),

    /// A metric is undefined for the given table (e.g. only one label class present).
    #[error("Degenerate evaluation: {0}")]
    DegenerateEvaluation(String),

    /// Stage or search configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A parameter map names a parameter the estimator does not have.
    #[error("Unknown parameter '{param}' for {estimator}")]
    UnknownParam {
        estimator: &'static str,
        param: String,
    },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

impl PipelineError {
    /// Whether the error belongs to a single fit/evaluation rather than the run configuration.
    ///
    /// Cross-validation records these per fold instead of aborting the sweep.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            PipelineError::DegenerateFit(_) | PipelineError::DegenerateEvaluation(_)
        )
    }
}
