//! Categorical encoding: string indexing followed by one-hot expansion
//!
//! `StringIndexer` assigns dense codes by descending frequency (ties keep
//! first-seen order). `OneHotEncoder` expands codes into fixed-length
//! vectors. Both are estimators: fitting returns an immutable model that is
//! passed explicitly to every later transform.
//!
//! The indexer must be fit once on the complete table, before any train/test
//! split. Fitting it separately per partition gives the same category
//! different codes in each partition.

use std::collections::HashMap;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::columns::{string_values, vectors_to_column};
use super::error::{PipelineError, Result};
use super::loader::require_columns;
use super::traits::{Estimator, Transformer};

/// What a fitted stage does with a value it did not see during fitting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleInvalid {
    /// Fail with `PipelineError::StageApplication`
    #[default]
    Error,
    /// Indexer: map to the out-of-vocabulary code `k`. Encoder: emit an all-zero vector.
    Keep,
    /// Indexer only: drop the row
    Skip,
}

impl std::fmt::Display for HandleInvalid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleInvalid::Error => write!(f, "error"),
            HandleInvalid::Keep => write!(f, "keep"),
            HandleInvalid::Skip => write!(f, "skip"),
        }
    }
}

impl std::str::FromStr for HandleInvalid {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(HandleInvalid::Error),
            "keep" => Ok(HandleInvalid::Keep),
            "skip" => Ok(HandleInvalid::Skip),
            _ => Err(format!(
                "Unknown invalid-value policy: '{}'. Use 'error', 'keep' or 'skip'.",
                s
            )),
        }
    }
}

// ============================================================================
// String indexer
// ============================================================================

/// Estimator mapping category strings to dense integer codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringIndexer {
    pub input_col: String,
    pub output_col: String,
    pub handle_invalid: HandleInvalid,
}

impl StringIndexer {
    pub fn new(input_col: impl Into<String>, output_col: impl Into<String>) -> Self {
        Self {
            input_col: input_col.into(),
            output_col: output_col.into(),
            handle_invalid: HandleInvalid::default(),
        }
    }

    #[must_use]
    pub fn with_handle_invalid(mut self, handle_invalid: HandleInvalid) -> Self {
        self.handle_invalid = handle_invalid;
        self
    }
}

impl Estimator for StringIndexer {
    type Model = IndexerModel;

    /// Scan the column once and order categories by descending frequency.
    ///
    /// Nulls are not categories and are ignored while fitting.
    fn fit(&self, df: &DataFrame) -> Result<IndexerModel> {
        require_columns(df, &[&self.input_col])?;
        let values = string_values(df.column(&self.input_col)?)?;

        // category -> (count, first-seen position)
        let mut stats: HashMap<&str, (usize, usize)> = HashMap::new();
        for (position, value) in values.iter().enumerate() {
            if let Some(value) = value {
                stats.entry(value.as_str()).or_insert((0, position)).0 += 1;
            }
        }

        if stats.is_empty() {
            return Err(PipelineError::DegenerateFit(format!(
                "column '{}' has no non-null values to index",
                self.input_col
            )));
        }

        let mut ordered: Vec<(&str, usize, usize)> = stats
            .into_iter()
            .map(|(label, (count, first_seen))| (label, count, first_seen))
            .collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        let labels: Vec<String> = ordered.iter().map(|(label, _, _)| label.to_string()).collect();

        Ok(IndexerModel::new(
            self.input_col.clone(),
            self.output_col.clone(),
            self.handle_invalid,
            labels,
        ))
    }
}

/// Fitted category -> code mapping
#[derive(Debug, Clone, Serialize)]
pub struct IndexerModel {
    pub input_col: String,
    pub output_col: String,
    pub handle_invalid: HandleInvalid,
    /// Category for each code; `labels[code]`
    labels: Vec<String>,
    #[serde(skip)]
    lookup: HashMap<String, u32>,
}

impl IndexerModel {
    fn new(
        input_col: String,
        output_col: String,
        handle_invalid: HandleInvalid,
        labels: Vec<String>,
    ) -> Self {
        let lookup = labels
            .iter()
            .enumerate()
            .map(|(code, label)| (label.clone(), code as u32))
            .collect();
        Self {
            input_col,
            output_col,
            handle_invalid,
            labels,
            lookup,
        }
    }

    /// Categories in code order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn code_of(&self, label: &str) -> Option<u32> {
        self.lookup.get(label).copied()
    }

    /// Number of codes this model can emit (includes the out-of-vocabulary code under `Keep`)
    pub fn num_codes(&self) -> usize {
        match self.handle_invalid {
            HandleInvalid::Keep => self.labels.len() + 1,
            _ => self.labels.len(),
        }
    }
}

impl Transformer for IndexerModel {
    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        require_columns(df, &[&self.input_col])?;
        let values = string_values(df.column(&self.input_col)?)?;
        let unseen_code = self.labels.len() as u32;

        let mut codes: Vec<Option<u32>> = Vec::with_capacity(values.len());
        for value in &values {
            match value.as_deref().and_then(|v| self.code_of(v)) {
                Some(code) => codes.push(Some(code)),
                None => match self.handle_invalid {
                    HandleInvalid::Error => {
                        return Err(PipelineError::StageApplication {
                            stage: "StringIndexer",
                            column: self.input_col.clone(),
                            value: value.clone().unwrap_or_else(|| "null".to_string()),
                        })
                    }
                    HandleInvalid::Keep => codes.push(Some(unseen_code)),
                    HandleInvalid::Skip => codes.push(None),
                },
            }
        }

        let codes = UInt32Chunked::from_iter_options(self.output_col.as_str().into(), codes.into_iter());
        let keep = codes.is_not_null();
        let skipped = codes.null_count();

        let mut out = df.clone();
        out.with_column(codes.into_series())?;

        if skipped > 0 {
            out = out.filter(&keep)?;
        }
        Ok(out)
    }
}

// ============================================================================
// One-hot encoder
// ============================================================================

/// Estimator expanding an index column into one-hot vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub input_col: String,
    pub output_col: String,
    /// Drop the last category so vectors have length `k - 1`
    pub drop_last: bool,
    pub handle_invalid: HandleInvalid,
}

impl OneHotEncoder {
    pub fn new(input_col: impl Into<String>, output_col: impl Into<String>) -> Self {
        Self {
            input_col: input_col.into(),
            output_col: output_col.into(),
            drop_last: true,
            handle_invalid: HandleInvalid::default(),
        }
    }

    #[must_use]
    pub fn with_drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    #[must_use]
    pub fn with_handle_invalid(mut self, handle_invalid: HandleInvalid) -> Self {
        self.handle_invalid = handle_invalid;
        self
    }
}

impl Estimator for OneHotEncoder {
    type Model = OneHotModel;

    /// Learn the number of categories as `max(code) + 1`.
    ///
    /// Under `Keep` one more slot is reserved for the out-of-vocabulary code,
    /// so with `drop_last` it is the unseen value that encodes as all zeros.
    fn fit(&self, df: &DataFrame) -> Result<OneHotModel> {
        if self.handle_invalid == HandleInvalid::Skip {
            return Err(PipelineError::InvalidConfig(format!(
                "OneHotEncoder on '{}' supports 'error' or 'keep', not 'skip'",
                self.input_col
            )));
        }
        require_columns(df, &[&self.input_col])?;

        let codes = df.column(&self.input_col)?.cast(&DataType::UInt32)?;
        let max_code = codes.u32()?.into_iter().flatten().max().ok_or_else(|| {
            PipelineError::DegenerateFit(format!(
                "column '{}' has no codes to encode",
                self.input_col
            ))
        })?;

        let unseen_slot = usize::from(self.handle_invalid == HandleInvalid::Keep);
        Ok(OneHotModel {
            input_col: self.input_col.clone(),
            output_col: self.output_col.clone(),
            drop_last: self.drop_last,
            handle_invalid: self.handle_invalid,
            category_size: max_code as usize + 1 + unseen_slot,
        })
    }
}

/// Fitted one-hot expansion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneHotModel {
    pub input_col: String,
    pub output_col: String,
    pub drop_last: bool,
    pub handle_invalid: HandleInvalid,
    /// Number of categories observed while fitting
    pub category_size: usize,
}

impl OneHotModel {
    /// Length of every emitted vector
    pub fn vector_len(&self) -> usize {
        if self.drop_last {
            self.category_size.saturating_sub(1)
        } else {
            self.category_size
        }
    }

    fn encode(&self, row: usize, code: Option<u32>) -> Result<Vec<f64>> {
        let mut vector = vec![0.0; self.vector_len()];
        match code {
            Some(code) if (code as usize) < self.category_size => {
                // The dropped last category is the all-zero vector
                if let Some(slot) = vector.get_mut(code as usize) {
                    *slot = 1.0;
                }
                Ok(vector)
            }
            other => match self.handle_invalid {
                HandleInvalid::Keep => Ok(vector),
                _ => Err(PipelineError::StageApplication {
                    stage: "OneHotEncoder",
                    column: self.input_col.clone(),
                    value: other
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| format!("null (row {})", row)),
                }),
            },
        }
    }
}

impl Transformer for OneHotModel {
    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        require_columns(df, &[&self.input_col])?;
        let codes = df.column(&self.input_col)?.cast(&DataType::UInt32)?;

        let vectors = codes
            .u32()?
            .into_iter()
            .enumerate()
            .map(|(row, code)| self.encode(row, code))
            .collect::<Result<Vec<Vec<f64>>>>()?;

        let mut out = df.clone();
        out.with_column(vectors_to_column(&self.output_col, &vectors))?;
        Ok(out)
    }
}
