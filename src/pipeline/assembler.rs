//! Feature vector assembly and matrix extraction

use faer::Mat;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::columns::{column_to_vectors, f64_values, vectors_to_column};
use super::error::{PipelineError, Result};
use super::loader::require_columns;
use super::traits::Transformer;

const STAGE: &str = "VectorAssembler";

/// Concatenates scalar and vector columns, in the given order, into one vector column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorAssembler {
    pub input_cols: Vec<String>,
    pub output_col: String,
}

impl VectorAssembler {
    pub fn new<I, S>(input_cols: I, output_col: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input_cols: input_cols.into_iter().map(Into::into).collect(),
            output_col: output_col.into(),
        }
    }
}

impl Transformer for VectorAssembler {
    /// Nulls are not tolerated; any null fails with `PipelineError::NullFeature`.
    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if self.input_cols.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "VectorAssembler needs at least one input column".to_string(),
            ));
        }
        require_columns(df, &self.input_cols)?;

        let mut rows: Vec<Vec<f64>> = vec![Vec::new(); df.height()];

        for name in &self.input_cols {
            let column = df.column(name)?;
            if matches!(column.dtype(), DataType::List(_)) {
                let vectors = column_to_vectors(df, name, STAGE)?;
                let width = vectors.first().map(|v| v.len()).unwrap_or(0);
                for (row, (acc, vector)) in rows.iter_mut().zip(vectors).enumerate() {
                    if vector.len() != width {
                        return Err(PipelineError::InvalidConfig(format!(
                            "Vector column '{}' has length {} at row {} but {} at row 0",
                            name,
                            vector.len(),
                            row,
                            width
                        )));
                    }
                    acc.extend(vector);
                }
            } else {
                let values = f64_values(df, name, STAGE)?;
                for (acc, value) in rows.iter_mut().zip(values) {
                    acc.push(value);
                }
            }
        }

        let mut out = df.clone();
        out.with_column(vectors_to_column(&self.output_col, &rows))?;
        Ok(out)
    }
}

/// Row-major feature matrix from an assembled vector column.
pub fn feature_matrix(df: &DataFrame, features_col: &str) -> Result<Mat<f64>> {
    require_columns(df, &[features_col])?;
    let rows = column_to_vectors(df, features_col, "feature matrix")?;
    let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);

    if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
        return Err(PipelineError::InvalidConfig(format!(
            "Feature vectors differ in length: {} at row {}, expected {}",
            r.len(),
            row,
            n_cols
        )));
    }

    Ok(Mat::from_fn(rows.len(), n_cols, |i, j| rows[i][j]))
}

/// Binary labels as 0.0/1.0, failing on nulls or any other value.
pub fn label_values(df: &DataFrame, label_col: &str) -> Result<Vec<f64>> {
    require_columns(df, &[label_col])?;
    let labels = f64_values(df, label_col, "label")?;
    if let Some(bad) = labels.iter().find(|&&y| y != 0.0 && y != 1.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "Label column '{}' must be binary (0/1), found {}",
            label_col, bad
        )));
    }
    Ok(labels)
}
