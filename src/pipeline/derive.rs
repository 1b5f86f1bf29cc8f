//! Type coercion, derived columns, and missing-row filtering
//!
//! Malformed values become missing values: coercion never fails on data,
//! it turns unparsable entries into nulls, and `drop_null_rows` removes them
//! once every derivation that could introduce a null has run.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::Result;
use super::loader::require_columns;

/// Numeric type a column is declared as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericType {
    Int64,
    Float64,
}

impl NumericType {
    pub fn dtype(self) -> DataType {
        match self {
            NumericType::Int64 => DataType::Int64,
            NumericType::Float64 => DataType::Float64,
        }
    }
}

/// A declared column type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCast {
    pub column: String,
    pub dtype: NumericType,
}

impl ColumnCast {
    pub fn new(column: impl Into<String>, dtype: NumericType) -> Self {
        Self {
            column: column.into(),
            dtype,
        }
    }
}

/// Nulls introduced by coercing one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionSummary {
    pub column: String,
    /// Non-null values that could not be coerced and became null
    pub introduced_nulls: usize,
}

/// Cast columns to their declared numeric types.
///
/// Values that cannot be represented in the target type become null; this
/// never fails on data. Returns the new table plus, per cast column, how many
/// values were nulled by the cast.
pub fn coerce_columns(
    df: &DataFrame,
    casts: &[ColumnCast],
) -> Result<(DataFrame, Vec<CoercionSummary>)> {
    let names: Vec<&str> = casts.iter().map(|c| c.column.as_str()).collect();
    require_columns(df, &names)?;

    let mut out = df.clone();
    let mut summaries = Vec::with_capacity(casts.len());

    for cast in casts {
        let original = df.column(&cast.column)?;
        let coerced = original.cast(&cast.dtype.dtype())?;

        summaries.push(CoercionSummary {
            column: cast.column.clone(),
            introduced_nulls: coerced.null_count().saturating_sub(original.null_count()),
        });
        out.with_column(coerced)?;
    }

    Ok((out, summaries))
}

/// Add `output = left - right`; null where either operand is null.
pub fn with_difference(df: &DataFrame, left: &str, right: &str, output: &str) -> Result<DataFrame> {
    require_columns(df, &[left, right])?;

    let out = df
        .clone()
        .lazy()
        .with_column((col(left) - col(right)).alias(output))
        .collect()?;
    Ok(out)
}

/// Add an Int32 0/1 label `output = (column > threshold)`; null where the input is null.
pub fn with_threshold_label(
    df: &DataFrame,
    column: &str,
    threshold: f64,
    output: &str,
) -> Result<DataFrame> {
    require_columns(df, &[column])?;

    let out = df
        .clone()
        .lazy()
        .with_column(
            col(column)
                .cast(DataType::Float64)
                .gt(lit(threshold))
                .cast(DataType::Int32)
                .alias(output),
        )
        .collect()?;
    Ok(out)
}

/// Remove exactly the rows where at least one of `required` is null.
pub fn drop_null_rows<S: AsRef<str>>(df: &DataFrame, required: &[S]) -> Result<DataFrame> {
    require_columns(df, required)?;

    let mut keep = BooleanChunked::full("keep".into(), true, df.height());
    for name in required {
        let column = df.column(name.as_ref())?;
        keep = &keep & &column.is_not_null();
    }

    Ok(df.filter(&keep)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_malformed_values_become_null() {
        let df = df! {
            "arr_delay" => ["12", "NA", "-3", "late", ""],
        }
        .unwrap();

        let (out, summaries) =
            coerce_columns(&df, &[ColumnCast::new("arr_delay", NumericType::Int64)]).unwrap();

        let values: Vec<Option<i64>> = out
            .column("arr_delay")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(values, vec![Some(12), None, Some(-3), None, None]);
        assert_eq!(summaries[0].introduced_nulls, 3);
    }

    #[test]
    fn test_coerce_keeps_existing_nulls_uncounted() {
        let df = df! {
            "air_time" => [Some(1.5f64), None, Some(3.0)],
        }
        .unwrap();
        let (out, summaries) =
            coerce_columns(&df, &[ColumnCast::new("air_time", NumericType::Int64)]).unwrap();
        assert_eq!(out.column("air_time").unwrap().null_count(), 1);
        assert_eq!(summaries[0].introduced_nulls, 0);
    }

    #[test]
    fn test_difference_propagates_nulls() {
        let df = df! {
            "year" => [Some(2014i64), Some(2014), None],
            "plane_year" => [Some(2004i64), None, Some(2000)],
        }
        .unwrap();
        let out = with_difference(&df, "year", "plane_year", "plane_age").unwrap();
        let age: Vec<Option<i64>> = out
            .column("plane_age")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(age, vec![Some(10), None, None]);
    }

    #[test]
    fn test_threshold_label() {
        let df = df! {
            "arr_delay" => [Some(5i64), Some(0), Some(-7), None],
        }
        .unwrap();
        let out = with_threshold_label(&df, "arr_delay", 0.0, "label").unwrap();
        let label: Vec<Option<i32>> = out
            .column("label")
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(label, vec![Some(1), Some(0), Some(0), None]);
    }

    #[test]
    fn test_drop_null_rows_exact() {
        let df = df! {
            "a" => [Some(1i64), None, Some(3), Some(4), Some(5)],
            "b" => [Some(1i64), Some(2), None, Some(4), Some(5)],
            "c" => [Some(1i64), Some(2), Some(3), Some(4), None],
            "untouched" => [None::<i64>, None, None, Some(1), None],
        }
        .unwrap();

        let out = drop_null_rows(&df, &["a", "b", "c"]).unwrap();
        let a: Vec<Option<i64>> = out.column("a").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(a, vec![Some(1), Some(4)]);
    }

    #[test]
    fn test_derivation_on_missing_column_fails() {
        let df = df! { "year" => [2014i64] }.unwrap();
        assert!(with_difference(&df, "year", "plane_year", "plane_age").is_err());
        assert!(drop_null_rows(&df, &["plane_year"]).is_err());
    }
}
