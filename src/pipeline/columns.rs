//! Column access helpers shared by the stages

use polars::prelude::*;

use super::error::{PipelineError, Result};

/// Convert a column to a Vec of Option<String> for key matching and category lookup
pub fn string_values(col: &Column) -> Result<Vec<Option<String>>> {
    let values: Vec<Option<String>> = match col.dtype() {
        DataType::String => col
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let cast = col.cast(&DataType::Int64)?;
            cast.i64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            let cast = col.cast(&DataType::UInt64)?;
            cast.u64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::Float32 | DataType::Float64 => {
            let cast = col.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| v.map(|n| format!("{}", n)))
                .collect()
        }
        DataType::Boolean => col
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()))
            .collect(),
        _ => {
            let cast = col.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect()
        }
    };

    Ok(values)
}

/// Read a numeric column as f64 values, failing on the first null.
pub fn f64_values(df: &DataFrame, name: &str, stage: &'static str) -> Result<Vec<f64>> {
    let col = df.column(name)?;
    if !col.dtype().is_primitive_numeric() && col.dtype() != &DataType::Boolean {
        return Err(PipelineError::UnsupportedType {
            stage,
            column: name.to_string(),
            dtype: col.dtype().to_string(),
        });
    }

    let cast = col.cast(&DataType::Float64)?;
    cast.f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| PipelineError::NullFeature {
                column: name.to_string(),
                row,
            })
        })
        .collect()
}

/// Build a `List(Float64)` column with one vector per row.
pub fn vectors_to_column(name: &str, rows: &[Vec<f64>]) -> Column {
    let values_capacity = rows.iter().map(|r| r.len()).sum();
    let mut builder = ListPrimitiveChunkedBuilder::<Float64Type>::new(
        name.into(),
        rows.len(),
        values_capacity,
        DataType::Float64,
    );
    for row in rows {
        builder.append_slice(row);
    }
    builder.finish().into_series().into_column()
}

/// Read a `List(Float64)` column back into one vector per row.
pub fn column_to_vectors(df: &DataFrame, name: &str, stage: &'static str) -> Result<Vec<Vec<f64>>> {
    let col = df.column(name)?;
    if !matches!(col.dtype(), DataType::List(_)) {
        return Err(PipelineError::UnsupportedType {
            stage,
            column: name.to_string(),
            dtype: col.dtype().to_string(),
        });
    }

    let lists = col.as_materialized_series().list()?;
    let mut rows = Vec::with_capacity(lists.len());
    for (row, entry) in lists.into_iter().enumerate() {
        let series = entry.ok_or_else(|| PipelineError::NullFeature {
            column: name.to_string(),
            row,
        })?;
        let series = series.cast(&DataType::Float64)?;
        let values = series
            .f64()?
            .into_iter()
            .map(|v| {
                v.ok_or_else(|| PipelineError::NullFeature {
                    column: name.to_string(),
                    row,
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(values);
    }

    Ok(rows)
}
