//! Left-outer joins between the event table and its reference tables
//!
//! The join is a build/probe hash join: the secondary table is hashed on its
//! key (first occurrence wins), then every primary row probes it. Secondary
//! columns are gathered with nullable row indices, so unmatched primary rows
//! get nulls and the primary row order and row count are preserved exactly.

use std::collections::{HashMap, HashSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::columns::string_values;
use super::error::{PipelineError, Result};
use super::loader::{column_names, require_columns};

fn default_collision_prefix() -> String {
    "right_".to_string()
}

/// How a secondary table is attached to the primary table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// Key column present in both tables (after renames)
    pub key: String,
    /// Renames applied to the secondary table before joining, as (from, to)
    #[serde(default)]
    pub renames: Vec<(String, String)>,
    /// Prefix for secondary columns that still collide with primary columns
    #[serde(default = "default_collision_prefix")]
    pub collision_prefix: String,
}

impl JoinSpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            renames: Vec::new(),
            collision_prefix: default_collision_prefix(),
        }
    }

    #[must_use]
    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.push((from.into(), to.into()));
        self
    }

    #[must_use]
    pub fn with_collision_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.collision_prefix = prefix.into();
        self
    }
}

/// Rename columns, failing if a source column does not exist.
pub fn rename_columns(df: &DataFrame, renames: &[(String, String)]) -> Result<DataFrame> {
    let mut out = df.clone();
    for (from, to) in renames {
        require_columns(&out, &[from])?;
        out.rename(from, to.as_str().into())?;
    }
    Ok(out)
}

/// Left-outer join `primary` against `secondary` on `spec.key`.
///
/// Guarantees: `result.height() == primary.height()`, primary columns and
/// order untouched, every secondary non-key column present exactly once.
pub fn left_join(primary: &DataFrame, secondary: &DataFrame, spec: &JoinSpec) -> Result<DataFrame> {
    let secondary = rename_columns(secondary, &spec.renames)?;
    require_columns(primary, &[&spec.key])?;
    require_columns(&secondary, &[&spec.key])?;

    let secondary = resolve_collisions(primary, &secondary, spec)?;

    // Build: key -> first secondary row
    let build_keys = string_values(secondary.column(&spec.key)?)?;
    let mut lookup: HashMap<String, IdxSize> = HashMap::with_capacity(build_keys.len());
    for (row, key) in build_keys.into_iter().enumerate() {
        if let Some(key) = key {
            lookup.entry(key).or_insert(row as IdxSize);
        }
    }

    // Probe: nullable gather indices, one per primary row
    let probe_keys = string_values(primary.column(&spec.key)?)?;
    let indices = IdxCa::from_iter_options(
        "right_row".into(),
        probe_keys
            .iter()
            .map(|key| key.as_ref().and_then(|k| lookup.get(k).copied())),
    );

    let payload = secondary.drop(&spec.key)?;
    let gathered = payload.take(&indices)?;

    Ok(primary.hstack(gathered.get_columns())?)
}

/// Rename secondary columns that collide with primary columns using the prefix.
fn resolve_collisions(
    primary: &DataFrame,
    secondary: &DataFrame,
    spec: &JoinSpec,
) -> Result<DataFrame> {
    let primary_names: HashSet<String> = column_names(primary).into_iter().collect();
    let secondary_names = column_names(secondary);

    let renames: Vec<(String, String)> = secondary_names
        .iter()
        .filter(|name| **name != spec.key && primary_names.contains(*name))
        .map(|name| (name.clone(), format!("{}{}", spec.collision_prefix, name)))
        .collect();

    for (_, to) in &renames {
        if primary_names.contains(to) || secondary_names.contains(to) {
            return Err(PipelineError::InvalidConfig(format!(
                "Column '{}' would still collide after renaming; add an explicit rename",
                to
            )));
        }
    }

    rename_columns(secondary, &renames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flights() -> DataFrame {
        df! {
            "year" => [2014i64, 2014, 2014, 2014],
            "tailnum" => [Some("N1"), Some("N2"), Some("N9"), None],
            "dest" => ["SEA", "PDX", "SEA", "LAX"],
        }
        .unwrap()
    }

    fn planes() -> DataFrame {
        df! {
            "tailnum" => ["N2", "N1", "N1"],
            "year" => [2001i64, 1998, 2010],
            "seats" => [150i64, 180, 200],
        }
        .unwrap()
    }

    #[test]
    fn test_left_join_keeps_every_primary_row() {
        let spec = JoinSpec::new("tailnum").with_rename("year", "plane_year");
        let joined = left_join(&flights(), &planes(), &spec).unwrap();

        assert_eq!(joined.height(), 4);
        let plane_year: Vec<Option<i64>> = joined
            .column("plane_year")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        // N1 takes the first planes row with that key; N9 and null do not match
        assert_eq!(plane_year, vec![Some(1998), Some(2001), None, None]);
    }

    #[test]
    fn test_left_join_prefixes_unrenamed_collision() {
        let spec = JoinSpec::new("tailnum");
        let joined = left_join(&flights(), &planes(), &spec).unwrap();

        let names = column_names(&joined);
        assert!(names.contains(&"year".to_string()));
        assert!(names.contains(&"right_year".to_string()));
        let year: Vec<Option<i64>> = joined
            .column("year")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert!(year.iter().all(|y| *y == Some(2014)));
    }

    #[test]
    fn test_left_join_missing_key_is_fatal() {
        let spec = JoinSpec::new("registration");
        let err = left_join(&flights(), &planes(), &spec).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }

    #[test]
    fn test_left_join_empty_secondary() {
        let empty = planes().head(Some(0));
        let spec = JoinSpec::new("tailnum").with_rename("year", "plane_year");
        let joined = left_join(&flights(), &empty, &spec).unwrap();
        assert_eq!(joined.height(), 4);
        assert_eq!(joined.column("seats").unwrap().null_count(), 4);
    }

    #[test]
    fn test_rename_unknown_column_fails() {
        let result = rename_columns(&planes(), &[("faa".to_string(), "dest".to_string())]);
        assert!(matches!(result, Err(PipelineError::MissingColumn { .. })));
    }
}
