//! Hyperparameter grids and k-fold cross-validated model selection

use std::collections::HashSet;
use std::fmt;

use indicatif::ProgressBar;
use polars::prelude::DataFrame;
use rayon::prelude::*;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::error::{PipelineError, Result};
use super::evaluation::BinaryClassificationEvaluator;
use super::split::{take_rows, KFold};
use super::traits::{Estimator, Transformer, Tunable};
use crate::utils::progress::{create_progress_bar, finish_with_success, finish_with_warning};

pub const DEFAULT_NUM_FOLDS: usize = 3;

/// A single hyperparameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ParamValue::Float(v) => Some(v),
            ParamValue::Int(v) => Some(v as f64),
            ParamValue::Bool(_) => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match *self {
            ParamValue::Int(v) => usize::try_from(v).ok(),
            ParamValue::Float(v) if v >= 0.0 && v.fract() == 0.0 => Some(v as usize),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ParamValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

/// Ordered name -> value assignment for one grid point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap {
    entries: Vec<(String, ParamValue)>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing an earlier value for the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ParamMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "(defaults)");
        }
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(n, v)| format!("{}={}", n, v))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl Serialize for ParamMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Builds the cartesian product of per-parameter value lists
#[derive(Debug, Clone, Default)]
pub struct ParamGridBuilder {
    axes: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGridBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add_grid<V, I>(mut self, name: impl Into<String>, values: I) -> Self
    where
        V: Into<ParamValue>,
        I: IntoIterator<Item = V>,
    {
        self.axes
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Enumerate every grid point.
    ///
    /// The most recently added parameter varies fastest. With no axes the
    /// grid holds a single empty point, i.e. the estimator as configured.
    pub fn build(self) -> Result<ParamGrid> {
        let mut names = HashSet::new();
        for (name, values) in &self.axes {
            if !names.insert(name.as_str()) {
                return Err(PipelineError::InvalidConfig(format!(
                    "Parameter '{}' appears in the grid more than once",
                    name
                )));
            }
            if values.is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "Parameter '{}' has no candidate values",
                    name
                )));
            }
        }

        let mut points = vec![ParamMap::new()];
        for (name, values) in &self.axes {
            points = points
                .into_iter()
                .flat_map(|point| {
                    values
                        .iter()
                        .map(move |v| point.clone().with(name.clone(), *v))
                })
                .collect();
        }

        Ok(ParamGrid { points })
    }
}

/// Enumerated hyperparameter grid
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    points: Vec<ParamMap>,
}

impl ParamGrid {
    pub fn points(&self) -> &[ParamMap] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One (grid point, fold) fit that did not produce a score
#[derive(Debug, Clone, Serialize)]
pub struct FoldFailure {
    pub grid_index: usize,
    pub fold: usize,
    pub params: ParamMap,
    pub reason: String,
}

/// Cross-validation result for one grid point
#[derive(Debug, Clone, Serialize)]
pub struct GridScore {
    pub params: ParamMap,
    /// Mean over all folds; failed folds contribute 0.0
    pub mean: f64,
    pub std: f64,
    pub fold_scores: Vec<Option<f64>>,
    pub failures: usize,
}

/// K-fold grid search over a [`Tunable`] estimator
pub struct CrossValidator<E: Tunable> {
    estimator: E,
    grid: ParamGrid,
    evaluator: BinaryClassificationEvaluator,
    num_folds: usize,
    seed: u64,
    show_progress: bool,
}

impl<E: Tunable> CrossValidator<E> {
    pub fn new(estimator: E, grid: ParamGrid, evaluator: BinaryClassificationEvaluator) -> Self {
        Self {
            estimator,
            grid,
            evaluator,
            num_folds: DEFAULT_NUM_FOLDS,
            seed: 0,
            show_progress: false,
        }
    }

    #[must_use]
    pub fn with_num_folds(mut self, num_folds: usize) -> Self {
        self.num_folds = num_folds;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn num_folds(&self) -> usize {
        self.num_folds
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    /// Score every grid point on every fold, then refit the best point on all of `df`.
    ///
    /// Fold fits run in parallel. A degenerate fit or evaluation is recorded
    /// as a [`FoldFailure`] and scores 0.0 for that fold; the sweep itself
    /// only fails when every fold fit fails. Any other error (a missing
    /// column, a non-binary label) aborts the sweep. Ties on mean score go to
    /// the earliest grid point.
    pub fn fit(&self, df: &DataFrame) -> Result<CrossValidatorModel<E::Model>> {
        if self.grid.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "Parameter grid has no points".to_string(),
            ));
        }

        let candidates: Vec<E> = self
            .grid
            .points()
            .iter()
            .map(|p| self.estimator.with_params(p))
            .collect::<Result<_>>()?;

        let folds: Vec<(DataFrame, DataFrame)> = KFold::new(self.num_folds, self.seed)
            .split(df.height())?
            .into_iter()
            .map(|(train, validation)| Ok((take_rows(df, &train)?, take_rows(df, &validation)?)))
            .collect::<Result<_>>()?;

        let tasks: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|g| (0..self.num_folds).map(move |f| (g, f)))
            .collect();

        let pb = if self.show_progress {
            create_progress_bar(tasks.len() as u64, "Cross-validating")
        } else {
            ProgressBar::hidden()
        };

        let outcomes: Vec<(usize, usize, Result<f64>)> = tasks
            .par_iter()
            .map(|&(g, f)| {
                let (train, validation) = &folds[f];
                let outcome = candidates[g]
                    .fit(train)
                    .and_then(|model| model.transform(validation))
                    .and_then(|scored| self.evaluator.evaluate(&scored));
                pb.inc(1);
                (g, f, outcome)
            })
            .collect();

        let mut fold_scores = vec![vec![None; self.num_folds]; candidates.len()];
        let mut failures = Vec::new();
        for (g, f, outcome) in outcomes {
            match outcome {
                Ok(score) => fold_scores[g][f] = Some(score),
                Err(e) if e.is_degenerate() => failures.push(FoldFailure {
                    grid_index: g,
                    fold: f,
                    params: self.grid.points()[g].clone(),
                    reason: e.to_string(),
                }),
                Err(e) => {
                    finish_with_warning(&pb, "cross-validation aborted");
                    return Err(e);
                }
            }
        }

        if failures.len() == tasks.len() {
            finish_with_warning(&pb, "every fold fit failed");
            let first = failures
                .first()
                .map(|fl| fl.reason.clone())
                .unwrap_or_default();
            return Err(PipelineError::DegenerateFit(format!(
                "all {} fold fits failed; first failure: {}",
                tasks.len(),
                first
            )));
        }

        let scores: Vec<GridScore> = fold_scores
            .into_iter()
            .zip(self.grid.points())
            .map(|(per_fold, params)| {
                let values: Vec<f64> = per_fold.iter().map(|s| s.unwrap_or(0.0)).collect();
                let k = values.len() as f64;
                let mean = values.iter().sum::<f64>() / k;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / k;
                GridScore {
                    params: params.clone(),
                    mean,
                    std: var.sqrt(),
                    failures: per_fold.iter().filter(|s| s.is_none()).count(),
                    fold_scores: per_fold,
                }
            })
            .collect();

        let larger_better = self.evaluator.is_larger_better();
        let mut best_index = 0;
        for (i, score) in scores.iter().enumerate().skip(1) {
            let better = if larger_better {
                score.mean > scores[best_index].mean
            } else {
                score.mean < scores[best_index].mean
            };
            if better {
                best_index = i;
            }
        }

        if failures.is_empty() {
            finish_with_success(&pb, &format!("{} fold fits", tasks.len()));
        } else {
            finish_with_warning(
                &pb,
                &format!("{} of {} fold fits failed", failures.len(), tasks.len()),
            );
        }

        let best_model = candidates[best_index].fit(df)?;

        Ok(CrossValidatorModel {
            best_model,
            best_index,
            best_params: self.grid.points()[best_index].clone(),
            scores,
            failures,
            fold_fits: tasks.len(),
            num_folds: self.num_folds,
        })
    }
}

/// Best model refit on the full training table, plus the search record
#[derive(Debug, Clone)]
pub struct CrossValidatorModel<M> {
    pub best_model: M,
    pub best_index: usize,
    pub best_params: ParamMap,
    pub scores: Vec<GridScore>,
    pub failures: Vec<FoldFailure>,
    /// Number of (grid point, fold) fits attempted
    pub fold_fits: usize,
    pub num_folds: usize,
}

impl<M> CrossValidatorModel<M> {
    pub fn best_score(&self) -> &GridScore {
        &self.scores[self.best_index]
    }

    pub fn avg_metrics(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.mean).collect()
    }
}

impl<M: Transformer> Transformer for CrossValidatorModel<M> {
    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.best_model.transform(df)
    }
}
