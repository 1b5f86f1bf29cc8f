//! Seeded random partitioning: train/test splits and k-fold assignment

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::error::{PipelineError, Result};

/// Split rows into `weights.len()` disjoint parts by an independent uniform draw per row.
///
/// Weights are normalised. The same table and seed always give the same
/// partition; every row lands in exactly one part and row order is kept.
pub fn random_split(df: &DataFrame, weights: &[f64], seed: u64) -> Result<Vec<DataFrame>> {
    if weights.is_empty() {
        return Err(PipelineError::InvalidConfig(
            "random_split needs at least one weight".to_string(),
        ));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "Split weights must be finite and non-negative, got {:?}",
            weights
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(PipelineError::InvalidConfig(
            "Split weights must not all be zero".to_string(),
        ));
    }

    let mut bounds: Vec<f64> = weights
        .iter()
        .scan(0.0, |acc, w| {
            *acc += w / total;
            Some(*acc)
        })
        .collect();
    if let Some(last) = bounds.last_mut() {
        *last = 1.0;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut parts: Vec<Vec<IdxSize>> = vec![Vec::new(); weights.len()];
    for row in 0..df.height() {
        let draw: f64 = rng.gen();
        let part = bounds
            .iter()
            .position(|&b| draw < b)
            .unwrap_or(weights.len() - 1);
        parts[part].push(row as IdxSize);
    }

    parts
        .into_iter()
        .map(|rows| Ok(df.take(&IdxCa::from_vec("row".into(), rows))?))
        .collect()
}

/// Two-way split with `train_ratio` of the rows (in expectation) going to train.
pub fn train_test_split(
    df: &DataFrame,
    train_ratio: f64,
    seed: u64,
) -> Result<(DataFrame, DataFrame)> {
    if !(0.0..=1.0).contains(&train_ratio) {
        return Err(PipelineError::InvalidConfig(format!(
            "train_ratio must be between 0.0 and 1.0, got {}",
            train_ratio
        )));
    }

    let mut parts = random_split(df, &[train_ratio, 1.0 - train_ratio], seed)?.into_iter();
    match (parts.next(), parts.next()) {
        (Some(train), Some(test)) => Ok((train, test)),
        _ => unreachable!("random_split returns one part per weight"),
    }
}

/// K-Fold splitter over a seeded shuffle of row indices.
///
/// The first `n % k` folds get one extra row.
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    /// (train_indices, validation_indices) per fold.
    pub fn split(&self, n_samples: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        if self.n_splits < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "Cross-validation needs at least 2 folds, got {}",
                self.n_splits
            )));
        }
        if n_samples < self.n_splits {
            return Err(PipelineError::InvalidConfig(format!(
                "Cannot split {} rows into {} folds",
                n_samples, self.n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let size = if i < remainder { fold_size + 1 } else { fold_size };
            let end = start + size;

            let mut validation = indices[start..end].to_vec();
            let mut train = Vec::with_capacity(n_samples - size);
            train.extend_from_slice(&indices[..start]);
            train.extend_from_slice(&indices[end..]);
            validation.sort_unstable();
            train.sort_unstable();

            folds.push((train, validation));
            start = end;
        }

        Ok(folds)
    }
}

/// Rows of `df` at `indices`, in index order.
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    Ok(df.take(&IdxCa::from_vec("row".into(), idx))?)
}
