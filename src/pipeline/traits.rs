//! Estimator/transformer seams shared by encoders, pipelines and classifiers

use polars::prelude::DataFrame;

use super::error::Result;
use super::tuning::ParamMap;

/// A pure table-to-table operation with no training step.
pub trait Transformer {
    fn transform(&self, df: &DataFrame) -> Result<DataFrame>;
}

/// Configuration that produces a fitted [`Transformer`] from a table.
///
/// Estimators are shared by reference across cross-validation workers,
/// hence the `Sync` bound.
pub trait Estimator: Sync {
    type Model: Transformer;

    fn fit(&self, df: &DataFrame) -> Result<Self::Model>;
}

/// An estimator whose hyperparameters can be overridden from a [`ParamMap`].
pub trait Tunable: Estimator + Sized {
    /// A copy of `self` with every parameter in `params` applied.
    ///
    /// Unknown names fail with [`PipelineError::UnknownParam`](super::PipelineError::UnknownParam).
    fn with_params(&self, params: &ParamMap) -> Result<Self>;
}
