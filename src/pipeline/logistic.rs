//! Binary logistic regression with elastic-net regularization
//!
//! Minimises the mean log-loss plus
//! `reg_param * ((1 - elastic_net_param) / 2 * ||w||² + elastic_net_param * ||w||₁)`
//! with accelerated proximal gradient descent (FISTA) on standardized
//! features. The intercept is never penalized. Coefficients are reported on
//! the original feature scale.

use faer::Mat;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::assembler::{feature_matrix, label_values};
use super::error::{PipelineError, Result};
use super::traits::{Estimator, Transformer, Tunable};
use super::tuning::ParamMap;

pub const REG_PARAM: &str = "reg_param";
pub const ELASTIC_NET_PARAM: &str = "elastic_net_param";
pub const MAX_ITER: &str = "max_iter";
pub const TOL: &str = "tol";
pub const FIT_INTERCEPT: &str = "fit_intercept";

/// Logistic regression estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub features_col: String,
    pub label_col: String,
    pub probability_col: String,
    pub prediction_col: String,
    /// Overall regularization strength (lambda)
    pub reg_param: f64,
    /// L1/L2 mix: 0.0 is ridge, 1.0 is lasso
    pub elastic_net_param: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub fit_intercept: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            features_col: "features".to_string(),
            label_col: "label".to_string(),
            probability_col: "probability".to_string(),
            prediction_col: "prediction".to_string(),
            reg_param: 0.0,
            elastic_net_param: 0.0,
            max_iter: 100,
            tol: 1e-6,
            fit_intercept: true,
        }
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_features_col(mut self, col: impl Into<String>) -> Self {
        self.features_col = col.into();
        self
    }

    #[must_use]
    pub fn with_label_col(mut self, col: impl Into<String>) -> Self {
        self.label_col = col.into();
        self
    }

    #[must_use]
    pub fn with_reg_param(mut self, reg_param: f64) -> Self {
        self.reg_param = reg_param;
        self
    }

    #[must_use]
    pub fn with_elastic_net_param(mut self, elastic_net_param: f64) -> Self {
        self.elastic_net_param = elastic_net_param;
        self
    }

    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.reg_param.is_finite() || self.reg_param < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "reg_param must be non-negative, got {}",
                self.reg_param
            )));
        }
        if !(0.0..=1.0).contains(&self.elastic_net_param) {
            return Err(PipelineError::InvalidConfig(format!(
                "elastic_net_param must be between 0.0 and 1.0, got {}",
                self.elastic_net_param
            )));
        }
        if self.max_iter == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_iter must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Per-column centre and scale used to standardize the design matrix
fn column_scaling(x: &Mat<f64>, center: bool) -> (Vec<f64>, Vec<f64>) {
    let (n, p) = (x.nrows(), x.ncols());
    let mut means = vec![0.0; p];
    let mut scales = vec![1.0; p];

    for j in 0..p {
        let mean = (0..n).map(|i| x[(i, j)]).sum::<f64>() / n as f64;
        let var = (0..n).map(|i| (x[(i, j)] - mean).powi(2)).sum::<f64>() / n as f64;
        let std = var.sqrt();
        means[j] = if center { mean } else { 0.0 };
        // Constant columns are left unscaled
        scales[j] = if std > 0.0 { std } else { 1.0 };
    }

    (means, scales)
}

impl Estimator for LogisticRegression {
    type Model = LogisticRegressionModel;

    fn fit(&self, df: &DataFrame) -> Result<LogisticRegressionModel> {
        self.validate()?;

        let x = feature_matrix(df, &self.features_col)?;
        let y = label_values(df, &self.label_col)?;
        let (n, p) = (x.nrows(), x.ncols());

        if n == 0 {
            return Err(PipelineError::DegenerateFit(
                "cannot fit on an empty table".to_string(),
            ));
        }
        let positives = y.iter().filter(|&&v| v == 1.0).count();
        if positives == 0 || positives == n {
            return Err(PipelineError::DegenerateFit(format!(
                "label column '{}' contains a single class ({} of {} rows positive)",
                self.label_col, positives, n
            )));
        }

        let (means, scales) = column_scaling(&x, self.fit_intercept);
        let xs = Mat::from_fn(n, p, |i, j| (x[(i, j)] - means[j]) / scales[j]);

        let l2 = self.reg_param * (1.0 - self.elastic_net_param);
        let l1 = self.reg_param * self.elastic_net_param;

        // Lipschitz bound of the smooth part: ||X||_F² / (4n) + l2
        let frobenius = (0..p)
            .map(|j| (0..n).map(|i| xs[(i, j)].powi(2)).sum::<f64>())
            .sum::<f64>()
            / n as f64;
        let intercept_term = if self.fit_intercept { 1.0 } else { 0.0 };
        let lipschitz = (0.25 * (frobenius + intercept_term) + l2).max(1e-12);
        let step = 1.0 / lipschitz;

        let mut w = Mat::<f64>::zeros(p, 1);
        let mut b = if self.fit_intercept {
            let rate = positives as f64 / n as f64;
            (rate / (1.0 - rate)).ln()
        } else {
            0.0
        };
        let mut v = w.clone();
        let mut vb = b;
        let mut t = 1.0f64;

        for _ in 0..self.max_iter {
            let z = &xs * &v;
            let residual = Mat::from_fn(n, 1, |i, _| sigmoid(z[(i, 0)] + vb) - y[i]);
            let grad = xs.transpose() * &residual;
            let grad_b = (0..n).map(|i| residual[(i, 0)]).sum::<f64>() / n as f64;

            let w_next = Mat::from_fn(p, 1, |j, _| {
                let g = grad[(j, 0)] / n as f64 + l2 * v[(j, 0)];
                soft_threshold(v[(j, 0)] - step * g, step * l1)
            });
            let b_next = if self.fit_intercept {
                vb - step * grad_b
            } else {
                0.0
            };

            let t_next = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
            let momentum = (t - 1.0) / t_next;

            let mut delta = (b_next - b).abs();
            for j in 0..p {
                delta = delta.max((w_next[(j, 0)] - w[(j, 0)]).abs());
            }

            v = Mat::from_fn(p, 1, |j, _| {
                w_next[(j, 0)] + momentum * (w_next[(j, 0)] - w[(j, 0)])
            });
            vb = b_next + momentum * (b_next - b);
            w = w_next;
            b = b_next;
            t = t_next;

            if delta < self.tol {
                break;
            }
        }

        // Back to the original feature scale
        let coefficients: Vec<f64> = (0..p).map(|j| w[(j, 0)] / scales[j]).collect();
        let intercept = b - coefficients
            .iter()
            .zip(means.iter())
            .map(|(c, m)| c * m)
            .sum::<f64>();

        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(PipelineError::DegenerateFit(
                "optimization diverged to non-finite coefficients".to_string(),
            ));
        }

        Ok(LogisticRegressionModel {
            features_col: self.features_col.clone(),
            probability_col: self.probability_col.clone(),
            prediction_col: self.prediction_col.clone(),
            coefficients,
            intercept,
            threshold: 0.5,
        })
    }
}

impl Tunable for LogisticRegression {
    fn with_params(&self, params: &ParamMap) -> Result<Self> {
        let mut estimator = self.clone();
        for (name, value) in params.iter() {
            let mismatch = || {
                PipelineError::InvalidConfig(format!(
                    "Parameter '{}' cannot take value {}",
                    name, value
                ))
            };
            match name {
                REG_PARAM => estimator.reg_param = value.as_f64().ok_or_else(mismatch)?,
                ELASTIC_NET_PARAM => {
                    estimator.elastic_net_param = value.as_f64().ok_or_else(mismatch)?
                }
                MAX_ITER => estimator.max_iter = value.as_usize().ok_or_else(mismatch)?,
                TOL => estimator.tol = value.as_f64().ok_or_else(mismatch)?,
                FIT_INTERCEPT => estimator.fit_intercept = value.as_bool().ok_or_else(mismatch)?,
                _ => {
                    return Err(PipelineError::UnknownParam {
                        estimator: "LogisticRegression",
                        param: name.to_string(),
                    })
                }
            }
        }
        estimator.validate()?;
        Ok(estimator)
    }
}

/// Fitted logistic regression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogisticRegressionModel {
    pub features_col: String,
    pub probability_col: String,
    pub prediction_col: String,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub threshold: f64,
}

impl LogisticRegressionModel {
    /// Probability of the positive class for one feature vector
    pub fn predict_probability(&self, features: &[f64]) -> f64 {
        let z = self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>();
        sigmoid(z)
    }
}

impl Transformer for LogisticRegressionModel {
    /// Append probability and 0/1 prediction columns.
    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let x = feature_matrix(df, &self.features_col)?;
        if x.nrows() > 0 && x.ncols() != self.coefficients.len() {
            return Err(PipelineError::InvalidConfig(format!(
                "Model expects {} features but '{}' has {}",
                self.coefficients.len(),
                self.features_col,
                x.ncols()
            )));
        }

        let probabilities: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let row: Vec<f64> = (0..x.ncols()).map(|j| x[(i, j)]).collect();
                self.predict_probability(&row)
            })
            .collect();
        let predictions: Vec<f64> = probabilities
            .iter()
            .map(|&prob| if prob >= self.threshold { 1.0 } else { 0.0 })
            .collect();

        let mut out = df.clone();
        out.with_column(Column::new(self.probability_col.as_str().into(), probabilities))?;
        out.with_column(Column::new(self.prediction_col.as_str().into(), predictions))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::assembler::VectorAssembler;
    use crate::pipeline::tuning::ParamGridBuilder;

    fn separable() -> DataFrame {
        let df = df! {
            "x" => [1.0f64, 2.0, 3.0, 4.0, 6.0, 7.0, 8.0, 9.0],
            "label" => [0i32, 0, 0, 0, 1, 1, 1, 1],
        }
        .unwrap();
        VectorAssembler::new(["x"], "features").transform(&df).unwrap()
    }

    #[test]
    fn test_fit_learns_positive_slope() {
        let model = LogisticRegression::new().fit(&separable()).unwrap();
        assert!(model.coefficients[0] > 0.0);
        assert!(model.predict_probability(&[9.0]) > 0.5);
        assert!(model.predict_probability(&[1.0]) < 0.5);
    }

    #[test]
    fn test_transform_adds_prediction_columns() {
        let df = separable();
        let model = LogisticRegression::new().fit(&df).unwrap();
        let out = model.transform(&df).unwrap();
        let predictions: Vec<f64> = out
            .column("prediction")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(predictions, vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        assert!(out
            .column("probability")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .all(|p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_strong_lasso_zeroes_coefficients() {
        let model = LogisticRegression::new()
            .with_reg_param(10.0)
            .with_elastic_net_param(1.0)
            .fit(&separable())
            .unwrap();
        assert_eq!(model.coefficients[0], 0.0);
    }

    #[test]
    fn test_ridge_shrinks_coefficients() {
        let free = LogisticRegression::new().fit(&separable()).unwrap();
        let ridge = LogisticRegression::new()
            .with_reg_param(1.0)
            .fit(&separable())
            .unwrap();
        assert!(ridge.coefficients[0].abs() < free.coefficients[0].abs());
    }

    #[test]
    fn test_single_class_is_degenerate() {
        let df = df! {
            "x" => [1.0f64, 2.0, 3.0],
            "label" => [1i32, 1, 1],
        }
        .unwrap();
        let df = VectorAssembler::new(["x"], "features").transform(&df).unwrap();
        let err = LogisticRegression::new().fit(&df).unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_with_params_applies_and_rejects_unknown() {
        let grid = ParamGridBuilder::new()
            .add_grid(REG_PARAM, [0.3])
            .add_grid(ELASTIC_NET_PARAM, [1.0])
            .build()
            .unwrap();
        let tuned = LogisticRegression::new()
            .with_params(&grid.points()[0])
            .unwrap();
        assert_eq!(tuned.reg_param, 0.3);
        assert_eq!(tuned.elastic_net_param, 1.0);

        let bad = ParamGridBuilder::new()
            .add_grid("learning_rate", [0.1])
            .build()
            .unwrap();
        assert!(matches!(
            LogisticRegression::new().with_params(&bad.points()[0]),
            Err(PipelineError::UnknownParam { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_mix() {
        let lr = LogisticRegression::new().with_elastic_net_param(1.5);
        assert!(lr.validate().is_err());
    }
}
