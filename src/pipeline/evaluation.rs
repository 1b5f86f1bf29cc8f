//! Binary classification metrics over scored tables

use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::assembler::label_values;
use super::columns::f64_values;
use super::error::{PipelineError, Result};

/// Scores closer than this are treated as tied
const TIE_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMetric {
    #[default]
    AreaUnderRoc,
    AreaUnderPr,
}

impl fmt::Display for ClassificationMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationMetric::AreaUnderRoc => write!(f, "areaUnderROC"),
            ClassificationMetric::AreaUnderPr => write!(f, "areaUnderPR"),
        }
    }
}

impl FromStr for ClassificationMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "areaunderroc" | "auc" | "roc" => Ok(ClassificationMetric::AreaUnderRoc),
            "areaunderpr" | "pr" => Ok(ClassificationMetric::AreaUnderPr),
            _ => Err(format!(
                "Unknown metric '{}'. Valid options: area_under_roc, area_under_pr",
                s
            )),
        }
    }
}

/// Scores a table holding a 0/1 label column and a real-valued score column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryClassificationEvaluator {
    pub label_col: String,
    pub score_col: String,
    pub metric: ClassificationMetric,
}

impl Default for BinaryClassificationEvaluator {
    fn default() -> Self {
        Self {
            label_col: "label".to_string(),
            score_col: "probability".to_string(),
            metric: ClassificationMetric::AreaUnderRoc,
        }
    }
}

impl BinaryClassificationEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_label_col(mut self, col: impl Into<String>) -> Self {
        self.label_col = col.into();
        self
    }

    #[must_use]
    pub fn with_score_col(mut self, col: impl Into<String>) -> Self {
        self.score_col = col.into();
        self
    }

    #[must_use]
    pub fn with_metric(mut self, metric: ClassificationMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Both supported metrics reward larger values.
    pub fn is_larger_better(&self) -> bool {
        true
    }

    /// Metric value in [0, 1].
    ///
    /// Fails with `DegenerateEvaluation` when the table is empty or holds a
    /// single label class, since neither curve is defined then.
    pub fn evaluate(&self, df: &DataFrame) -> Result<f64> {
        let labels = label_values(df, &self.label_col)?;
        let scores = f64_values(df, &self.score_col, "evaluator")?;

        let pairs: Vec<(f64, bool)> = scores
            .into_iter()
            .zip(labels.iter().map(|&y| y == 1.0))
            .collect();

        let positives = pairs.iter().filter(|(_, y)| *y).count();
        if positives == 0 || positives == pairs.len() {
            return Err(PipelineError::DegenerateEvaluation(format!(
                "{} undefined with {} positive of {} rows",
                self.metric,
                positives,
                pairs.len()
            )));
        }

        Ok(match self.metric {
            ClassificationMetric::AreaUnderRoc => area_under_roc(&pairs),
            ClassificationMetric::AreaUnderPr => area_under_pr(&pairs),
        })
    }
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Tied scores share their average rank, so every tie counts as half a
/// correctly ordered pair. Returns 0.5 when either class is absent.
pub fn area_under_roc(pairs: &[(f64, bool)]) -> f64 {
    let mut sorted = pairs.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total_pos = sorted.iter().filter(|(_, y)| *y).count() as f64;
    let total_neg = sorted.len() as f64 - total_pos;
    if total_pos == 0.0 || total_neg == 0.0 {
        return 0.5;
    }

    let n = sorted.len();
    let mut rank_sum_pos = 0.0;
    let mut seen = 0.0;
    let mut i = 0;

    while i < n {
        let current = sorted[i].0;
        let mut j = i;
        while j < n && (sorted[j].0 - current).abs() < TIE_EPSILON {
            j += 1;
        }

        let group = (j - i) as f64;
        let avg_rank = seen + (group + 1.0) / 2.0;
        let group_pos = sorted[i..j].iter().filter(|(_, y)| *y).count() as f64;
        rank_sum_pos += avg_rank * group_pos;

        seen += group;
        i = j;
    }

    let u = rank_sum_pos - total_pos * (total_pos + 1.0) / 2.0;
    (u / (total_pos * total_neg)).clamp(0.0, 1.0)
}

/// Area under the precision-recall curve by the trapezoidal rule.
///
/// Thresholds step through distinct scores from high to low; the curve is
/// anchored at recall 0 with the precision of the first threshold.
pub fn area_under_pr(pairs: &[(f64, bool)]) -> f64 {
    let mut sorted = pairs.to_vec();
    sorted.sort_by(|a, b| b.0.total_cmp(&a.0));

    let total_pos = sorted.iter().filter(|(_, y)| *y).count() as f64;
    if total_pos == 0.0 {
        return 0.0;
    }

    let mut points: Vec<(f64, f64)> = Vec::new();
    let (mut tp, mut fp) = (0.0, 0.0);
    let n = sorted.len();
    let mut i = 0;

    while i < n {
        let current = sorted[i].0;
        while i < n && (sorted[i].0 - current).abs() < TIE_EPSILON {
            if sorted[i].1 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            i += 1;
        }
        points.push((tp / total_pos, tp / (tp + fp)));
    }

    let Some(&(_, first_precision)) = points.first() else {
        return 0.0;
    };

    let mut area = 0.0;
    let (mut prev_recall, mut prev_precision) = (0.0, first_precision);
    for (recall, precision) in points {
        area += (recall - prev_recall) * (precision + prev_precision) / 2.0;
        prev_recall = recall;
        prev_precision = precision;
    }
    area.clamp(0.0, 1.0)
}
