//! Ordered stage pipelines
//!
//! A `Pipeline` is immutable configuration produced by `PipelineBuilder`.
//! Fitting walks the stages in order: stage `i` is fit on the upstream table
//! after fitted stages `0..i` have been applied to it. The resulting
//! `PipelineModel` applies every fitted stage in the same order to any table.

use std::collections::HashSet;

use polars::prelude::DataFrame;
use serde::Serialize;

use super::assembler::VectorAssembler;
use super::encoder::{HandleInvalid, IndexerModel, OneHotEncoder, OneHotModel, StringIndexer};
use super::error::{PipelineError, Result};
use super::traits::{Estimator, Transformer};

/// One configured pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Indexer(StringIndexer),
    OneHot(OneHotEncoder),
    Assembler(VectorAssembler),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Indexer(_) => "StringIndexer",
            Stage::OneHot(_) => "OneHotEncoder",
            Stage::Assembler(_) => "VectorAssembler",
        }
    }

    pub fn input_cols(&self) -> Vec<&str> {
        match self {
            Stage::Indexer(s) => vec![s.input_col.as_str()],
            Stage::OneHot(s) => vec![s.input_col.as_str()],
            Stage::Assembler(s) => s.input_cols.iter().map(String::as_str).collect(),
        }
    }

    pub fn output_col(&self) -> &str {
        match self {
            Stage::Indexer(s) => &s.output_col,
            Stage::OneHot(s) => &s.output_col,
            Stage::Assembler(s) => &s.output_col,
        }
    }

    fn fit(&self, df: &DataFrame) -> Result<FittedStage> {
        Ok(match self {
            Stage::Indexer(s) => FittedStage::Indexer(s.fit(df)?),
            Stage::OneHot(s) => FittedStage::OneHot(s.fit(df)?),
            Stage::Assembler(s) => FittedStage::Assembler(s.clone()),
        })
    }
}

impl From<StringIndexer> for Stage {
    fn from(stage: StringIndexer) -> Self {
        Stage::Indexer(stage)
    }
}

impl From<OneHotEncoder> for Stage {
    fn from(stage: OneHotEncoder) -> Self {
        Stage::OneHot(stage)
    }
}

impl From<VectorAssembler> for Stage {
    fn from(stage: VectorAssembler) -> Self {
        Stage::Assembler(stage)
    }
}

/// One fitted pipeline stage
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum FittedStage {
    Indexer(IndexerModel),
    OneHot(OneHotModel),
    Assembler(VectorAssembler),
}

impl Transformer for FittedStage {
    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        match self {
            FittedStage::Indexer(m) => m.transform(df),
            FittedStage::OneHot(m) => m.transform(df),
            FittedStage::Assembler(a) => a.transform(df),
        }
    }
}

/// Immutable builder: every call consumes the builder and returns a new one.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stage(mut self, stage: impl Into<Stage>) -> Self {
        self.stages.push(stage.into());
        self
    }

    /// Index then one-hot encode `column` into `{column}_index` and `{column}_fact`.
    #[must_use]
    pub fn categorical(self, column: &str, handle_invalid: HandleInvalid) -> Self {
        let index_col = format!("{}_index", column);
        let fact_col = format!("{}_fact", column);
        self.stage(StringIndexer::new(column, index_col.clone()).with_handle_invalid(handle_invalid))
            .stage(OneHotEncoder::new(index_col, fact_col).with_handle_invalid(match handle_invalid {
                HandleInvalid::Skip => HandleInvalid::Error,
                other => other,
            }))
    }

    /// Validate and freeze the stage list.
    ///
    /// Output columns must be unique, and no stage may read a column that a
    /// later stage produces.
    pub fn build(self) -> Result<Pipeline> {
        if self.stages.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "Pipeline needs at least one stage".to_string(),
            ));
        }

        let mut outputs: HashSet<&str> = HashSet::new();
        for stage in &self.stages {
            if !outputs.insert(stage.output_col()) {
                return Err(PipelineError::InvalidConfig(format!(
                    "Output column '{}' is produced by more than one stage",
                    stage.output_col()
                )));
            }
        }

        for (i, stage) in self.stages.iter().enumerate() {
            for input in stage.input_cols() {
                if let Some(later) = self.stages[i..].iter().find(|s| s.output_col() == input) {
                    return Err(PipelineError::InvalidConfig(format!(
                        "{} reads '{}' which is only produced later by {}",
                        stage.name(),
                        input,
                        later.name()
                    )));
                }
            }
        }

        Ok(Pipeline {
            stages: self.stages,
        })
    }
}

/// Frozen, ordered stage configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

impl Estimator for Pipeline {
    type Model = PipelineModel;

    fn fit(&self, df: &DataFrame) -> Result<PipelineModel> {
        let mut fitted = Vec::with_capacity(self.stages.len());
        let mut current = df.clone();

        for (i, stage) in self.stages.iter().enumerate() {
            let model = stage.fit(&current)?;
            if i + 1 < self.stages.len() {
                current = model.transform(&current)?;
            }
            fitted.push(model);
        }

        Ok(PipelineModel { stages: fitted })
    }
}

/// Fitted pipeline; carries every encoding map explicitly
#[derive(Debug, Clone, Serialize)]
pub struct PipelineModel {
    stages: Vec<FittedStage>,
}

impl PipelineModel {
    pub fn stages(&self) -> &[FittedStage] {
        &self.stages
    }

    /// The fitted indexer reading `input_col`, if any
    pub fn indexer(&self, input_col: &str) -> Option<&IndexerModel> {
        self.stages.iter().find_map(|s| match s {
            FittedStage::Indexer(m) if m.input_col == input_col => Some(m),
            _ => None,
        })
    }
}

impl Transformer for PipelineModel {
    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.stages
            .iter()
            .try_fold(df.clone(), |current, stage| stage.transform(&current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::columns::column_to_vectors;
    use polars::prelude::*;

    fn flights() -> DataFrame {
        df! {
            "carrier" => ["UA", "AA", "UA", "DL"],
            "dest" => ["SEA", "SEA", "PDX", "LAX"],
            "month" => [1i64, 2, 3, 4],
        }
        .unwrap()
    }

    fn pipeline() -> Pipeline {
        PipelineBuilder::new()
            .categorical("carrier", HandleInvalid::Error)
            .categorical("dest", HandleInvalid::Error)
            .stage(VectorAssembler::new(
                ["month", "carrier_fact", "dest_fact"],
                "features",
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_is_value_based() {
        let base = PipelineBuilder::new().categorical("carrier", HandleInvalid::Error);
        let extended = base.clone().categorical("dest", HandleInvalid::Error);
        assert_eq!(base.build().unwrap().stages().len(), 2);
        assert_eq!(extended.build().unwrap().stages().len(), 4);
    }

    #[test]
    fn test_fit_and_transform_in_order() {
        let df = flights();
        let model = pipeline().fit(&df).unwrap();
        assert_eq!(model.stages().len(), 5);

        let out = model.transform(&df).unwrap();
        let features = column_to_vectors(&out, "features", "test").unwrap();
        // month + carrier (3 categories, drop last -> 2) + dest (3 categories -> 2)
        assert_eq!(features[0].len(), 5);
        assert_eq!(features[0], vec![1.0, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_model_applies_same_codes_to_other_tables() {
        let df = flights();
        let model = pipeline().fit(&df).unwrap();
        let subset = df.slice(2, 2);
        let out = model.transform(&subset).unwrap();
        let codes: Vec<Option<u32>> = out
            .column("carrier_index")
            .unwrap()
            .u32()
            .unwrap()
            .into_iter()
            .collect();
        let indexer = model.indexer("carrier").unwrap();
        assert_eq!(codes, vec![indexer.code_of("UA"), indexer.code_of("DL")]);
    }

    #[test]
    fn test_build_rejects_forward_reference() {
        let result = PipelineBuilder::new()
            .stage(OneHotEncoder::new("carrier_index", "carrier_fact"))
            .stage(StringIndexer::new("carrier", "carrier_index"))
            .build();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_rejects_duplicate_outputs() {
        let result = PipelineBuilder::new()
            .stage(StringIndexer::new("carrier", "code"))
            .stage(StringIndexer::new("dest", "code"))
            .build();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_rejects_empty() {
        assert!(PipelineBuilder::new().build().is_err());
    }
}
