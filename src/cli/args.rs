//! Command-line argument definitions using clap

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::{ClassificationMetric, HandleInvalid, WorkflowConfig};

/// flightpipe - Predict late flight arrivals with a cross-validated logistic regression
#[derive(Parser, Debug)]
#[command(name = "flightpipe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Flights file (CSV or Parquet)
    #[arg(short, long)]
    pub flights: PathBuf,

    /// Planes reference file, joined on tailnum
    #[arg(short, long)]
    pub planes: PathBuf,

    /// Airports lookup file, joined on dest (optional)
    #[arg(short, long)]
    pub airports: Option<PathBuf>,

    /// JSON workflow config. Flags below override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of cross-validation folds
    #[arg(long, value_parser = validate_folds)]
    pub folds: Option<usize>,

    /// Seed for the train/test split and fold assignment
    #[arg(long)]
    pub seed: Option<u64>,

    /// Fraction of rows used for training (exclusive 0.0 to 1.0)
    #[arg(long, value_parser = validate_train_ratio)]
    pub train_ratio: Option<f64>,

    /// Regularization strengths to search (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub reg_params: Vec<f64>,

    /// Elastic-net mixing values to search, 0.0 = ridge, 1.0 = lasso (comma-separated)
    #[arg(long, value_delimiter = ',', value_parser = validate_unit_interval)]
    pub elastic_net: Vec<f64>,

    /// Maximum optimizer iterations per fit
    #[arg(long)]
    pub max_iter: Option<usize>,

    /// Policy for categories unseen by the indexer: error, keep or skip
    #[arg(long)]
    pub handle_invalid: Option<HandleInvalid>,

    /// Ranking metric: area_under_roc or area_under_pr
    #[arg(long)]
    pub metric: Option<ClassificationMetric>,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan.
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write the scored test rows to this CSV path
    #[arg(long)]
    pub predictions: Option<PathBuf>,

    /// Hide progress bars
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Cli {
    /// Config file (or defaults) with command-line overrides applied, validated.
    pub fn resolve_config(&self) -> Result<WorkflowConfig> {
        let mut config = match &self.config {
            Some(path) => WorkflowConfig::from_json_file(path)?,
            None => WorkflowConfig::default(),
        };

        if let Some(folds) = self.folds {
            config.num_folds = folds;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(ratio) = self.train_ratio {
            config.train_ratio = ratio;
        }
        if !self.reg_params.is_empty() {
            config.reg_params = self.reg_params.clone();
        }
        if !self.elastic_net.is_empty() {
            config.elastic_net_params = self.elastic_net.clone();
        }
        if let Some(max_iter) = self.max_iter {
            config.max_iter = max_iter;
        }
        if let Some(policy) = self.handle_invalid {
            config.handle_invalid = policy;
        }
        if let Some(metric) = self.metric {
            config.metric = metric;
        }

        config.validate().context("Invalid workflow configuration")?;
        Ok(config)
    }
}

fn parse_f64(s: &str) -> Result<f64, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))
}

/// Validator for train_ratio
fn validate_train_ratio(s: &str) -> Result<f64, String> {
    let value = parse_f64(s)?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!(
            "train_ratio must be strictly between 0.0 and 1.0, got {}",
            value
        ))
    }
}

/// Validator for elastic-net mixing values
fn validate_unit_interval(s: &str) -> Result<f64, String> {
    let value = parse_f64(s)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("value must be between 0.0 and 1.0, got {}", value))
    }
}

fn validate_folds(s: &str) -> Result<usize, String> {
    let value: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a valid fold count", s))?;
    if value < 2 {
        Err(format!("folds must be at least 2, got {}", value))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Cli {
        let mut args = vec!["flightpipe", "-f", "flights.csv", "-p", "planes.csv"];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults_resolve() {
        let config = parse(&[]).resolve_config().unwrap();
        assert_eq!(config, WorkflowConfig::default());
    }

    #[test]
    fn test_overrides_apply() {
        let cli = parse(&[
            "--folds",
            "5",
            "--reg-params",
            "0.01,0.5",
            "--elastic-net",
            "0.5",
            "--handle-invalid",
            "keep",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.num_folds, 5);
        assert_eq!(config.reg_params, vec![0.01, 0.5]);
        assert_eq!(config.elastic_net_params, vec![0.5]);
        assert_eq!(config.handle_invalid, HandleInvalid::Keep);
    }

    #[test]
    fn test_validators_reject_out_of_range() {
        let base = ["flightpipe", "-f", "a.csv", "-p", "b.csv"];
        for extra in [
            ["--train-ratio", "1.0"],
            ["--elastic-net", "1.5"],
            ["--folds", "1"],
        ] {
            let args: Vec<&str> = base.iter().chain(extra.iter()).copied().collect();
            assert!(Cli::try_parse_from(args).is_err());
        }
    }
}
