//! flightpipe: flight-delay prediction CLI
//!
//! Joins flights with planes (and optionally airports), derives features,
//! encodes categoricals, and reports the held-out score of the best
//! cross-validated logistic regression.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::ProgressBar;

use flightpipe::cli::Cli;
use flightpipe::pipeline::{
    check_inputs, cross_validator, derive_features, encoding_pipeline, estimated_size_mb,
    evaluator, join_sources, train_test_split, ClassificationMetric, Estimator, Sources,
    Transformer, WorkflowOutcome,
};
use flightpipe::report::{export_run_report, save_scored_table, tuning_table, ReportInputs, RunSummary};
use flightpipe::utils::{
    create_spinner, finish_with_success, print_banner, print_completion, print_config,
    print_count, print_info, print_step_header, print_step_time, print_success, print_warning,
    RunCard,
};

/// Failures listed individually before the rest are summarised
const MAX_LISTED_FAILURES: usize = 5;

fn spinner(quiet: bool, message: &str) -> ProgressBar {
    if quiet {
        ProgressBar::hidden()
    } else {
        create_spinner(message)
    }
}

fn metric_label(metric: ClassificationMetric) -> &'static str {
    match metric {
        ClassificationMetric::AreaUnderRoc => "AUC",
        ClassificationMetric::AreaUnderPr => "AUC-PR",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    let metric_name = metric_label(config.metric);
    let grid_points = config.reg_params.len() * config.elastic_net_params.len();

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&RunCard {
        flights: &cli.flights,
        planes: &cli.planes,
        airports: cli.airports.as_deref(),
        label: &config.label.output,
        grid_points,
        num_folds: config.num_folds,
        train_ratio: config.train_ratio,
        seed: config.seed,
    });

    // Step 1: Load sources
    print_step_header(1, "Load Sources");
    let step_start = Instant::now();
    let pb = spinner(cli.quiet, "Loading flights, planes and airports...");
    let sources = Sources::load(
        &cli.flights,
        &cli.planes,
        cli.airports.as_deref(),
        cli.infer_schema_length,
    )?;
    finish_with_success(&pb, "Sources loaded");

    print_count("flight rows", sources.flights.height(), None);
    print_count("plane rows", sources.planes.height(), None);
    if let Some(airports) = &sources.airports {
        print_count("airport rows", airports.height(), None);
    }
    print_info(&format!(
        "Estimated memory: {:.2} MB",
        estimated_size_mb(&sources.flights)
    ));
    check_inputs(&sources, &config).context("Input tables are missing required columns")?;
    print_step_time(step_start.elapsed());

    // Step 2: Join
    print_step_header(2, "Join Reference Data");
    let step_start = Instant::now();
    let joined = join_sources(&sources, &config)?;
    print_success(&format!(
        "Joined table: {} rows x {} columns",
        joined.height(),
        joined.width()
    ));
    print_step_time(step_start.elapsed());

    // Step 3: Derive features
    print_step_header(3, "Derive Features");
    let step_start = Instant::now();
    let derived = derive_features(&joined, &config)?;
    for coercion in derived.coercions.iter().filter(|c| c.introduced_nulls > 0) {
        print_warning(&format!(
            "{} value(s) in '{}' could not be parsed and became null",
            coercion.introduced_nulls, coercion.column
        ));
    }
    print_count(
        "rows dropped",
        derived.dropped_rows(),
        Some("(null in a required column)"),
    );
    print_success(&format!("{} rows ready for encoding", derived.table.height()));
    print_step_time(step_start.elapsed());

    // Step 4: Encode categoricals on the full table
    print_step_header(4, "Encode Categorical Columns");
    let step_start = Instant::now();
    let encoder = encoding_pipeline(&config)?
        .fit(&derived.table)
        .context("Failed to fit categorical encoders")?;
    for column in &config.categorical {
        if let Some(indexer) = encoder.indexer(column) {
            print_count(
                &format!("categories in '{}'", column),
                indexer.labels().len(),
                None,
            );
        }
    }
    let encoded = encoder.transform(&derived.table)?;
    print_success("Features assembled");
    print_step_time(step_start.elapsed());

    // Step 5: Split
    print_step_header(5, "Train/Test Split");
    let (train, test) = train_test_split(&encoded, config.train_ratio, config.seed)?;
    print_info(&format!(
        "{} training rows, {} test rows",
        train.height(),
        test.height()
    ));

    // Step 6: Cross-validate
    print_step_header(6, "Cross-Validated Grid Search");
    let step_start = Instant::now();
    let cv = cross_validator(&config, !cli.quiet)?
        .fit(&train)
        .context("Cross-validation failed")?;

    for failure in cv.failures.iter().take(MAX_LISTED_FAILURES) {
        print_warning(&format!(
            "fold {} failed for [{}]: {}",
            failure.fold, failure.params, failure.reason
        ));
    }
    if cv.failures.len() > MAX_LISTED_FAILURES {
        print_warning(&format!(
            "... and {} more fold failure(s), each scored 0.0",
            cv.failures.len() - MAX_LISTED_FAILURES
        ));
    }

    for line in tuning_table(&cv, metric_name).to_string().lines() {
        println!("    {}", line);
    }
    print_success(&format!("Best parameters: {}", cv.best_params));
    print_step_time(step_start.elapsed());

    // Step 7: Evaluate
    print_step_header(7, "Evaluate Held-Out Test Set");
    let predictions = cv.transform(&test)?;
    let test_metric = evaluator(&config)
        .evaluate(&predictions)
        .context("Failed to evaluate the test set")?;
    println!(
        "    {}",
        style(format!("Test {}: {:.3}", metric_name, test_metric))
            .green()
            .bold()
    );

    let outcome = WorkflowOutcome {
        joined_rows: joined.height(),
        clean_rows: derived.table.height(),
        train_rows: train.height(),
        test_rows: test.height(),
        coercions: derived.coercions,
        encoder,
        cv,
        predictions,
        test_metric,
    };

    if let Some(path) = &cli.predictions {
        let dropped = save_scored_table(&outcome.predictions, path)?;
        print_success(&format!("Predictions saved to {}", path.display()));
        if !dropped.is_empty() {
            print_info(&format!("Vector columns not written: {}", dropped.join(", ")));
        }
    }

    if let Some(path) = &cli.report {
        let inputs = ReportInputs {
            flights: &cli.flights,
            planes: &cli.planes,
            airports: cli.airports.as_deref(),
        };
        export_run_report(&outcome, &config, &inputs, path)?;
        print_success(&format!("Run report saved to {}", path.display()));
    }

    RunSummary::from_outcome(&outcome, metric_name).display();
    print_completion();

    Ok(())
}
