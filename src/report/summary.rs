//! Grid-search and run summary tables

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::{CrossValidatorModel, WorkflowOutcome};

/// Per-grid-point cross-validation table, best row highlighted
pub fn tuning_table<M>(cv: &CrossValidatorModel<M>, metric_name: &str) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Parameters").add_attribute(Attribute::Bold),
        Cell::new(format!("Mean {}", metric_name)).add_attribute(Attribute::Bold),
        Cell::new("Std").add_attribute(Attribute::Bold),
        Cell::new("Failed folds").add_attribute(Attribute::Bold),
    ]);

    for (i, score) in cv.scores.iter().enumerate() {
        let is_best = i == cv.best_index;
        let mean_cell = Cell::new(format!("{:.4}", score.mean));
        let mean_cell = if is_best {
            mean_cell.fg(Color::Green).add_attribute(Attribute::Bold)
        } else {
            mean_cell
        };

        table.add_row(vec![
            Cell::new(if is_best {
                format!("{} ★", i)
            } else {
                i.to_string()
            }),
            Cell::new(score.params.to_string()),
            mean_cell,
            Cell::new(format!("{:.4}", score.std)),
            Cell::new(score.failures).fg(if score.failures == 0 {
                Color::White
            } else {
                Color::Red
            }),
        ]);
    }

    table
}

/// Summary of a finished run
#[derive(Debug)]
pub struct RunSummary {
    pub joined_rows: usize,
    pub clean_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub grid_points: usize,
    pub fold_fits: usize,
    pub failed_fits: usize,
    pub best_params: String,
    pub metric_name: String,
    pub test_metric: f64,
}

impl RunSummary {
    pub fn from_outcome(outcome: &WorkflowOutcome, metric_name: &str) -> Self {
        Self {
            joined_rows: outcome.joined_rows,
            clean_rows: outcome.clean_rows,
            train_rows: outcome.train_rows,
            test_rows: outcome.test_rows,
            grid_points: outcome.cv.scores.len(),
            fold_fits: outcome.cv.fold_fits,
            failed_fits: outcome.cv.failures.len(),
            best_params: outcome.cv.best_params.to_string(),
            metric_name: metric_name.to_string(),
            test_metric: outcome.test_metric,
        }
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("RUN SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![Cell::new("Joined rows"), Cell::new(self.joined_rows)]);
        table.add_row(vec![
            Cell::new("Rows after null filter"),
            Cell::new(self.clean_rows).fg(if self.clean_rows < self.joined_rows {
                Color::Yellow
            } else {
                Color::White
            }),
        ]);
        table.add_row(vec![
            Cell::new("Train / test rows"),
            Cell::new(format!("{} / {}", self.train_rows, self.test_rows)),
        ]);
        table.add_row(vec![
            Cell::new("Grid points"),
            Cell::new(self.grid_points),
        ]);
        table.add_row(vec![
            Cell::new("Fold fits (failed)"),
            Cell::new(format!("{} ({})", self.fold_fits, self.failed_fits)).fg(
                if self.failed_fits == 0 {
                    Color::White
                } else {
                    Color::Red
                },
            ),
        ]);
        table.add_row(vec![
            Cell::new("Best parameters"),
            Cell::new(&self.best_params).fg(Color::Cyan),
        ]);
        table.add_row(vec![
            Cell::new(format!("Test {}", self.metric_name)),
            Cell::new(format!("{:.3}", self.test_metric))
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);

        for line in table.to_string().lines() {
            println!("    {}", line);
        }
    }
}
