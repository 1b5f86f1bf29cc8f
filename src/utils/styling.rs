//! Terminal styling for the step-by-step run output

use console::{style, Emoji};
use std::path::Path;
use std::time::Duration;

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static PLANE: Emoji<'_, '_> = Emoji("✈️  ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
pub static LINK: Emoji<'_, '_> = Emoji("🔗 ", "");

const BOX_WIDTH: usize = 60;

/// Print the application banner
pub fn print_banner(version: &str) {
    println!();
    println!(
        "    {}{}",
        PLANE,
        style("flightpipe").cyan().bold()
    );
    println!(
        "    {}",
        style("Flight delay features, encoders and cross-validated logistic regression").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Inputs and search settings shown before the run starts
pub struct RunCard<'a> {
    pub flights: &'a Path,
    pub planes: &'a Path,
    pub airports: Option<&'a Path>,
    pub label: &'a str,
    pub grid_points: usize,
    pub num_folds: usize,
    pub train_ratio: f64,
    pub seed: u64,
}

/// Print configuration card
pub fn print_config(card: &RunCard<'_>) {
    let line = "─".repeat(BOX_WIDTH - 2);
    let inner = BOX_WIDTH - 16;

    println!("    ┌{}┐", line);
    println!("    │ {:<w$}│", style("Configuration").cyan().bold(), w = BOX_WIDTH - 3);
    println!("    ├{}┤", line);
    println!(
        "    │  {} Flights:  {:<w$}│",
        FOLDER,
        truncate_path(card.flights, inner),
        w = inner
    );
    println!(
        "    │  {} Planes:   {:<w$}│",
        FOLDER,
        truncate_path(card.planes, inner),
        w = inner
    );
    if let Some(airports) = card.airports {
        println!(
            "    │  {} Airports: {:<w$}│",
            FOLDER,
            truncate_path(airports, inner),
            w = inner
        );
    }
    println!(
        "    │  {} Label:    {:<w$}│",
        TARGET,
        truncate_string(card.label, inner),
        w = inner
    );
    println!("    ├{}┤", line);
    println!(
        "    │  {} Grid points x folds: {:<w$}│",
        CHART,
        style(format!("{} x {}", card.grid_points, card.num_folds)).yellow(),
        w = BOX_WIDTH - 27
    );
    println!(
        "    │  {} Train ratio / seed:  {:<w$}│",
        LINK,
        style(format!("{:.2} / {}", card.train_ratio, card.seed)).yellow(),
        w = BOX_WIDTH - 27
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

/// Print a warning to stderr
pub fn print_warning(message: &str) {
    eprintln!("    {} {}", WARN, style(message).yellow());
}

/// Print how long a step took
pub fn print_step_time(elapsed: Duration) {
    println!(
        "      {}",
        style(format!("completed in {:.2}s", elapsed.as_secs_f64())).dim()
    );
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style("flightpipe run complete!").green().bold()
    );
    println!();
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, detail: Option<&str>) {
    match detail {
        Some(info) => println!(
            "      {} {} {}",
            style(count).yellow().bold(),
            description,
            style(info).dim()
        ),
        None => println!("      {} {}", style(count).yellow().bold(), description),
    }
}

fn truncate_path(path: &Path, max_len: usize) -> String {
    truncate_string(&path.display().to_string(), max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}
