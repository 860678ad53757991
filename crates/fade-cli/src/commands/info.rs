//! Info command - Show version and effective configuration
//!
//! Usage:
//! ```bash
//! fade info
//! DECAY_TYPE=sliding WINDOW_SIZE=10 fade info
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use fade_core::EngineConfig;

use crate::print_error;

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    /// Print the effective configuration as JSON
    #[arg(long)]
    json: bool,
}

const VARIABLES: &[(&str, &str)] = &[
    ("DECAY_TYPE", "exponential | polynomial | sliding"),
    ("DECAY_REGIME", "forward | backward"),
    ("DECAY_RATE", "exponential rate α > 0"),
    ("POLY_DEGREE", "polynomial degree β > 0"),
    ("WINDOW_SIZE", "sliding horizon in seconds"),
    ("TOPK", "ranked set size ≥ 1"),
    ("CHECKPOINT_INTERVAL", "events (5000) or seconds (2.5s)"),
    ("BUCKET_WIDTH", "bucket span in seconds"),
    ("BUCKET_CAP", "maximum live buckets (≥ 2)"),
    ("BUFFER_CAPACITY", "fallback buffer size"),
    ("TOPK_CAPACITY", "tracked keys"),
    ("ORACLE_CAPACITY", "events retained by the oracle"),
];

/// Run the info command
pub fn run(args: InfoArgs) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            print_error(&format!("Environment configuration rejected: {}", e));
            return Err(e.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("{}", "FADE - Time-Decayed Stream Aggregation".bold().cyan());
    println!("{}", "═".repeat(50).cyan());
    println!();

    println!("{}", "Version Information:".bold());
    println!("  {} {}", "CLI Version:".dimmed(), version.green());
    println!();

    println!("{}", "Regimes:".bold());
    println!("  {} Forward decay (landmark-relative, O(1))", "✓".green());
    println!("  {} Backward decay (rescaled per update)", "✓".green());
    println!("  {} Sliding window (bucketed, capped)", "✓".green());
    println!("  {} Top-K tracking and exact oracle scoring", "✓".green());
    println!();

    println!("{}", "Effective Configuration:".bold());
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Variable").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
            Cell::new("Meaning").fg(Color::Cyan),
        ]);

    let window = config.window_config()?;
    let values = [
        config.decay_kind.to_string(),
        config.effective_regime().to_string(),
        config.decay_rate.to_string(),
        config.poly_degree.to_string(),
        config.window_size.to_string(),
        config.top_k.to_string(),
        config.checkpoint.to_string(),
        window.bucket_width.to_string(),
        window.bucket_cap.to_string(),
        config.buffer_capacity.to_string(),
        config.tracker_capacity().to_string(),
        config.oracle_capacity.to_string(),
    ];
    for ((name, meaning), value) in VARIABLES.iter().zip(values) {
        table.add_row(vec![
            Cell::new(name).fg(Color::Green),
            Cell::new(value),
            Cell::new(meaning).fg(Color::Yellow),
        ]);
    }
    println!("{table}");
    println!();

    println!("  {} {}", "Decay function:".dimmed(), config.decay_function()?);
    println!();

    Ok(())
}
