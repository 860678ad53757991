//! Generate command - Write a synthetic traffic stream
//!
//! Usage:
//! ```bash
//! fade generate --output data/stream.csv
//! fade generate -o stream.csv --items 1000 --rate 10000 --duration 30 --alpha 1.2 --seed 7
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use fade_eval::{write_events, GeneratorConfig, TrafficGenerator};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use crate::print_success;

/// Arguments for the generate command
#[derive(Args)]
pub struct GenerateArgs {
    /// Destination CSV file
    #[arg(long, short = 'o', value_name = "FILE")]
    output: PathBuf,

    /// Number of distinct item ids
    #[arg(long, default_value_t = 1000)]
    items: usize,

    /// Packets per second of stream time
    #[arg(long, default_value_t = 1000.0)]
    rate: f64,

    /// Stream length in seconds
    #[arg(long, default_value_t = 10.0)]
    duration: f64,

    /// Zipf skew of the item distribution
    #[arg(long, default_value_t = 1.2)]
    alpha: f64,

    /// First timestamp in seconds
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// Seed for a reproducible stream
    #[arg(long)]
    seed: Option<u64>,
}

/// Run the generate command
pub fn run(args: GenerateArgs) -> Result<()> {
    let config = GeneratorConfig {
        num_items: args.items,
        rate: args.rate,
        duration: args.duration,
        zipf_alpha: args.alpha,
        start_time: args.start,
        seed: args.seed,
        ..GeneratorConfig::default()
    };
    let generator = TrafficGenerator::new(config).context("Invalid generator settings")?;

    println!("{}", "FADE Traffic Generator".bold().cyan());
    println!("{}", "═".repeat(40).cyan());
    println!("  {} {}", "Packets:".dimmed(), generator.total());
    println!("  {} {}", "Output:".dimmed(), args.output.display());
    println!();

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create stream file: {}", args.output.display()))?;

    let rows = write_events(BufWriter::new(file), generator)
        .with_context(|| format!("Failed to write stream: {}", args.output.display()))?;

    print_success(&format!("Wrote {} events", rows));
    Ok(())
}
