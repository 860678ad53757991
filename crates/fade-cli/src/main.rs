//! FADE CLI - run and score time-decayed stream aggregators
//!
//! # Usage
//!
//! ```bash
//! # Generate a synthetic Zipf traffic stream
//! fade generate --output data/stream.csv --rate 10000 --duration 30
//!
//! # Score forward exponential decay against the exact oracle
//! fade run --input data/stream.csv --decay-type exponential --rate 0.01
//!
//! # Sliding window, records written as CSV
//! fade run --input data/stream.csv --decay-type sliding --window 10 -o results.csv
//!
//! # Show configuration
//! fade info
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::{generate, info, run};

/// FADE - Forward And Decayed Evaluation
///
/// Time-decayed aggregation over event streams, scored against an exact
/// brute-force oracle.
#[derive(Parser)]
#[command(
    name = "fade",
    version,
    about = "FADE CLI - Time-Decayed Stream Aggregation",
    long_about = "FADE maintains decayed sums and top-K sets over event streams\n\
                  in bounded memory (forward decay, backward decay, sliding windows)\n\
                  and scores them against an exact oracle."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an evaluation over a stream
    #[command(name = "run")]
    Run(run::RunArgs),

    /// Write a synthetic traffic stream as CSV
    #[command(name = "generate")]
    Generate(generate::GenerateArgs),

    /// Show version and effective configuration
    #[command(name = "info")]
    Info(info::InfoArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Run(args) => run::run(args).await,
        Commands::Generate(args) => generate::run(args),
        Commands::Info(args) => info::run(args),
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

/// Print a success message with a checkmark
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print an error message with an X
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}
