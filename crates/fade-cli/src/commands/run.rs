//! Run command - Score an aggregator against the exact oracle
//!
//! Usage:
//! ```bash
//! fade run --input data/stream.csv
//! fade run --generate 30 --decay-type polynomial --regime backward --degree 2
//! fade run --input data/stream.csv --checkpoint 2.5s -o results.jsonl
//! ```
//!
//! Settings not given as flags come from the environment (`DECAY_TYPE`,
//! `DECAY_RATE`, `WINDOW_SIZE`, ...), then from built-in defaults.

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use fade_core::{Checkpoint, DecayKind, EngineConfig, Regime};
use fade_eval::{
    write_report, CsvEventReader, EvaluationHarness, GeneratorConfig, RecordFormat, RunReport,
    RunStatus, TrafficGenerator,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::{print_error, print_success, print_warning};

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// CSV stream to evaluate (timestamp,item_id,packet_size or timestamp,key,value)
    #[arg(long, short = 'i', value_name = "FILE", conflicts_with = "generate")]
    input: Option<PathBuf>,

    /// Evaluate a synthetic Zipf stream of this many seconds instead
    #[arg(long, value_name = "SECONDS")]
    generate: Option<f64>,

    /// Seed for --generate
    #[arg(long)]
    seed: Option<u64>,

    /// Count occurrences instead of summing the value column
    #[arg(long)]
    count_only: bool,

    /// exponential, polynomial or sliding
    #[arg(long)]
    decay_type: Option<DecayKind>,

    /// forward or backward (ignored for sliding)
    #[arg(long)]
    regime: Option<Regime>,

    /// Exponential decay rate α
    #[arg(long)]
    rate: Option<f64>,

    /// Polynomial degree β
    #[arg(long)]
    degree: Option<f64>,

    /// Sliding window horizon in seconds
    #[arg(long)]
    window: Option<f64>,

    /// Size of the ranked top-K set
    #[arg(long)]
    top_k: Option<usize>,

    /// Event count ("5000") or stream-time interval ("2.5s")
    #[arg(long)]
    checkpoint: Option<Checkpoint>,

    /// Maximum live sliding-window buckets
    #[arg(long)]
    bucket_cap: Option<usize>,

    /// Fallback buffer size for polynomial and windowed decay
    #[arg(long)]
    buffer_capacity: Option<usize>,

    /// Events the oracle may retain before the run is truncated
    #[arg(long)]
    oracle_capacity: Option<usize>,

    /// Drive aggregator and oracle on separate threads per checkpoint
    #[arg(long)]
    parallel: bool,

    /// Write records (or the full report for json) to this file
    #[arg(long, short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// jsonl, csv or json (default: from the output extension, else jsonl)
    #[arg(long)]
    format: Option<RecordFormat>,

    /// Print every checkpoint record
    #[arg(long)]
    records: bool,
}

enum Source {
    File { path: PathBuf, count_only: bool },
    Synthetic(GeneratorConfig),
}

impl RunArgs {
    /// Environment configuration with flag overrides applied
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::from_env().context("Invalid configuration in environment")?;

        if let Some(kind) = self.decay_type {
            config.decay_kind = kind;
        }
        if let Some(regime) = self.regime {
            config.regime = regime;
        }
        if let Some(rate) = self.rate {
            config.decay_rate = rate;
        }
        if let Some(degree) = self.degree {
            config.poly_degree = degree;
        }
        if let Some(window) = self.window {
            config.window_size = window;
        }
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if let Some(checkpoint) = self.checkpoint {
            config.checkpoint = checkpoint;
        }
        if let Some(cap) = self.bucket_cap {
            config.bucket_cap = cap;
        }
        if let Some(capacity) = self.buffer_capacity {
            config.buffer_capacity = capacity;
        }
        if let Some(capacity) = self.oracle_capacity {
            config.oracle_capacity = capacity;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn source(&self) -> Result<Source> {
        match (&self.input, self.generate) {
            (Some(path), _) => Ok(Source::File {
                path: path.clone(),
                count_only: self.count_only,
            }),
            (None, Some(duration)) => Ok(Source::Synthetic(GeneratorConfig {
                duration,
                seed: self.seed,
                ..GeneratorConfig::default()
            })),
            (None, None) => bail!("Nothing to evaluate: pass --input FILE or --generate SECONDS"),
        }
    }
}

/// Run the run command
pub async fn run(args: RunArgs) -> Result<()> {
    let config = args.engine_config()?;
    let source = args.source()?;
    let parallel = args.parallel;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current event");
            flag.store(true, Ordering::Relaxed);
        }
    });

    println!("{}", "FADE Evaluation".bold().cyan());
    println!("{}", "═".repeat(40).cyan());
    println!(
        "  {} {}",
        "Started:".dimmed(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("  {} {}", "Regime:".dimmed(), config.effective_regime());
    println!("  {} {}", "Decay:".dimmed(), config.decay_function()?);
    println!("  {} {}", "Checkpoint:".dimmed(), config.checkpoint);
    println!();

    let started = Instant::now();
    let report = tokio::task::spawn_blocking(move || evaluate(config, source, parallel, &cancel))
        .await
        .context("Evaluation task failed")??;
    let elapsed = started.elapsed();

    if args.records {
        print_records(&report);
    }
    print_summary(&report);
    println!("  {} {:.2?}", "Wall time:".dimmed(), elapsed);
    println!();

    match report.summary.status {
        RunStatus::Completed => print_success("Evaluation complete"),
        RunStatus::Cancelled => print_warning("Evaluation cancelled, partial results shown"),
        RunStatus::Truncated => print_warning(&format!(
            "Oracle capacity ({}) reached, run truncated",
            report.config.oracle_capacity
        )),
    }

    if let Some(path) = &args.output {
        let format = args
            .format
            .or_else(|| RecordFormat::from_path(path))
            .unwrap_or_default();
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        if let Err(e) = write_report(BufWriter::new(file), &report, format) {
            print_error(&format!("Failed to write {}: {}", path.display(), e));
            return Err(e).with_context(|| format!("Failed to write results: {}", path.display()));
        }
        print_success(&format!(
            "Wrote {} records to {} ({})",
            report.records.len(),
            path.display(),
            format
        ));
    }

    Ok(())
}

/// Blocking part of the run: ingest, evaluate, summarize
fn evaluate(
    config: EngineConfig,
    source: Source,
    parallel: bool,
    cancel: &AtomicBool,
) -> Result<RunReport> {
    let mut harness = EvaluationHarness::new(config)?;

    match source {
        Source::File { path, count_only } => {
            let reader = CsvEventReader::from_path(&path)
                .with_context(|| format!("Failed to open stream: {}", path.display()))?
                .count_only(count_only);

            if parallel {
                let mut events = Vec::new();
                for item in reader {
                    match item {
                        Ok(event) => events.push(event),
                        Err(e) if e.is_recoverable() => harness.skip(&e),
                        Err(e) => {
                            return Err(e)
                                .with_context(|| format!("Failed to read {}", path.display()))
                        }
                    }
                }
                harness.run_parallel(events, cancel);
            } else {
                harness
                    .run_stream(reader, cancel)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
            }
        }
        Source::Synthetic(generator) => {
            let events = TrafficGenerator::new(generator).context("Invalid generator settings")?;
            if parallel {
                harness.run_parallel(events.collect(), cancel);
            } else {
                harness.run(events, cancel);
            }
        }
    }

    Ok(harness.finish())
}

fn print_summary(report: &RunReport) {
    let summary = &report.summary;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Metric").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let rows: Vec<(&str, String)> = vec![
        ("Regime", summary.regime.to_string()),
        ("Decay", summary.decay.to_string()),
        ("Events processed", summary.events_processed.to_string()),
        ("Events skipped", summary.skipped_events.to_string()),
        ("Out-of-order events", summary.out_of_order_events.to_string()),
        ("Checkpoints", summary.checkpoints.to_string()),
        ("Mean relative error", format!("{:.3e}", summary.mean_relative_error)),
        ("Max relative error", format!("{:.3e}", summary.max_relative_error)),
        ("Final relative error", format!("{:.3e}", summary.final_relative_error)),
        ("Mean top-K match", format!("{:.3}", summary.mean_topk_match)),
        ("Peak memory units", summary.peak_memory_units.to_string()),
        ("Update latency p50", format!("{:.1} ns", summary.p50_update_latency * 1e9)),
        ("Update latency p95", format!("{:.1} ns", summary.p95_update_latency * 1e9)),
        ("Mean query latency", format!("{:.1} µs", summary.mean_query_latency * 1e6)),
    ];
    for (metric, value) in rows {
        table.add_row(vec![Cell::new(metric), Cell::new(value).fg(Color::Green)]);
    }
    let fallback = if summary.fallback_used { "yes" } else { "no" };
    table.add_row(vec![
        Cell::new("Fallback used"),
        Cell::new(fallback).fg(if summary.fallback_used {
            Color::Yellow
        } else {
            Color::Green
        }),
    ]);

    println!("{table}");
}

fn print_records(report: &RunReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Time").fg(Color::Cyan),
            Cell::new("Exact").fg(Color::Cyan),
            Cell::new("Approx").fg(Color::Cyan),
            Cell::new("Rel. error").fg(Color::Cyan),
            Cell::new("Top-K").fg(Color::Cyan),
            Cell::new("Memory").fg(Color::Cyan),
        ]);

    for record in &report.records {
        table.add_row(vec![
            Cell::new(format!("{:.3}", record.timestamp)),
            Cell::new(format!("{:.4}", record.exact_value)),
            Cell::new(format!("{:.4}", record.approx_value)),
            Cell::new(format!("{:.3e}", record.relative_error)).fg(Color::Yellow),
            Cell::new(format!("{:.2}", record.topk_match)),
            Cell::new(record.memory_units),
        ]);
    }

    println!("{table}");
    println!();
}
