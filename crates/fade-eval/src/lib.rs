//! # FADE Eval
//!
//! Scores bounded-memory decayed aggregators against the exact oracle.
//!
//! A run owns one aggregator, one top-K tracker and one oracle. Events are
//! fed in stream order; at each checkpoint the harness records the relative
//! error of the decayed sum, the Jaccard overlap of the top-K sets, the
//! memory footprint in structural units, and update/query latencies.
//!
//! ```rust
//! use std::sync::atomic::AtomicBool;
//! use fade_core::{Checkpoint, EngineConfig};
//! use fade_eval::{EvaluationHarness, GeneratorConfig, RunStatus, TrafficGenerator};
//!
//! let config = EngineConfig {
//!     checkpoint: Checkpoint::Events(500),
//!     ..EngineConfig::default()
//! };
//! let mut harness = EvaluationHarness::new(config).unwrap();
//! let events = TrafficGenerator::new(GeneratorConfig {
//!     duration: 2.0,
//!     seed: Some(1),
//!     ..GeneratorConfig::default()
//! })
//! .unwrap();
//!
//! let status = harness.run(events, &AtomicBool::new(false));
//! assert_eq!(status, RunStatus::Completed);
//!
//! let report = harness.finish();
//! assert_eq!(report.records.len(), 4);
//! assert!(report.summary.max_relative_error < 1e-6);
//! ```

pub mod error;
pub mod export;
pub mod harness;
pub mod record;
pub mod scoring;
pub mod stream;
pub mod summary;

pub use error::{EvalError, Result};
pub use export::{write_csv, write_jsonl, write_report, RecordFormat};
pub use harness::EvaluationHarness;
pub use record::EvaluationRecord;
pub use scoring::{jaccard, relative_error, DEFAULT_EPSILON};
pub use stream::{write_events, CsvEventReader, GeneratorConfig, TrafficGenerator};
pub use summary::{RunReport, RunStatus, RunSummary};
