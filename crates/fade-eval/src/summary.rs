//! Whole-run aggregates

use fade_core::{DecayFunction, EngineConfig, Regime};
use serde::{Deserialize, Serialize};

use crate::record::EvaluationRecord;
use crate::scoring::{mean, percentile};

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The input was exhausted
    #[default]
    Completed,
    /// The cancellation flag was raised
    Cancelled,
    /// The oracle ran out of capacity
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub regime: Regime,
    pub decay: DecayFunction,
    pub status: RunStatus,
    pub events_processed: u64,
    pub skipped_events: u64,
    pub out_of_order_events: u64,
    pub checkpoints: usize,
    pub mean_relative_error: f64,
    pub max_relative_error: f64,
    pub final_relative_error: f64,
    pub mean_topk_match: f64,
    pub peak_memory_units: usize,
    pub p50_update_latency: f64,
    pub p95_update_latency: f64,
    pub mean_query_latency: f64,
    pub fallback_used: bool,
}

impl RunSummary {
    pub fn from_records(
        regime: Regime,
        decay: DecayFunction,
        status: RunStatus,
        records: &[EvaluationRecord],
    ) -> Self {
        let mut latencies: Vec<f64> = records.iter().map(|r| r.update_latency).collect();
        latencies.sort_by(|a, b| a.total_cmp(b));

        let last = records.last();
        Self {
            regime,
            decay,
            status,
            events_processed: last.map_or(0, |r| r.events_processed),
            skipped_events: last.map_or(0, |r| r.skipped_events),
            out_of_order_events: last.map_or(0, |r| r.out_of_order_events),
            checkpoints: records.len(),
            mean_relative_error: mean(records.iter().map(|r| r.relative_error)),
            max_relative_error: records
                .iter()
                .map(|r| r.relative_error)
                .fold(0.0, f64::max),
            final_relative_error: last.map_or(0.0, |r| r.relative_error),
            mean_topk_match: mean(records.iter().map(|r| r.topk_match)),
            peak_memory_units: records.iter().map(|r| r.memory_units).max().unwrap_or(0),
            p50_update_latency: percentile(&latencies, 50),
            p95_update_latency: percentile(&latencies, 95),
            mean_query_latency: mean(records.iter().map(|r| r.query_latency)),
            fallback_used: records.iter().any(|r| r.fallback_used),
        }
    }

    pub fn truncated(&self) -> bool {
        self.status == RunStatus::Truncated
    }
}

/// Everything a run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub config: EngineConfig,
    pub summary: RunSummary,
    pub records: Vec<EvaluationRecord>,
}
