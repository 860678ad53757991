//! Per-checkpoint evaluation records

use serde::{Deserialize, Serialize};

/// Aggregator-vs-oracle comparison at one checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Stream time the checkpoint was taken at
    pub timestamp: f64,
    pub exact_value: f64,
    pub approx_value: f64,
    pub relative_error: f64,
    /// Jaccard overlap of the approximate and exact top-K key sets
    pub topk_match: f64,
    /// Aggregator structural elements plus tracker entries
    pub memory_units: usize,
    /// Mean seconds per update since the previous checkpoint
    pub update_latency: f64,
    /// Seconds spent answering the checkpoint query
    pub query_latency: f64,
    pub events_processed: u64,
    pub fallback_used: bool,
    pub out_of_order_events: u64,
    pub skipped_events: u64,
}

impl EvaluationRecord {
    pub const CSV_HEADER: &'static str = "timestamp,exact_value,approx_value,relative_error,\
topk_match,memory_units,update_latency,query_latency,events_processed,fallback_used,\
out_of_order_events,skipped_events";

    /// Whether the approximate top-K set equals the exact one
    pub fn topk_exact(&self) -> bool {
        self.topk_match >= 1.0
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            self.timestamp,
            self.exact_value,
            self.approx_value,
            self.relative_error,
            self.topk_match,
            self.memory_units,
            self.update_latency,
            self.query_latency,
            self.events_processed,
            self.fallback_used,
            self.out_of_order_events,
            self.skipped_events
        )
    }
}
