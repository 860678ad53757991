//! Lockstep evaluation of an aggregator against the exact oracle
//!
//! Every accepted event goes to the aggregator, the top-K tracker and the
//! oracle in stream order. At each checkpoint the harness queries both
//! sides at the current stream time and appends an [`EvaluationRecord`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use fade_core::{
    Aggregator, Checkpoint, DecayError, EngineConfig, Event, GroundTruthOracle, TopKTracker,
};
use tracing::{debug, info, warn};

use crate::error::{EvalError, Result};
use crate::record::EvaluationRecord;
use crate::scoring::{jaccard, relative_error, DEFAULT_EPSILON};
use crate::summary::{RunReport, RunStatus, RunSummary};

/// Drives one run: one aggregator, one tracker, one oracle
#[derive(Debug)]
pub struct EvaluationHarness {
    config: EngineConfig,
    epsilon: f64,
    aggregator: Aggregator,
    tracker: TopKTracker,
    oracle: GroundTruthOracle,
    records: Vec<EvaluationRecord>,
    status: RunStatus,

    events_processed: u64,
    skipped_events: u64,
    stream_time: Option<f64>,
    checkpoint_anchor: Option<f64>,
    pending: u64,
    pending_update_time: Duration,
}

impl EvaluationHarness {
    /// Build fresh aggregator, tracker and oracle instances for `config`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let aggregator = Aggregator::from_config(&config)?;
        let decay = config.decay_function()?;
        let tracker = TopKTracker::new(
            config.top_k,
            config.tracker_capacity(),
            decay,
            config.effective_regime().tracker_mode(),
        )?;
        let oracle = GroundTruthOracle::with_capacity(decay, config.oracle_capacity);
        Ok(Self::with_parts(config, aggregator, tracker, oracle))
    }

    /// Assemble a harness from prebuilt parts
    pub fn with_parts(
        config: EngineConfig,
        aggregator: Aggregator,
        tracker: TopKTracker,
        oracle: GroundTruthOracle,
    ) -> Self {
        Self {
            config,
            epsilon: DEFAULT_EPSILON,
            aggregator,
            tracker,
            oracle,
            records: Vec::new(),
            status: RunStatus::Completed,
            events_processed: 0,
            skipped_events: 0,
            stream_time: None,
            checkpoint_anchor: None,
            pending: 0,
            pending_update_time: Duration::ZERO,
        }
    }

    /// Override the relative-error denominator floor
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn tracker(&self) -> &TopKTracker {
        &self.tracker
    }

    pub fn oracle(&self) -> &GroundTruthOracle {
        &self.oracle
    }

    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn skipped_events(&self) -> u64 {
        self.skipped_events
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Feed one event.
    ///
    /// Malformed events are dropped and counted. A checkpoint record is
    /// appended when the configured cadence is reached.
    ///
    /// # Errors
    /// `HorizonExceeded` once the oracle is full. The event is not applied
    /// to either side and the run is marked truncated.
    pub fn feed(&mut self, event: &Event) -> Result<()> {
        if self.oracle.remaining_capacity() == 0 {
            self.truncate();
            return Err(DecayError::HorizonExceeded {
                capacity: self.oracle.capacity(),
            }
            .into());
        }
        if let Err(e) = event.validate() {
            self.skip(&e);
            return Ok(());
        }

        let start = Instant::now();
        self.aggregator.update(event);
        self.tracker.update(event);
        self.pending_update_time += start.elapsed();

        self.oracle.record(event)?;
        self.accept(1, event.timestamp);

        if self.checkpoint_due() {
            self.checkpoint();
        }
        Ok(())
    }

    /// Count an input item that never became an event.
    pub fn skip(&mut self, reason: &dyn std::fmt::Display) {
        self.skipped_events += 1;
        metrics::counter!("fade_skipped_events_total").increment(1);
        warn!(skipped = self.skipped_events, "Dropping malformed event: {}", reason);
    }

    fn truncate(&mut self) {
        if self.status != RunStatus::Truncated {
            warn!(
                capacity = self.oracle.capacity(),
                events = self.events_processed,
                "Oracle capacity reached, truncating run"
            );
        }
        self.status = RunStatus::Truncated;
    }

    fn accept(&mut self, count: u64, max_timestamp: f64) {
        self.events_processed += count;
        self.pending += count;
        let now = self
            .stream_time
            .map_or(max_timestamp, |t| t.max(max_timestamp));
        self.stream_time = Some(now);
        self.checkpoint_anchor.get_or_insert(now);
    }

    fn checkpoint_due(&self) -> bool {
        self.due_with(self.pending, self.stream_time)
    }

    fn due_with(&self, pending: u64, now: Option<f64>) -> bool {
        match self.config.checkpoint {
            Checkpoint::Events(every) => pending >= every,
            Checkpoint::Interval(seconds) => match (now, self.checkpoint_anchor) {
                (Some(now), Some(anchor)) => pending > 0 && now - anchor >= seconds,
                _ => false,
            },
        }
    }

    /// Score both sides at the current stream time and append a record.
    ///
    /// Returns `None` before the first event.
    pub fn checkpoint(&mut self) -> Option<&EvaluationRecord> {
        let now = self.stream_time?;

        let start = Instant::now();
        let approx_value = self.aggregator.query(now);
        let approx_top = self.tracker.top_keys(now);
        let query_latency = start.elapsed().as_secs_f64();

        let exact_value = self.oracle.query(now);
        let exact_top: Vec<String> = self
            .oracle
            .top_k(self.config.top_k, now)
            .into_iter()
            .map(|(key, _)| key)
            .collect();

        let update_latency = if self.pending > 0 {
            self.pending_update_time.as_secs_f64() / self.pending as f64
        } else {
            0.0
        };
        let memory_units = self.aggregator.memory_units() + self.tracker.memory_units();

        let record = EvaluationRecord {
            timestamp: now,
            exact_value,
            approx_value,
            relative_error: relative_error(approx_value, exact_value, self.epsilon),
            topk_match: jaccard(&approx_top, &exact_top),
            memory_units,
            update_latency,
            query_latency,
            events_processed: self.events_processed,
            fallback_used: self.aggregator.fallback_used() || self.tracker.fallback_used(),
            out_of_order_events: self.aggregator.out_of_order_events(),
            skipped_events: self.skipped_events,
        };

        metrics::counter!("fade_checkpoints_total").increment(1);
        metrics::gauge!("fade_memory_units").set(memory_units as f64);
        debug!(
            timestamp = now,
            relative_error = record.relative_error,
            topk_match = record.topk_match,
            memory_units,
            "Checkpoint"
        );

        self.pending = 0;
        self.pending_update_time = Duration::ZERO;
        self.checkpoint_anchor = Some(now);
        self.records.push(record);
        self.records.last()
    }

    /// Feed events until the input ends, the flag is raised or the oracle
    /// fills up.
    pub fn run<I>(&mut self, events: I, cancel: &AtomicBool) -> RunStatus
    where
        I: IntoIterator<Item = Event>,
    {
        match self.run_stream(events.into_iter().map(Ok), cancel) {
            Ok(status) => status,
            Err(_) => self.status,
        }
    }

    /// Like [`run`](Self::run) over fallible input. Recoverable item errors
    /// are skipped and counted; anything else ends the run.
    pub fn run_stream<I>(&mut self, events: I, cancel: &AtomicBool) -> Result<RunStatus>
    where
        I: IntoIterator<Item = Result<Event>>,
    {
        info!(
            regime = %self.aggregator.regime(),
            decay = %self.aggregator.decay(),
            checkpoint = %self.config.checkpoint,
            "Starting evaluation run"
        );

        for item in events {
            if cancel.load(Ordering::Relaxed) {
                info!(events = self.events_processed, "Evaluation cancelled");
                self.status = RunStatus::Cancelled;
                break;
            }
            match item {
                Ok(event) => match self.feed(&event) {
                    Ok(()) => {}
                    Err(EvalError::Decay(DecayError::HorizonExceeded { .. })) => break,
                    Err(e) => return Err(e),
                },
                Err(e) if e.is_recoverable() => self.skip(&e),
                Err(e) => return Err(e),
            }
        }
        Ok(self.status)
    }

    /// Like [`run`](Self::run), but within each checkpoint the aggregator
    /// side and the oracle side are driven on separate threads, joined
    /// before scoring.
    pub fn run_parallel(&mut self, events: Vec<Event>, cancel: &AtomicBool) -> RunStatus {
        let mut input = events.into_iter().peekable();

        while input.peek().is_some() {
            if cancel.load(Ordering::Relaxed) {
                info!(events = self.events_processed, "Evaluation cancelled");
                self.status = RunStatus::Cancelled;
                break;
            }

            let chunk = self.next_chunk(&mut input);
            if chunk.is_empty() {
                break;
            }

            let aggregator = &mut self.aggregator;
            let tracker = &mut self.tracker;
            let oracle = &mut self.oracle;
            let (elapsed, recorded) = rayon::join(
                || {
                    let start = Instant::now();
                    for event in &chunk {
                        aggregator.update(event);
                        tracker.update(event);
                    }
                    start.elapsed()
                },
                || chunk.iter().try_for_each(|event| oracle.record(event)),
            );
            self.pending_update_time += elapsed;

            let max_timestamp = chunk
                .iter()
                .map(|event| event.timestamp)
                .fold(f64::NEG_INFINITY, f64::max);
            self.accept(chunk.len() as u64, max_timestamp);

            if let Err(e) = recorded {
                warn!(error = %e, "Oracle rejected event inside a sized chunk");
                self.truncate();
                break;
            }
            if self.checkpoint_due() {
                self.checkpoint();
            }
            if self.status == RunStatus::Truncated {
                break;
            }
        }
        self.status
    }

    /// Valid events up to the next checkpoint boundary, never more than
    /// the oracle can still hold.
    fn next_chunk<I>(&mut self, input: &mut std::iter::Peekable<I>) -> Vec<Event>
    where
        I: Iterator<Item = Event>,
    {
        let room = self.oracle.remaining_capacity();
        let mut chunk = Vec::new();
        let mut now = self.stream_time;

        while chunk.len() < room {
            let Some(event) = input.next() else {
                return chunk;
            };
            if let Err(e) = event.validate() {
                self.skip(&e);
                continue;
            }

            now = Some(now.map_or(event.timestamp, |t| t.max(event.timestamp)));
            if self.checkpoint_anchor.is_none() {
                self.checkpoint_anchor = now;
            }
            chunk.push(event);

            if self.due_with(self.pending + chunk.len() as u64, now) {
                return chunk;
            }
        }

        if input.peek().is_some() {
            self.truncate();
        }
        chunk
    }

    /// Close the run, taking a final checkpoint if events arrived since the
    /// last one.
    pub fn finish(mut self) -> RunReport {
        if self.pending > 0 {
            self.checkpoint();
        }

        let mut summary = RunSummary::from_records(
            self.aggregator.regime(),
            *self.aggregator.decay(),
            self.status,
            &self.records,
        );
        summary.events_processed = self.events_processed;
        summary.skipped_events = self.skipped_events;
        summary.out_of_order_events = self.aggregator.out_of_order_events();

        info!(
            status = ?summary.status,
            events = summary.events_processed,
            skipped = summary.skipped_events,
            checkpoints = summary.checkpoints,
            mean_relative_error = summary.mean_relative_error,
            "Evaluation finished"
        );

        RunReport {
            config: self.config,
            summary,
            records: self.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(checkpoint: Checkpoint) -> EngineConfig {
        EngineConfig {
            checkpoint,
            top_k: 3,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_checkpoint_every_n_events() {
        let mut harness = EvaluationHarness::new(config(Checkpoint::Events(10))).unwrap();
        for t in 0..25 {
            harness.feed(&Event::hit(t as f64, "a")).unwrap();
        }
        assert_eq!(harness.records().len(), 2);
        assert_eq!(harness.records()[1].events_processed, 20);

        let report = harness.finish();
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.summary.events_processed, 25);
    }

    #[test]
    fn test_checkpoint_by_stream_interval() {
        let mut harness = EvaluationHarness::new(config(Checkpoint::Interval(1.0))).unwrap();
        for i in 0..10 {
            harness.feed(&Event::hit(i as f64 * 0.25, "a")).unwrap();
        }
        // anchors at 0.0, then checkpoints at 1.0 and 2.0
        let times: Vec<f64> = harness.records().iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![1.0, 2.0]);
    }

    #[test]
    fn test_checkpoint_before_events_is_none() {
        let mut harness = EvaluationHarness::new(config(Checkpoint::Events(10))).unwrap();
        assert!(harness.checkpoint().is_none());
    }

    #[test]
    fn test_malformed_event_skipped() {
        let mut harness = EvaluationHarness::new(config(Checkpoint::Events(100))).unwrap();
        harness.feed(&Event::hit(0.0, "a")).unwrap();
        harness.feed(&Event::new(1.0, "a", -5.0)).unwrap();
        harness.feed(&Event::new(f64::NAN, "a", 1.0)).unwrap();

        assert_eq!(harness.events_processed(), 1);
        assert_eq!(harness.skipped_events(), 2);
        assert_eq!(harness.oracle().len(), 1);
    }
}
