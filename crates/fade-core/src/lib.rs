//! # FADE Core
//!
//! Time-decayed aggregation over unbounded event streams, in bounded memory.
//!
//! ## Features
//!
//! - Exponential, polynomial and fixed-window decay functions
//! - Forward decay (landmark-relative, O(1) update and query)
//! - Backward decay (rescaled on every update)
//! - Sliding windows with horizon eviction and a hard bucket cap
//! - Capacity-bounded top-K tracking with lowest-weight eviction
//! - An exact, capacity-checked oracle for scoring approximations
//!
//! ## Quick Start
//!
//! ```rust
//! use fade_core::{DecayFunction, Event, ForwardDecayAggregator, GroundTruthOracle};
//!
//! let decay = DecayFunction::exponential(0.01).unwrap();
//! let mut forward = ForwardDecayAggregator::new(decay, 1024);
//! let mut oracle = GroundTruthOracle::new(decay);
//!
//! for t in 0..1000 {
//!     let event = Event::hit(t as f64, "10.0.0.1");
//!     forward.update(&event);
//!     oracle.record(&event).unwrap();
//! }
//!
//! // Σ e^(-0.01·(999 − t)) for t in 0..1000, a geometric series
//! let closed_form = (1.0 - (-10.0f64).exp()) / (1.0 - (-0.01f64).exp());
//! let approx = forward.query(999.0);
//! assert!((approx - oracle.query(999.0)).abs() < 1e-6);
//! assert!((approx - closed_form).abs() / closed_form < 0.01);
//! ```
//!
//! ## Regimes
//!
//! | Regime | Update | Query | Exact for |
//! |--------|--------|-------|-----------|
//! | Forward | O(1) | O(1) | exponential (buffered otherwise) |
//! | Backward | O(1) | O(1) | exponential (buffered otherwise) |
//! | Sliding | amortized O(1) | O(buckets) | bucket-aligned data |

pub mod aggregator;
pub mod backward;
pub mod buffer;
pub mod config;
pub mod decay;
pub mod error;
pub mod event;
pub mod forward;
pub mod oracle;
pub mod topk;
pub mod window;

pub use aggregator::{Aggregator, Regime};
pub use backward::BackwardDecayAggregator;
pub use buffer::RecentBuffer;
pub use config::{Checkpoint, DecayKind, EngineConfig};
pub use decay::DecayFunction;
pub use error::{DecayError, Result};
pub use event::{Event, StreamClock};
pub use forward::ForwardDecayAggregator;
pub use oracle::GroundTruthOracle;
pub use topk::{TopKEntry, TopKTracker, TrackerMode};
pub use window::{Bucket, SlidingWindowAggregator, WindowConfig, MIN_BUCKET_CAP};
