//! Synchronous digit-cluster engine.
//!
//! Everything in this crate is pure in-memory computation: no I/O, no
//! timers, no locks. The async coordinator in `market` owns one
//! [`InstrumentPipeline`] per instrument and feeds it ticks in order.

pub mod alert;
pub mod announce;
pub mod cluster;
pub mod config;
pub mod error;
pub mod extract;
pub mod history;
pub mod pipeline;
pub mod stats;

pub use alert::AlertEngine;
pub use cluster::{ClusterCompleted, ClusterState, ClusterTracker};
pub use config::{ClusterThreshold, EngineConfig};
pub use error::{ConfigError, EngineError};
pub use history::{ClusterSpan, DigitHistory};
pub use pipeline::{IngestOutcome, InstrumentPipeline};
pub use stats::StatsAggregator;
