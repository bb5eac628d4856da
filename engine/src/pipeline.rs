//! Per-instrument ingest pipeline.
//!
//! Order per digit: history append, cluster step, then (on a completed
//! cluster) alert evaluation. Statistics are shared across instruments and
//! recorded by the caller from [`IngestOutcome::cluster`].

use chrono::{DateTime, Utc};
use corelib::{AlertRecord, Digit, Instrument, Tick};

use crate::{
    alert::AlertEngine,
    cluster::{ClusterCompleted, ClusterTracker},
    config::ClusterThreshold,
    error::{ConfigError, EngineError},
    extract::extract_from_tick,
    history::{ClusterSpan, DigitHistory},
    stats::StatsAggregator,
};

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub digit: Digit,
    pub cluster: Option<ClusterCompleted>,
    pub alert: Option<AlertRecord>,
}

impl IngestOutcome {
    /// Record the completed cluster, if any, into shared statistics.
    pub fn record_into(&self, stats: &mut StatsAggregator) {
        if let Some(c) = &self.cluster {
            stats.record(c.completed_count);
        }
    }
}

/// All mutable state of one instrument. Single writer.
#[derive(Debug, Clone)]
pub struct InstrumentPipeline {
    instrument: Instrument,
    history: DigitHistory,
    tracker: ClusterTracker,
    alerts: AlertEngine,
    /// Feed timestamp of the newest ingested tick that carried one.
    last_epoch: Option<i64>,
}

impl InstrumentPipeline {
    pub fn new(instrument: Instrument, history_capacity: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            instrument,
            history: DigitHistory::new(history_capacity)?,
            tracker: ClusterTracker::new(),
            alerts: AlertEngine::new(),
            last_epoch: None,
        })
    }

    pub fn ingest(
        &mut self,
        digit: Digit,
        threshold: ClusterThreshold,
        now: DateTime<Utc>,
    ) -> IngestOutcome {
        self.history.append(digit);

        let cluster = self.tracker.observe(digit);
        let alert = cluster.as_ref().and_then(|c| {
            self.alerts.evaluate(
                &self.instrument,
                c.digit,
                c.completed_count,
                threshold,
                self.tracker.completed_clusters(c.digit),
                now,
            )
        });

        IngestOutcome {
            digit,
            cluster,
            alert,
        }
    }

    /// Extract the digit from a tick and ingest it. A tick without a usable
    /// digit leaves every piece of state untouched.
    pub fn ingest_tick(
        &mut self,
        tick: &Tick,
        threshold: ClusterThreshold,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, EngineError> {
        let digit = extract_from_tick(tick)?;
        if tick.epoch.is_some() {
            self.last_epoch = tick.epoch;
        }
        Ok(self.ingest(digit, threshold, now))
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn history(&self) -> &DigitHistory {
        &self.history
    }

    pub fn tracker(&self) -> &ClusterTracker {
        &self.tracker
    }

    pub fn alerts(&self) -> &AlertEngine {
        &self.alerts
    }

    pub fn last_epoch(&self) -> Option<i64> {
        self.last_epoch
    }

    pub fn cluster_spans(&self) -> Vec<ClusterSpan> {
        self.history.cluster_spans()
    }

    pub fn reset_fired(&mut self) {
        self.alerts.reset_fired();
    }
}
