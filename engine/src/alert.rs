use chrono::{DateTime, Utc};
use corelib::{AlertRecord, Digit, Instrument};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ClusterThreshold;

/// Threshold evaluation with at-most-one alert per digit.
///
/// One engine per instrument, so a flag is keyed by (instrument, digit).
/// A flag stays set for the lifetime of the pair; only [`reset_fired`]
/// clears it, which the coordinator calls when the threshold changes.
///
/// [`reset_fired`]: AlertEngine::reset_fired
#[derive(Debug, Clone, Default)]
pub struct AlertEngine {
    fired: [bool; 10],
    fired_total: u64,
}

impl AlertEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a record iff `completed_count` reached `threshold` and no
    /// alert fired yet for `digit`.
    pub fn evaluate(
        &mut self,
        instrument: &Instrument,
        digit: Digit,
        completed_count: usize,
        threshold: ClusterThreshold,
        chain: &[usize],
        now: DateTime<Utc>,
    ) -> Option<AlertRecord> {
        if !threshold.is_reached(completed_count) {
            return None;
        }

        let flag = &mut self.fired[digit.index()];
        if *flag {
            debug!(
                instrument = %instrument,
                digit = %digit,
                completed_count,
                "alert already fired for digit; suppressed"
            );
            return None;
        }
        *flag = true;
        self.fired_total += 1;

        info!(
            instrument = %instrument,
            digit = %digit,
            completed_count,
            threshold = threshold.get(),
            "sniper alert fired"
        );

        Some(AlertRecord {
            id: Uuid::new_v4(),
            instrument: instrument.clone(),
            digit,
            cluster_count: completed_count,
            threshold: threshold.get(),
            chain: chain.to_vec(),
            timestamp: now,
        })
    }

    pub fn has_fired(&self, digit: Digit) -> bool {
        self.fired[digit.index()]
    }

    pub fn reset_fired(&mut self) {
        self.fired = [false; 10];
    }

    pub fn fired_total(&self) -> u64 {
        self.fired_total
    }
}
