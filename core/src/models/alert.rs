use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Digit, Instrument};

/// A fired sniper alert. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub instrument: Instrument,
    pub digit: Digit,
    /// Completed clusters of `digit` when the alert fired.
    pub cluster_count: usize,
    /// Threshold in force when the alert fired.
    pub threshold: usize,
    /// Streak lengths of the completed clusters, oldest first.
    pub chain: Vec<usize>,
    pub timestamp: DateTime<Utc>,
}

impl AlertRecord {
    /// `3 → 2 → 4`
    pub fn chain_label(&self) -> String {
        self.chain
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" → ")
    }
}
