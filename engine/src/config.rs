use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_HISTORY_CAPACITY: usize = 30;
pub const DEFAULT_CLUSTER_THRESHOLD: usize = 3;
pub const DEFAULT_ALERT_LOG_CAPACITY: usize = 500;

/// Number of completed clusters of one digit that raises an alert.
///
/// Always >= 2: a single cluster is just noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ClusterThreshold(usize);

impl ClusterThreshold {
    pub const MIN: usize = 2;

    pub fn new(value: i64) -> Result<Self, ConfigError> {
        if value < Self::MIN as i64 {
            return Err(ConfigError::InvalidThreshold(value));
        }
        usize::try_from(value)
            .map(Self)
            .map_err(|_| ConfigError::InvalidThreshold(value))
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn is_reached(self, completed_count: usize) -> bool {
        completed_count >= self.0
    }
}

impl Default for ClusterThreshold {
    fn default() -> Self {
        Self(DEFAULT_CLUSTER_THRESHOLD)
    }
}

impl TryFrom<i64> for ClusterThreshold {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClusterThreshold> for i64 {
    fn from(t: ClusterThreshold) -> Self {
        t.0 as i64
    }
}

/// Engine settings shared by every instrument pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Digits kept per instrument for display and span highlighting.
    /// Cluster accounting does not depend on it.
    pub history_capacity: usize,

    /// Initial alert threshold. Adjustable at runtime.
    pub cluster_threshold: ClusterThreshold,

    /// Fired alerts retained for the alert list, newest last.
    pub alert_log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            cluster_threshold: ClusterThreshold::default(),
            alert_log_capacity: DEFAULT_ALERT_LOG_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 || self.alert_log_capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        Ok(())
    }
}
