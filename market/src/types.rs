use corelib::{ConnectionState, Digit, Instrument};
use engine::{ClusterSpan, ConfigError, EngineConfig};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
pub const DEFAULT_ALERT_SUBSCRIBER_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub engine: EngineConfig,

    /// Buffer between an instrument's feed task and its processing task.
    pub channel_capacity: usize,

    /// Buffer of each `subscribe_alerts` receiver.
    pub alert_subscriber_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            alert_subscriber_capacity: DEFAULT_ALERT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        if self.channel_capacity == 0 || self.alert_subscriber_capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        Ok(())
    }
}

/// Point-in-time view of one instrument, for status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentStatus {
    pub instrument: Instrument,
    pub connection: ConnectionState,
    pub history: Vec<Digit>,
    pub spans: Vec<ClusterSpan>,
    /// Digit and length of the run still in progress.
    pub open_streak: Option<(Digit, usize)>,
    pub ticks_observed: u64,
    /// Feed timestamp (seconds) of the newest tick that carried one.
    pub last_epoch: Option<i64>,
    /// Number of completed clusters per digit.
    pub completed: Vec<(Digit, usize)>,
}
