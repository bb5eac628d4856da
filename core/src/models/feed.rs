use serde::{Deserialize, Serialize};

use super::Instrument;

/// One price update as delivered by a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub instrument: Instrument,
    pub quote: f64,
    /// Fractional digits the feed prints for this instrument, if known.
    #[serde(default)]
    pub pip_size: Option<u32>,
    /// Feed timestamp in seconds, if provided.
    #[serde(default)]
    pub epoch: Option<i64>,
}

impl Tick {
    pub fn new(instrument: Instrument, quote: f64) -> Self {
        Self {
            instrument,
            quote,
            pip_size: None,
            epoch: None,
        }
    }

    pub fn with_pip_size(mut self, pip_size: u32) -> Self {
        self.pip_size = Some(pip_size);
        self
    }

    pub fn with_epoch(mut self, epoch: i64) -> Self {
        self.epoch = Some(epoch);
        self
    }
}

/// Everything a transport can report about one instrument's stream.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Opened,
    Closed { reason: String },
    Tick(Tick),
    Error { info: String },
}

/// Transport connection status as seen by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}
