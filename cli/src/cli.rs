use clap::Parser;
use engine::{ClusterThreshold, ConfigError};

use crate::config::{AppConfig, parse_instruments};

/// Command-line overrides. Anything left unset falls back to the
/// environment, then to the built-in defaults.
#[derive(Debug, Parser)]
#[clap(name = "digit-sniper", version, about = "Last-digit cluster alerts for tick streams")]
pub struct Cli {
    /// Instruments to watch (comma-separated symbols or "Volatility N" labels)
    #[clap(long, value_delimiter = ',')]
    pub instruments: Vec<String>,

    /// Completed clusters of one digit that raise an alert (>= 2)
    #[clap(long, allow_negative_numbers = true)]
    pub threshold: Option<i64>,

    /// Digits of history kept per instrument
    #[clap(long)]
    pub history: Option<usize>,

    /// WebSocket endpoint of the tick feed
    #[clap(long)]
    pub ws_url: Option<String>,

    /// Use the offline random feed instead of the WebSocket
    #[clap(long)]
    pub simulate: bool,

    /// Emit logs as JSON lines
    #[clap(long)]
    pub json_logs: bool,

    /// Seconds between status lines, 0 disables them
    #[clap(long, default_value_t = 30)]
    pub status_secs: u64,
}

impl Cli {
    pub fn apply(&self, cfg: &mut AppConfig) -> Result<(), ConfigError> {
        if !self.instruments.is_empty() {
            let instruments = parse_instruments(&self.instruments.join(","));
            if instruments.is_empty() {
                return Err(ConfigError::InvalidEnv {
                    key: "--instruments",
                    value: self.instruments.join(","),
                });
            }
            cfg.instruments = instruments;
        }
        if let Some(t) = self.threshold {
            cfg.cluster_threshold = ClusterThreshold::new(t)?;
        }
        if let Some(h) = self.history {
            if h == 0 {
                return Err(ConfigError::InvalidCapacity);
            }
            cfg.history_capacity = h;
        }
        if let Some(url) = &self.ws_url {
            cfg.ws_url = url.clone();
        }
        cfg.json_logs |= self.json_logs;
        Ok(())
    }
}
