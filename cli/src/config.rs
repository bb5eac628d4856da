use std::time::Duration;

use corelib::Instrument;
use engine::{ClusterThreshold, ConfigError, EngineConfig};
use market::{
    feed::deriv_ws::{DEFAULT_PING_INTERVAL, DEFAULT_WS_URL},
    types::CoordinatorConfig,
};

pub const DEFAULT_INSTRUMENTS: [&str; 5] = ["R_10", "R_25", "R_50", "R_75", "R_100"];
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Instruments streamed at startup.
    ///
    /// `SNIPER_INSTRUMENTS`, comma-separated. Entries may be raw feed
    /// symbols (`R_50`) or selector labels (`Volatility 50`).
    /// Default: the five standard volatility indices.
    pub instruments: Vec<Instrument>,

    // =========================
    // Engine configuration
    // =========================
    /// Completed clusters of one digit needed to raise an alert.
    ///
    /// `SNIPER_THRESHOLD`, integer >= 2, default 3. Can be changed at
    /// runtime; a change re-arms every digit of every instrument.
    pub cluster_threshold: ClusterThreshold,

    /// Digits kept per instrument for display.
    ///
    /// `SNIPER_HISTORY`, default 30. Only affects what the status output
    /// shows; cluster counting never looks at the window.
    pub history_capacity: usize,

    // =========================
    // Feed configuration
    // =========================
    /// `FEED_WS_URL`, default the public Deriv endpoint.
    pub ws_url: String,

    /// Keepalive ping period. `FEED_PING_SECS`, default 30.
    pub ping_interval: Duration,

    /// Base delay before reconnecting after a close or failed attempt.
    ///
    /// `FEED_RECONNECT_SECS`, default 3. Up to 300 ms of jitter is added so
    /// the per-instrument sockets do not reconnect in lockstep.
    pub reconnect_delay: Duration,

    /// One JSON object per log line. Set when `APP_ENV=production`.
    pub json_logs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            instruments: DEFAULT_INSTRUMENTS.iter().map(|s| Instrument::new(*s)).collect(),
            cluster_threshold: ClusterThreshold::default(),
            history_capacity: EngineConfig::default().history_capacity,
            ws_url: DEFAULT_WS_URL.to_string(),
            ping_interval: DEFAULT_PING_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            json_logs: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(raw) = lookup("SNIPER_INSTRUMENTS") {
            let instruments = parse_instruments(&raw);
            if instruments.is_empty() {
                return Err(ConfigError::InvalidEnv {
                    key: "SNIPER_INSTRUMENTS",
                    value: raw,
                });
            }
            cfg.instruments = instruments;
        }

        if let Some(raw) = lookup("SNIPER_THRESHOLD") {
            let value = parse_int::<i64>("SNIPER_THRESHOLD", &raw)?;
            cfg.cluster_threshold = ClusterThreshold::new(value)?;
        }

        if let Some(raw) = lookup("SNIPER_HISTORY") {
            cfg.history_capacity = parse_int("SNIPER_HISTORY", &raw)?;
            if cfg.history_capacity == 0 {
                return Err(ConfigError::InvalidCapacity);
            }
        }

        if let Some(url) = lookup("FEED_WS_URL").filter(|u| !u.trim().is_empty()) {
            cfg.ws_url = url.trim().to_string();
        }

        if let Some(raw) = lookup("FEED_PING_SECS") {
            cfg.ping_interval = parse_secs("FEED_PING_SECS", &raw)?;
        }

        if let Some(raw) = lookup("FEED_RECONNECT_SECS") {
            cfg.reconnect_delay = parse_secs("FEED_RECONNECT_SECS", &raw)?;
        }

        cfg.json_logs = lookup("APP_ENV").is_some_and(|v| v == "production");

        Ok(cfg)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let mut config = CoordinatorConfig::default();
        config.engine.cluster_threshold = self.cluster_threshold;
        config.engine.history_capacity = self.history_capacity;
        config
    }
}

pub fn parse_instruments(raw: &str) -> Vec<Instrument> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Instrument::parse)
        .collect()
}

fn parse_int<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: raw.to_string(),
    })
}

fn parse_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_int(key, raw)?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnv {
            key,
            value: raw.to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
