use corelib::DigitOutOfRange;
use thiserror::Error;

/// Failures while turning a quote into history state.
///
/// These never leave the ingest path: the coordinator drops the tick and
/// logs at debug level.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    DigitOutOfRange(#[from] DigitOutOfRange),

    #[error("quote is not a finite number: {0}")]
    NonFiniteQuote(f64),

    #[error("no decimal digit in printed quote {0:?}")]
    NoDigit(String),
}

/// Rejected configuration values. The previous value stays in effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cluster threshold must be an integer >= 2, got {0}")]
    InvalidThreshold(i64),

    #[error("capacities must be at least 1")]
    InvalidCapacity,

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}
