//! Tick feed message parser.
//!
//! The feed speaks JSON with a `msg_type` discriminator:
//!
//! ```jsonc
//! { "msg_type": "tick",
//!   "tick": { "symbol": "R_100", "quote": 1043.27, "pip_size": 2, "epoch": 1718000000 } }
//! { "msg_type": "ping", "ping": "pong" }
//! { "msg_type": "tick", "error": { "code": "InvalidSymbol", "message": "Symbol R_1 is invalid" } }
//! ```
//!
//! Ticks become [`FeedEvent::Tick`], a top-level `error` object becomes
//! [`FeedEvent::Error`], keepalive replies and anything else return `None`.
//! Invalid JSON or a tick without a numeric quote is an error; the caller
//! drops the frame.

use anyhow::Context;
use corelib::{FeedEvent, Instrument, Tick};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    msg_type: Option<String>,
    #[serde(default)]
    tick: Option<TickPayload>,
    #[serde(default)]
    error: Option<ErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct TickPayload {
    symbol: String,
    quote: f64,
    #[serde(default)]
    pip_size: Option<u32>,
    #[serde(default)]
    epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

pub fn parse_feed_message(raw: &str) -> anyhow::Result<Option<FeedEvent>> {
    let env: Envelope = serde_json::from_str(raw).context("malformed feed message")?;

    if let Some(err) = env.error {
        return Ok(Some(FeedEvent::Error { info: err.message }));
    }

    match env.msg_type.as_deref() {
        Some("tick") => {
            let t = env.tick.context("tick message without tick payload")?;
            Ok(Some(FeedEvent::Tick(Tick {
                instrument: Instrument::new(t.symbol),
                quote: t.quote,
                pip_size: t.pip_size,
                epoch: t.epoch,
            })))
        }
        _ => Ok(None),
    }
}
