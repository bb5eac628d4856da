use tracing::{Span, field};

use super::TraceId;

/// Root span for one process run. Every per-instrument span nests under it.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id.as_str(),
        threshold = field::Empty
    )
}

/// Span wrapping the processing task of one instrument.
pub fn instrument_span(symbol: &str) -> Span {
    tracing::info_span!("instrument", symbol = %symbol)
}

/// Span wrapping the transport task of one instrument.
pub fn feed_span(symbol: &str, url: &str) -> Span {
    tracing::info_span!("feed", symbol = %symbol, url = %url)
}
