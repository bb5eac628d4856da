//! Async boundary around the digit engine: tick transports, the
//! per-instrument coordinator and the announcement sink.

pub mod announce;
pub mod coordinator;
pub mod feed;
pub mod types;
