pub mod connection;
pub mod deriv_ws;
pub mod parser;
pub mod simulated;

use async_trait::async_trait;
use corelib::{FeedEvent, Instrument};
use tokio::sync::mpsc::Sender;

pub use connection::{ConnectionTracker, InvalidTransition, ReconnectPolicy};
pub use deriv_ws::DerivWsClient;
pub use parser::parse_feed_message;
pub use simulated::SimulatedFeed;

/// Source of tick events for one instrument.
///
/// An implementation subscribes to `instrument` and forwards every event to
/// `sender` until the receiver is dropped. Reconnecting is its own business;
/// the coordinator only sees `Opened` / `Closed` / `Error` events.
#[async_trait]
pub trait TickFeed: Send + Sync + 'static {
    async fn tick_stream(
        &self,
        instrument: Instrument,
        sender: Sender<FeedEvent>,
    ) -> anyhow::Result<()>;

    /// Short label for logs and spans.
    fn name(&self) -> String;
}
