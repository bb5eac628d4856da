use std::time::Duration;

use async_trait::async_trait;
use corelib::{ConnectionState, FeedEvent, Instrument};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::Sender;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use super::{ConnectionTracker, ReconnectPolicy, TickFeed, parse_feed_message};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_WS_URL: &str = "wss://ws.derivws.com/websockets/v3?app_id=1089";
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

const PING_REQUEST: &str = r#"{"ping":1}"#;

/// WebSocket tick client for the Deriv `ticks` API.
///
/// Per instrument it:
/// - opens its own connection and sends a `ticks` subscription
/// - pings every `ping_interval` to keep the socket alive
/// - forwards parsed frames as [`FeedEvent`]s
/// - reconnects after [`ReconnectPolicy::next_delay`] on close or error
///
/// The loop ends only when the receiving side of `sender` is dropped.
#[derive(Debug, Clone)]
pub struct DerivWsClient {
    ws_url: String,
    ping_interval: Duration,
    reconnect: ReconnectPolicy,
}

enum SessionEnd {
    Closed(String),
    ReceiverGone,
}

impl Default for DerivWsClient {
    fn default() -> Self {
        Self::new(DEFAULT_WS_URL)
    }
}

impl DerivWsClient {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            ping_interval: DEFAULT_PING_INTERVAL,
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect = ReconnectPolicy::new(delay);
        self
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// One-time subscription message for `symbol`.
    pub fn subscribe_request(symbol: &str) -> String {
        serde_json::json!({ "ticks": symbol, "subscribe": 1 }).to_string()
    }

    /// Connect / stream / reconnect loop for a single instrument.
    pub async fn run_ws_loop(
        &self,
        instrument: Instrument,
        sender: Sender<FeedEvent>,
    ) -> anyhow::Result<()> {
        let mut conn = ConnectionTracker::new();

        loop {
            advance(&mut conn, ConnectionState::Connecting);
            info!(url = %self.ws_url, "connecting");

            match connect_async(self.ws_url.as_str()).await {
                Ok((ws, _)) => {
                    advance(&mut conn, ConnectionState::Connected);
                    info!(connects = conn.connects(), "connected");

                    if sender.send(FeedEvent::Opened).await.is_err() {
                        return Ok(());
                    }

                    let end = self.run_session(ws, &instrument, &sender).await;
                    advance(&mut conn, ConnectionState::Disconnected);

                    match end {
                        SessionEnd::ReceiverGone => return Ok(()),
                        SessionEnd::Closed(reason) => {
                            warn!(%reason, "connection closed");
                            if sender.send(FeedEvent::Closed { reason }).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                }
                Err(e) => {
                    advance(&mut conn, ConnectionState::Disconnected);
                    warn!(
                        error = %e,
                        failures = conn.consecutive_failures(),
                        "connection failed"
                    );
                    let info = format!("connect failed: {e}");
                    if sender.send(FeedEvent::Error { info }).await.is_err() {
                        return Ok(());
                    }
                }
            }

            let delay = self.reconnect.next_delay();
            info!(delay_ms = delay.as_millis() as u64, "reconnecting");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = sender.closed() => return Ok(()),
            }
        }
    }

    async fn run_session(
        &self,
        ws: WsStream,
        instrument: &Instrument,
        sender: &Sender<FeedEvent>,
    ) -> SessionEnd {
        let (mut write, mut read) = ws.split();

        let request = Self::subscribe_request(instrument.symbol());
        if let Err(e) = write.send(Message::Text(request.into())).await {
            return SessionEnd::Closed(format!("subscribe failed: {e}"));
        }
        debug!("subscription sent");

        let mut ping = tokio::time::interval(self.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ping.tick().await;

        loop {
            tokio::select! {
                _ = ping.tick() => {
                    if let Err(e) = write.send(Message::Text(PING_REQUEST.into())).await {
                        return SessionEnd::Closed(format!("ping failed: {e}"));
                    }
                }

                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => return SessionEnd::Closed(e.to_string()),
                        None => return SessionEnd::Closed("stream ended".into()),
                    };

                    match msg {
                        Message::Text(text) => {
                            trace!(frame = %text.as_str(), "incoming");
                            match parse_feed_message(text.as_str()) {
                                Ok(Some(event)) => {
                                    if sender.send(event).await.is_err() {
                                        return SessionEnd::ReceiverGone;
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => debug!(error = %e, "dropping unparseable frame"),
                            }
                        }
                        Message::Close(frame) => {
                            let reason = frame
                                .map(|f| f.reason.as_str().to_string())
                                .filter(|r| !r.is_empty())
                                .unwrap_or_else(|| "closed by server".into());
                            return SessionEnd::Closed(reason);
                        }
                        // tungstenite answers pings itself
                        _ => {}
                    }
                }
            }
        }
    }
}

fn advance(conn: &mut ConnectionTracker, to: ConnectionState) {
    if let Err(e) = conn.transition(to) {
        warn!(error = %e, "rejected connection transition");
    }
}

#[async_trait]
impl TickFeed for DerivWsClient {
    async fn tick_stream(
        &self,
        instrument: Instrument,
        sender: Sender<FeedEvent>,
    ) -> anyhow::Result<()> {
        self.run_ws_loop(instrument, sender).await
    }

    fn name(&self) -> String {
        self.ws_url.clone()
    }
}
