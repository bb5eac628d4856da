use std::time::Duration;

use async_trait::async_trait;
use corelib::{FeedEvent, Instrument, Tick};
use rand::Rng;
use tokio::sync::mpsc::Sender;
use tracing::info;

use super::TickFeed;

pub const DEFAULT_SIM_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SIM_PIP_SIZE: u32 = 2;

/// Offline stand-in for the live feed.
///
/// Emits `Opened`, then one tick per `interval` priced `100 + U[0, 1)`
/// rounded to `pip_size` places, until the receiver is dropped.
#[derive(Debug, Clone)]
pub struct SimulatedFeed {
    interval: Duration,
    pip_size: u32,
}

impl Default for SimulatedFeed {
    fn default() -> Self {
        Self::new(DEFAULT_SIM_INTERVAL)
    }
}

impl SimulatedFeed {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pip_size: DEFAULT_SIM_PIP_SIZE,
        }
    }

    pub fn with_pip_size(mut self, pip_size: u32) -> Self {
        self.pip_size = pip_size;
        self
    }

    fn next_quote(&self) -> f64 {
        let raw = 100.0 + rand::rng().random::<f64>();
        let scale = 10f64.powi(self.pip_size as i32);
        (raw * scale).round() / scale
    }
}

#[async_trait]
impl TickFeed for SimulatedFeed {
    async fn tick_stream(
        &self,
        instrument: Instrument,
        sender: Sender<FeedEvent>,
    ) -> anyhow::Result<()> {
        info!(interval_ms = self.interval.as_millis() as u64, "simulated feed started");

        if sender.send(FeedEvent::Opened).await.is_err() {
            return Ok(());
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let tick = Tick::new(instrument.clone(), self.next_quote()).with_pip_size(self.pip_size);
            if sender.send(FeedEvent::Tick(tick)).await.is_err() {
                info!("simulated feed stopped");
                return Ok(());
            }
        }
    }

    fn name(&self) -> String {
        "simulated".into()
    }
}
