//! StreamCoordinator
//!
//! Owns every per-instrument pipeline and the state shared across them.
//! Responsibilities:
//!   • Spawn one feed task and one processing task per subscribed instrument
//!   • Dispatch feed events: ticks into the pipeline, lifecycle events into
//!     the connection state
//!   • Record completed clusters into the shared statistics
//!   • Keep the alert log, fan alerts out to subscribers and the
//!     announcement sink
//!
//! Like the pipelines it drives, the coordinator never blocks on I/O while
//! holding a lock. It is created as `Arc<Self>` so spawned tasks can hold it.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use common::logger::{feed_span, instrument_span};
use corelib::{AlertRecord, ConnectionState, Digit, FeedEvent, Instrument, Tick};
use engine::{ClusterSpan, ClusterThreshold, ConfigError, InstrumentPipeline, StatsAggregator};
use engine::announce::announcement_text;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{Instrument as _, debug, error, info, warn};

use crate::{
    announce::AnnouncementSink,
    feed::{ConnectionTracker, TickFeed},
    types::{CoordinatorConfig, InstrumentStatus},
};

/// Feed and processing task of one subscription. `id` tells a finished
/// stream apart from a newer subscription of the same instrument.
struct StreamTasks {
    id: u64,
    handles: [JoinHandle<()>; 2],
}

pub struct StreamCoordinator<F> {
    feed: Arc<F>,
    announcer: Arc<dyn AnnouncementSink>,
    config: CoordinatorConfig,

    threshold: RwLock<ClusterThreshold>,
    pipelines: RwLock<HashMap<Instrument, Arc<Mutex<InstrumentPipeline>>>>,
    connections: Mutex<HashMap<Instrument, ConnectionTracker>>,
    tasks: Mutex<HashMap<Instrument, StreamTasks>>,
    next_stream_id: AtomicU64,

    stats: Mutex<StatsAggregator>,
    /// Newest last, bounded by `engine.alert_log_capacity`.
    alert_log: Mutex<VecDeque<AlertRecord>>,
    subscribers: Mutex<Vec<Sender<AlertRecord>>>,

    dropped_ticks: AtomicU64,
}

impl<F: TickFeed> StreamCoordinator<F> {
    pub fn new(
        feed: Arc<F>,
        announcer: Arc<dyn AnnouncementSink>,
        config: CoordinatorConfig,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;

        Ok(Arc::new(Self {
            feed,
            announcer,
            threshold: RwLock::new(config.engine.cluster_threshold),
            config,
            pipelines: RwLock::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            next_stream_id: AtomicU64::new(0),
            stats: Mutex::new(StatsAggregator::new()),
            alert_log: Mutex::new(VecDeque::new()),
            subscribers: Mutex::new(Vec::new()),
            dropped_ticks: AtomicU64::new(0),
        }))
    }

    /// Create the pipeline for `instrument` without starting a feed.
    /// Existing state is kept.
    pub fn register(&self, instrument: &Instrument) -> Result<(), ConfigError> {
        let mut pipelines = self.pipelines.write();
        if pipelines.contains_key(instrument) {
            return Ok(());
        }

        let pipeline =
            InstrumentPipeline::new(instrument.clone(), self.config.engine.history_capacity)?;
        pipelines.insert(instrument.clone(), Arc::new(Mutex::new(pipeline)));
        Ok(())
    }

    /// Start streaming `instrument`.
    ///
    /// Spawns the feed task and a processing task that drains the feed's
    /// channel in order. A second call for a running instrument does nothing.
    /// Once the feed gives up, the instrument goes `Disconnected` and can be
    /// subscribed again.
    pub async fn subscribe(self: &Arc<Self>, instrument: Instrument) -> Result<(), ConfigError> {
        let mut tasks = self.tasks.lock();
        if tasks.contains_key(&instrument) {
            debug!(symbol = %instrument, "already subscribed");
            return Ok(());
        }

        self.register(&instrument)?;
        self.mark_connection(&instrument, ConnectionState::Connecting);

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);

        let feed = Arc::clone(&self.feed);
        let span = feed_span(instrument.symbol(), &feed.name());
        let feed_instrument = instrument.clone();
        let feed_task = tokio::spawn(
            async move {
                match feed.tick_stream(feed_instrument, tx).await {
                    Ok(()) => debug!("feed finished"),
                    Err(e) => error!(error = %e, "feed failed"),
                }
            }
            .instrument(span),
        );

        let this = Arc::clone(self);
        let span = instrument_span(instrument.symbol());
        let proc_instrument = instrument.clone();
        let proc_task = tokio::spawn(
            async move { this.process_event_stream(proc_instrument, id, rx).await }
                .instrument(span),
        );

        info!(symbol = %instrument, feed = %self.feed.name(), "subscribed");
        tasks.insert(
            instrument,
            StreamTasks {
                id,
                handles: [feed_task, proc_task],
            },
        );
        Ok(())
    }

    /// Stop ingesting `instrument`. History, clusters and fired flags stay.
    pub fn unsubscribe(&self, instrument: &Instrument) -> bool {
        let Some(stream) = self.tasks.lock().remove(instrument) else {
            return false;
        };
        for h in stream.handles {
            h.abort();
        }

        self.mark_connection(instrument, ConnectionState::Disconnected);
        info!(symbol = %instrument, "unsubscribed");
        true
    }

    pub fn shutdown(&self) {
        let drained: Vec<_> = self.tasks.lock().drain().collect();
        for (instrument, stream) in drained {
            for h in stream.handles {
                h.abort();
            }
            self.mark_connection(&instrument, ConnectionState::Disconnected);
        }
        info!("coordinator shut down");
    }

    /// Runs until the feed drops its sender, i.e. after the feed task has
    /// returned and every queued event has been handled.
    async fn process_event_stream(
        self: Arc<Self>,
        instrument: Instrument,
        id: u64,
        mut rx: Receiver<FeedEvent>,
    ) {
        while let Some(event) = rx.recv().await {
            self.handle_event(&instrument, event);
        }
        self.release_stream(&instrument, id);
    }

    fn release_stream(&self, instrument: &Instrument, id: u64) {
        {
            let mut tasks = self.tasks.lock();
            if !tasks.get(instrument).is_some_and(|t| t.id == id) {
                // unsubscribed or replaced meanwhile
                return;
            }
            tasks.remove(instrument);
        }

        self.mark_connection(instrument, ConnectionState::Disconnected);
        warn!(symbol = %instrument, "feed ended, instrument released");
    }
}

impl<F> StreamCoordinator<F> {
    /// Single dispatch point for everything a feed reports.
    pub fn handle_event(&self, instrument: &Instrument, event: FeedEvent) {
        match event {
            FeedEvent::Opened => {
                info!(symbol = %instrument, "feed opened");
                self.mark_connection(instrument, ConnectionState::Connected);
            }
            FeedEvent::Closed { reason } => {
                warn!(symbol = %instrument, %reason, "feed closed");
                self.mark_connection(instrument, ConnectionState::Disconnected);
            }
            FeedEvent::Error { info } => {
                warn!(symbol = %instrument, %info, "feed error");
                // Only a failed attempt changes state; errors on a live
                // connection are reported by the feed and followed by Closed.
                if self.connection_state(instrument) == ConnectionState::Connecting {
                    self.mark_connection(instrument, ConnectionState::Disconnected);
                }
            }
            FeedEvent::Tick(tick) => self.ingest_tick(instrument, tick),
        }
    }

    fn ingest_tick(&self, instrument: &Instrument, tick: Tick) {
        if &tick.instrument != instrument {
            debug!(
                symbol = %instrument,
                tick_symbol = %tick.instrument,
                "dropping tick for another instrument"
            );
            self.dropped_ticks.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let Some(pipeline) = self.pipelines.read().get(instrument).cloned() else {
            debug!(symbol = %instrument, "dropping tick for unregistered instrument");
            self.dropped_ticks.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let outcome = {
            let mut p = pipeline.lock();
            // under the pipeline lock: threshold and fired flags change together
            let threshold = *self.threshold.read();
            p.ingest_tick(&tick, threshold, Utc::now())
        };

        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                debug!(symbol = %instrument, quote = tick.quote, error = %e, "dropping malformed tick");
                self.dropped_ticks.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        if let Some(cluster) = &outcome.cluster {
            debug!(
                symbol = %instrument,
                digit = %cluster.digit,
                streak = cluster.streak,
                completed = cluster.completed_count,
                "cluster completed"
            );
            outcome.record_into(&mut self.stats.lock());
        }

        if let Some(alert) = outcome.alert {
            self.publish(alert);
        }
    }

    fn publish(&self, alert: AlertRecord) {
        info!(
            symbol = %alert.instrument,
            digit = %alert.digit,
            clusters = alert.cluster_count,
            chain = %alert.chain_label(),
            "sniper alert"
        );

        {
            let mut log = self.alert_log.lock();
            if log.len() == self.config.engine.alert_log_capacity {
                log.pop_front();
            }
            log.push_back(alert.clone());
        }

        self.subscribers
            .lock()
            .retain(|tx| match tx.try_send(alert.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(id = %alert.id, "alert subscriber full, alert dropped for it");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("alert subscriber closed, removing");
                    false
                }
            });

        let text = announcement_text(&alert);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sink = Arc::clone(&self.announcer);
                handle.spawn(
                    async move {
                        if let Err(e) = sink.announce(&text).await {
                            warn!(error = %e, "announcement failed");
                        }
                    }
                    .in_current_span(),
                );
            }
            Err(_) => debug!(%text, "no runtime, announcement skipped"),
        }
    }

    fn mark_connection(&self, instrument: &Instrument, to: ConnectionState) {
        let mut conns = self.connections.lock();
        let conn = conns.entry(instrument.clone()).or_default();

        if conn.state() == to {
            return;
        }
        // A feed reconnects on its own, so a new session can open straight
        // from Disconnected.
        if to == ConnectionState::Connected && conn.state() == ConnectionState::Disconnected {
            if let Err(e) = conn.transition(ConnectionState::Connecting) {
                warn!(symbol = %instrument, error = %e, "rejected connection transition");
            }
        }

        match conn.transition(to) {
            Ok(from) => debug!(symbol = %instrument, ?from, ?to, "connection state"),
            Err(e) => warn!(symbol = %instrument, error = %e, "rejected connection transition"),
        }
    }

    /// Replace the alert threshold and re-arm every instrument's alerts.
    /// Invalid values leave the current threshold in place.
    pub fn set_threshold(&self, value: i64) -> Result<ClusterThreshold, ConfigError> {
        let threshold = ClusterThreshold::new(value).inspect_err(|e| {
            warn!(error = %e, "threshold rejected");
        })?;

        // Lock order is pipeline, then threshold, as in ingest_tick. Holding
        // every pipeline makes the swap and the re-arm one step for ingestion.
        let pipelines = self.pipelines.read();
        let mut locked: Vec<_> = pipelines.values().map(|p| p.lock()).collect();
        *self.threshold.write() = threshold;
        for p in &mut locked {
            p.reset_fired();
        }
        drop(locked);
        drop(pipelines);

        info!(threshold = threshold.get(), "threshold updated");
        Ok(threshold)
    }

    pub fn threshold(&self) -> ClusterThreshold {
        *self.threshold.read()
    }

    /// Receive every alert fired from now on.
    pub fn subscribe_alerts(&self) -> Receiver<AlertRecord> {
        let (tx, rx) = mpsc::channel(self.config.alert_subscriber_capacity);
        self.subscribers.lock().push(tx);
        rx
    }

    fn pipeline(&self, instrument: &Instrument) -> Option<Arc<Mutex<InstrumentPipeline>>> {
        self.pipelines.read().get(instrument).cloned()
    }

    /// Recent digits, oldest first.
    pub fn history(&self, instrument: &Instrument) -> Option<Vec<Digit>> {
        self.pipeline(instrument).map(|p| p.lock().history().snapshot())
    }

    pub fn cluster_spans(&self, instrument: &Instrument) -> Option<Vec<ClusterSpan>> {
        self.pipeline(instrument).map(|p| p.lock().cluster_spans())
    }

    pub fn stats(&self) -> BTreeMap<usize, u64> {
        self.stats.lock().snapshot()
    }

    /// Fired alerts, oldest first.
    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.alert_log.lock().iter().cloned().collect()
    }

    pub fn connection_state(&self, instrument: &Instrument) -> ConnectionState {
        self.connections
            .lock()
            .get(instrument)
            .map(ConnectionTracker::state)
            .unwrap_or_default()
    }

    pub fn instruments(&self) -> Vec<Instrument> {
        let mut out: Vec<_> = self.pipelines.read().keys().cloned().collect();
        out.sort();
        out
    }

    pub fn status(&self, instrument: &Instrument) -> Option<InstrumentStatus> {
        let pipeline = self.pipeline(instrument)?;
        let connection = self.connection_state(instrument);

        let p = pipeline.lock();
        let tracker = p.tracker();
        Some(InstrumentStatus {
            instrument: instrument.clone(),
            connection,
            history: p.history().snapshot(),
            spans: p.cluster_spans(),
            open_streak: tracker.open_streak(),
            ticks_observed: tracker.observed(),
            last_epoch: p.last_epoch(),
            completed: tracker
                .states()
                .iter()
                .filter(|(_, s)| s.completed_count() > 0)
                .map(|(d, s)| (*d, s.completed_count()))
                .collect(),
        })
    }

    /// Ticks discarded because they were malformed or misrouted.
    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks.load(Ordering::Relaxed)
    }
}
