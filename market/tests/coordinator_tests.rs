use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use corelib::{ConnectionState, Digit, FeedEvent, Instrument, Tick};
use engine::ConfigError;
use market::{
    announce::AnnouncementSink,
    coordinator::StreamCoordinator,
    feed::{SimulatedFeed, TickFeed},
    types::CoordinatorConfig,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Replays a fixed script, then idles until the receiver goes away.
struct ScriptedFeed {
    script: Vec<FeedEvent>,
    calls: AtomicUsize,
}

impl ScriptedFeed {
    fn new(script: Vec<FeedEvent>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl TickFeed for ScriptedFeed {
    async fn tick_stream(
        &self,
        _instrument: Instrument,
        sender: mpsc::Sender<FeedEvent>,
    ) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for ev in self.script.iter().cloned() {
            sender.send(ev).await?;
        }
        sender.closed().await;
        Ok(())
    }

    fn name(&self) -> String {
        "scripted".into()
    }
}

/// Hands the raw sender back to the test.
#[derive(Default)]
struct ManualFeed {
    senders: Mutex<Vec<mpsc::Sender<FeedEvent>>>,
}

#[async_trait::async_trait]
impl TickFeed for ManualFeed {
    async fn tick_stream(
        &self,
        _instrument: Instrument,
        sender: mpsc::Sender<FeedEvent>,
    ) -> anyhow::Result<()> {
        self.senders.lock().push(sender.clone());
        sender.closed().await;
        Ok(())
    }

    fn name(&self) -> String {
        "manual".into()
    }
}

/// Replays a script and returns.
struct FiniteFeed {
    script: Vec<FeedEvent>,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl TickFeed for FiniteFeed {
    async fn tick_stream(
        &self,
        _instrument: Instrument,
        sender: mpsc::Sender<FeedEvent>,
    ) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for ev in self.script.iter().cloned() {
            sender.send(ev).await?;
        }
        Ok(())
    }

    fn name(&self) -> String {
        "finite".into()
    }
}

/// Gives up on every attempt, the way a rejected handshake does.
#[derive(Default)]
struct FailingFeed {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl TickFeed for FailingFeed {
    async fn tick_stream(
        &self,
        _instrument: Instrument,
        _sender: mpsc::Sender<FeedEvent>,
    ) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("handshake rejected")
    }

    fn name(&self) -> String {
        "failing".into()
    }
}

#[derive(Default)]
struct RecordingAnnouncer {
    messages: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl AnnouncementSink for RecordingAnnouncer {
    async fn announce(&self, message: &str) -> anyhow::Result<()> {
        self.messages.lock().push(message.to_string());
        Ok(())
    }
}

fn r100() -> Instrument {
    Instrument::new("R_100")
}

/// Tick whose printed quote ends in `digit`.
fn tick(instrument: &Instrument, digit: u8) -> FeedEvent {
    let quote = 100.0 + digit as f64 / 100.0;
    FeedEvent::Tick(Tick::new(instrument.clone(), quote).with_pip_size(2))
}

fn digits(values: &[u8]) -> Vec<Digit> {
    values.iter().map(|&v| Digit::new(v).unwrap()).collect()
}

fn coordinator<F: TickFeed>(
    feed: Arc<F>,
    announcer: Arc<RecordingAnnouncer>,
) -> Arc<StreamCoordinator<F>> {
    StreamCoordinator::new(feed, announcer, CoordinatorConfig::default()).unwrap()
}

fn offline() -> Arc<StreamCoordinator<SimulatedFeed>> {
    coordinator(
        Arc::new(SimulatedFeed::default()),
        Arc::new(RecordingAnnouncer::default()),
    )
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[test]
fn third_cluster_raises_one_alert() {
    let c = offline();
    let inst = r100();
    c.register(&inst).unwrap();

    for d in [4, 4, 1, 4, 4, 2, 4, 4, 5] {
        c.handle_event(&inst, tick(&inst, d));
    }

    let alerts = c.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].digit, Digit::new(4).unwrap());
    assert_eq!(alerts[0].cluster_count, 3);
    assert_eq!(alerts[0].chain, vec![2, 2, 2]);
    assert_eq!(alerts[0].threshold, 3);

    let stats = c.stats();
    assert_eq!(stats.get(&1), Some(&1));
    assert_eq!(stats.get(&2), Some(&1));
    assert_eq!(stats.get(&3), Some(&1));

    assert_eq!(
        c.history(&inst).unwrap(),
        digits(&[4, 4, 1, 4, 4, 2, 4, 4, 5])
    );
}

#[test]
fn fired_digit_stays_silent_until_threshold_changes() {
    let c = offline();
    let inst = r100();
    c.register(&inst).unwrap();

    let run = [7, 7, 0];
    for _ in 0..5 {
        for d in run {
            c.handle_event(&inst, tick(&inst, d));
        }
    }
    assert_eq!(c.alerts().len(), 1);

    c.set_threshold(3).unwrap();
    for d in run {
        c.handle_event(&inst, tick(&inst, d));
    }

    let alerts = c.alerts();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[1].cluster_count, 6);
}

#[test]
fn invalid_threshold_keeps_previous_value() {
    let c = offline();
    c.set_threshold(5).unwrap();

    assert_eq!(c.set_threshold(1), Err(ConfigError::InvalidThreshold(1)));
    assert_eq!(c.set_threshold(-3), Err(ConfigError::InvalidThreshold(-3)));
    assert_eq!(c.threshold().get(), 5);
}

#[test]
fn malformed_and_misrouted_ticks_are_dropped() {
    let c = offline();
    let inst = r100();
    c.register(&inst).unwrap();

    c.handle_event(&inst, tick(&inst, 3));
    c.handle_event(&inst, FeedEvent::Tick(Tick::new(inst.clone(), f64::NAN)));
    c.handle_event(&inst, FeedEvent::Tick(Tick::new(inst.clone(), f64::INFINITY)));
    c.handle_event(&inst, tick(&Instrument::new("R_10"), 3));

    assert_eq!(c.history(&inst).unwrap(), digits(&[3]));
    assert!(c.cluster_spans(&inst).unwrap().is_empty());
    assert_eq!(c.dropped_ticks(), 3);
}

#[test]
fn ticks_for_unknown_instrument_are_dropped() {
    let c = offline();
    let inst = Instrument::new("R_50");

    c.handle_event(&inst, tick(&inst, 1));

    assert!(c.history(&inst).is_none());
    assert!(c.instruments().is_empty());
    assert_eq!(c.dropped_ticks(), 1);
}

#[test]
fn instruments_are_independent() {
    let c = offline();
    let a = Instrument::new("R_10");
    let b = Instrument::new("R_25");
    c.register(&a).unwrap();
    c.register(&b).unwrap();

    // interleaved: each instrument sees its own adjacency only
    let seq_a = [2, 2, 8, 8, 3, 2, 2, 0];
    let seq_b = [2, 9, 9, 2, 2, 0, 5, 5];
    for (da, db) in seq_a.into_iter().zip(seq_b) {
        c.handle_event(&a, tick(&a, da));
        c.handle_event(&b, tick(&b, db));
    }

    assert_eq!(c.cluster_spans(&a).unwrap().len(), 3);
    let spans_b = c.cluster_spans(&b).unwrap();
    assert_eq!(spans_b.len(), 3);
    assert!(spans_b[2].open);

    let d = |v: u8| Digit::new(v).unwrap();
    let status_a = c.status(&a).unwrap();
    assert_eq!(status_a.completed, vec![(d(2), 2), (d(8), 1)]);
    let status_b = c.status(&b).unwrap();
    assert_eq!(status_b.ticks_observed, 8);
    assert_eq!(status_b.completed, vec![(d(2), 1), (d(9), 1)]);

    // statistics are shared: a adds 1, 1, 2 and b adds 1, 1
    let stats = c.stats();
    assert_eq!(stats.get(&1), Some(&4));
    assert_eq!(stats.get(&2), Some(&1));
    assert_eq!(stats.len(), 2);

    assert!(c.alerts().is_empty());
    assert_eq!(c.instruments(), vec![a, b]);
}

#[test]
fn status_reports_newest_feed_epoch() {
    let c = offline();
    let inst = r100();
    c.register(&inst).unwrap();
    assert_eq!(c.status(&inst).unwrap().last_epoch, None);

    let stamped = |digit: u8, epoch: i64| {
        let quote = 100.0 + digit as f64 / 100.0;
        FeedEvent::Tick(
            Tick::new(inst.clone(), quote)
                .with_pip_size(2)
                .with_epoch(epoch),
        )
    };
    c.handle_event(&inst, stamped(4, 1_700_000_000));
    c.handle_event(&inst, stamped(5, 1_700_000_002));
    c.handle_event(&inst, tick(&inst, 6));

    let status = c.status(&inst).unwrap();
    assert_eq!(status.ticks_observed, 3);
    assert_eq!(status.last_epoch, Some(1_700_000_002));
}

#[test]
fn threshold_changes_during_ingestion_rearm_once_each() {
    let mut config = CoordinatorConfig::default();
    config.engine.alert_log_capacity = 10_000;
    let c = StreamCoordinator::new(
        Arc::new(SimulatedFeed::default()),
        Arc::new(RecordingAnnouncer::default()),
        config,
    )
    .unwrap();
    let inst = r100();
    c.register(&inst).unwrap();

    const ROUNDS: usize = 2_000;
    const CHANGES: usize = 200;

    std::thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..ROUNDS {
                for d in [4, 4, 1] {
                    c.handle_event(&inst, tick(&inst, d));
                }
            }
        });
        s.spawn(|| {
            for i in 0..CHANGES {
                c.set_threshold(if i % 2 == 0 { 4 } else { 3 }).unwrap();
                std::thread::yield_now();
            }
        });
    });

    // Digit 4 is the only one completing clusters. Each re-arm allows one
    // alert and the initial arm one more.
    let alerts = c.alerts();
    assert!(!alerts.is_empty());
    assert!(alerts.len() <= CHANGES + 1, "{} alerts", alerts.len());
    assert!(alerts.iter().all(|a| a.cluster_count >= 3));

    c.set_threshold(3).unwrap();
    for d in [4, 4, 1] {
        c.handle_event(&inst, tick(&inst, d));
    }
    let after = c.alerts();
    assert_eq!(after.len(), alerts.len() + 1);
    assert_eq!(after.last().unwrap().cluster_count, ROUNDS + 1);
}

#[test]
fn disconnect_keeps_history() {
    let c = offline();
    let inst = r100();
    c.register(&inst).unwrap();

    c.handle_event(&inst, FeedEvent::Opened);
    assert_eq!(c.connection_state(&inst), ConnectionState::Connected);

    c.handle_event(&inst, tick(&inst, 6));
    c.handle_event(&inst, tick(&inst, 6));
    c.handle_event(
        &inst,
        FeedEvent::Closed {
            reason: "server going away".into(),
        },
    );
    assert_eq!(c.connection_state(&inst), ConnectionState::Disconnected);
    assert_eq!(c.history(&inst).unwrap(), digits(&[6, 6]));

    // reconnect continues the open run
    c.handle_event(&inst, FeedEvent::Opened);
    c.handle_event(&inst, tick(&inst, 6));
    c.handle_event(&inst, tick(&inst, 1));

    let status = c.status(&inst).unwrap();
    assert_eq!(status.connection, ConnectionState::Connected);
    assert_eq!(status.completed, vec![(Digit::new(6).unwrap(), 1)]);
    assert_eq!(c.stats().get(&1), Some(&1));
}

#[test]
fn alert_log_is_bounded() {
    let mut config = CoordinatorConfig::default();
    config.engine.alert_log_capacity = 2;
    config.engine.cluster_threshold = engine::ClusterThreshold::new(2).unwrap();
    let c = StreamCoordinator::new(
        Arc::new(SimulatedFeed::default()),
        Arc::new(RecordingAnnouncer::default()),
        config,
    )
    .unwrap();

    let inst = r100();
    c.register(&inst).unwrap();
    for d in [1, 2, 3] {
        for v in [d, d, 0, d, d, 0] {
            c.handle_event(&inst, tick(&inst, v));
        }
    }

    let alerts = c.alerts();
    let fired: Vec<_> = alerts.iter().map(|a| a.digit.value()).collect();
    assert_eq!(fired, vec![2, 3]);
}

#[test]
fn rejects_zero_capacity_config() {
    let mut config = CoordinatorConfig::default();
    config.engine.history_capacity = 0;

    let res = StreamCoordinator::new(
        Arc::new(SimulatedFeed::default()),
        Arc::new(RecordingAnnouncer::default()),
        config,
    );
    assert!(matches!(res, Err(ConfigError::InvalidCapacity)));
}

#[tokio::test]
async fn subscribed_feed_delivers_alerts_and_announcements() {
    let inst = r100();
    let mut script = vec![FeedEvent::Opened];
    for d in [5, 5, 1, 5, 5, 1, 5, 5, 1] {
        script.push(tick(&inst, d));
    }

    let feed = ScriptedFeed::new(script);
    let announcer = Arc::new(RecordingAnnouncer::default());
    let c = coordinator(Arc::clone(&feed), Arc::clone(&announcer));
    let mut alerts = c.subscribe_alerts();

    c.subscribe(inst.clone()).await.unwrap();

    let alert = tokio::time::timeout(Duration::from_secs(5), alerts.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert.instrument, inst);
    assert_eq!(alert.digit, Digit::new(5).unwrap());
    assert_eq!(alert.chain_label(), "2 → 2 → 2");

    eventually(|| !announcer.messages.lock().is_empty()).await;
    assert_eq!(
        announcer.messages.lock()[0],
        "Sniper alert on Volatility 100 Index. Digit 5 formed 3 clusters."
    );
    assert_eq!(c.connection_state(&inst), ConnectionState::Connected);

    c.shutdown();
}

#[tokio::test]
async fn subscribing_twice_starts_one_feed() {
    let feed = ScriptedFeed::new(vec![FeedEvent::Opened]);
    let c = coordinator(Arc::clone(&feed), Arc::new(RecordingAnnouncer::default()));

    c.subscribe(r100()).await.unwrap();
    c.subscribe(r100()).await.unwrap();

    eventually(|| feed.calls.load(Ordering::SeqCst) == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(feed.calls.load(Ordering::SeqCst), 1);

    c.shutdown();
}

#[tokio::test]
async fn unsubscribe_stops_ingestion_but_keeps_state() {
    let feed = Arc::new(ManualFeed::default());
    let c = coordinator(Arc::clone(&feed), Arc::new(RecordingAnnouncer::default()));
    let inst = r100();

    c.subscribe(inst.clone()).await.unwrap();
    assert_eq!(c.connection_state(&inst), ConnectionState::Connecting);

    eventually(|| !feed.senders.lock().is_empty()).await;
    let tx = feed.senders.lock()[0].clone();

    tx.send(FeedEvent::Opened).await.unwrap();
    tx.send(tick(&inst, 2)).await.unwrap();
    tx.send(tick(&inst, 2)).await.unwrap();
    eventually(|| c.history(&inst).map(|h| h.len()) == Some(2)).await;

    assert!(c.unsubscribe(&inst));
    assert!(!c.unsubscribe(&inst));
    assert_eq!(c.connection_state(&inst), ConnectionState::Disconnected);

    eventually(|| tx.is_closed()).await;
    assert!(tx.send(tick(&inst, 2)).await.is_err());
    assert_eq!(c.history(&inst).unwrap(), digits(&[2, 2]));
}

#[tokio::test]
async fn full_alert_subscriber_does_not_block_ingestion() {
    let mut config = CoordinatorConfig::default();
    config.alert_subscriber_capacity = 1;
    config.engine.cluster_threshold = engine::ClusterThreshold::new(2).unwrap();
    let c = StreamCoordinator::new(
        Arc::new(SimulatedFeed::default()),
        Arc::new(RecordingAnnouncer::default()),
        config,
    )
    .unwrap();

    let _slow = c.subscribe_alerts();
    let inst = r100();
    c.register(&inst).unwrap();

    for d in [1, 3] {
        for v in [d, d, 0, d, d, 0] {
            c.handle_event(&inst, tick(&inst, v));
        }
    }

    assert_eq!(c.alerts().len(), 2);
}

#[tokio::test]
async fn failed_feed_releases_instrument_for_resubscribe() {
    let feed = Arc::new(FailingFeed::default());
    let c = coordinator(Arc::clone(&feed), Arc::new(RecordingAnnouncer::default()));
    let inst = r100();

    c.subscribe(inst.clone()).await.unwrap();
    eventually(|| c.connection_state(&inst) == ConnectionState::Disconnected).await;
    assert_eq!(feed.calls.load(Ordering::SeqCst), 1);

    c.subscribe(inst.clone()).await.unwrap();
    eventually(|| feed.calls.load(Ordering::SeqCst) == 2).await;
    eventually(|| c.connection_state(&inst) == ConnectionState::Disconnected).await;

    // nothing left to stop
    assert!(!c.unsubscribe(&inst));
    assert!(c.history(&inst).unwrap().is_empty());
}

#[tokio::test]
async fn feed_that_ends_keeps_its_ticks() {
    let inst = r100();
    let script = vec![
        FeedEvent::Opened,
        tick(&inst, 5),
        tick(&inst, 5),
        FeedEvent::Closed {
            reason: "end of stream".into(),
        },
    ];
    let feed = Arc::new(FiniteFeed {
        script,
        calls: AtomicUsize::new(0),
    });
    let c = coordinator(Arc::clone(&feed), Arc::new(RecordingAnnouncer::default()));

    c.subscribe(inst.clone()).await.unwrap();
    eventually(|| c.history(&inst).map(|h| h.len()) == Some(2)).await;
    assert_eq!(c.connection_state(&inst), ConnectionState::Disconnected);

    // once the ended stream is released a fresh subscription starts the feed
    tokio::time::timeout(Duration::from_secs(5), async {
        while feed.calls.load(Ordering::SeqCst) < 2 {
            c.subscribe(inst.clone()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("feed not restarted");
    eventually(|| c.history(&inst).map(|h| h.len()) == Some(4)).await;
    assert_eq!(c.history(&inst).unwrap(), digits(&[5, 5, 5, 5]));
    assert!(c.status(&inst).unwrap().completed.is_empty());
}
