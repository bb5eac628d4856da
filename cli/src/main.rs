mod cli;
mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use common::{
    logger::{TraceId, init_logger, root_span},
    time::now_ms,
};
use corelib::AlertRecord;
use market::{
    announce::LogAnnouncer,
    coordinator::StreamCoordinator,
    feed::{DerivWsClient, SimulatedFeed, TickFeed},
    types::InstrumentStatus,
};
use tokio::sync::mpsc::Receiver;
use tracing::{Instrument as _, info};

use crate::{cli::Cli, config::AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = AppConfig::from_env()?;
    cli.apply(&mut cfg)?;

    init_logger("digit-sniper", cfg.json_logs);

    let trace_id = TraceId::default();
    let span = root_span("digit-sniper", &trace_id);
    span.record("threshold", cfg.cluster_threshold.get());

    async move {
        if cli.simulate {
            run(Arc::new(SimulatedFeed::default()), &cfg, cli.status_secs).await
        } else {
            let feed = DerivWsClient::new(cfg.ws_url.clone())
                .with_ping_interval(cfg.ping_interval)
                .with_reconnect_delay(cfg.reconnect_delay);
            run(Arc::new(feed), &cfg, cli.status_secs).await
        }
    }
    .instrument(span)
    .await
}

#[tracing::instrument(skip_all, fields(feed = %feed.name()))]
async fn run<F: TickFeed>(feed: Arc<F>, cfg: &AppConfig, status_secs: u64) -> anyhow::Result<()> {
    let coordinator =
        StreamCoordinator::new(feed, Arc::new(LogAnnouncer), cfg.coordinator_config())?;

    tokio::spawn(print_alerts(coordinator.subscribe_alerts()).in_current_span());

    for instrument in &cfg.instruments {
        coordinator.subscribe(instrument.clone()).await?;
    }
    info!(
        instruments = cfg.instruments.len(),
        threshold = cfg.cluster_threshold.get(),
        history = cfg.history_capacity,
        "digit sniper running"
    );

    if status_secs > 0 {
        let c = Arc::clone(&coordinator);
        let started = now_ms();
        tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(status_secs));
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    print_status(&c, now_ms().saturating_sub(started));
                }
            }
            .in_current_span(),
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    coordinator.shutdown();

    Ok(())
}

async fn print_alerts(mut alerts: Receiver<AlertRecord>) {
    while let Some(a) = alerts.recv().await {
        println!(
            "[{}] SNIPER {}  digit {}  clusters {}  chain {}",
            a.timestamp.format("%H:%M:%S"),
            a.instrument.display_name(),
            a.digit,
            a.cluster_count,
            a.chain_label()
        );
    }
}

fn print_status<F>(c: &StreamCoordinator<F>, uptime_ms: u64) {
    println!("--- status after {}s, threshold {} ---", uptime_ms / 1000, c.threshold().get());

    for instrument in c.instruments() {
        if let Some(status) = c.status(&instrument) {
            println!("{}", status_line(&status));
        }
    }

    let stats = c.stats();
    if !stats.is_empty() {
        let table: Vec<String> = stats.iter().map(|(n, count)| format!("{n}:{count}")).collect();
        println!("cluster counts reached: {}", table.join(" "));
    }
    println!(
        "alerts {}  dropped ticks {}",
        c.alerts().len(),
        c.dropped_ticks()
    );
}

/// One line per instrument; runs inside the history are bracketed.
fn status_line(s: &InstrumentStatus) -> String {
    let mut digits = String::new();
    for (i, d) in s.history.iter().enumerate() {
        if s.spans.iter().any(|sp| sp.start == i) {
            digits.push('[');
        }
        digits.push_str(&d.to_string());
        if s.spans.iter().any(|sp| sp.end == i) {
            digits.push(']');
        }
    }

    let completed: Vec<String> = s
        .completed
        .iter()
        .map(|(d, n)| format!("{d}x{n}"))
        .collect();

    let mut line = format!(
        "{:<26} {:<12} {:<40} {}",
        s.instrument.display_name(),
        format!("{:?}", s.connection),
        digits,
        completed.join(" ")
    );
    if let Some(epoch) = s.last_epoch {
        line.push_str(&format!(" (last tick @{epoch})"));
    }
    line
}
