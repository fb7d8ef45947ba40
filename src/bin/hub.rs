use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use collector_fleet::{
    FleetCoordinator,
    actors::{SweepEvent, SweeperHandle},
    config::{Config, read_config_file},
    storage::open_store,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); built-in defaults are used when omitted
    #[arg(short, long)]
    file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("collector_fleet", LevelFilter::DEBUG),
        ("fleet_hub", LevelFilter::TRACE),
        ("tower_http", LevelFilter::INFO),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let mut config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    debug!(
        "heartbeat: {:?}, assignment: {:?}",
        config.heartbeat, config.assignment
    );

    let store = open_store(config.storage.as_ref())
        .await
        .context("failed to open fleet store")?;

    let coordinator = Arc::new(FleetCoordinator::new(store.clone(), config.heartbeat));
    coordinator
        .restore()
        .await
        .context("failed to restore fleet state")?;

    let policy = config.assignment.switch();
    let (event_tx, event_rx) = broadcast::channel(64);

    let sweeper = SweeperHandle::spawn(
        coordinator.clone(),
        policy.clone(),
        Duration::from_millis(config.heartbeat.interval_ms),
        event_tx,
    );
    tokio::spawn(log_sweep_events(event_rx));

    #[cfg(feature = "api")]
    {
        use collector_fleet::api::{ApiState, spawn_api_server};

        let state = ApiState::new(coordinator.clone(), sweeper.clone(), policy.clone());
        let addr = spawn_api_server(config.api.clone(), state).await?;
        info!("hub API available at http://{addr}/api/v1");
    }

    info!(
        "fleet hub running (heartbeat {}ms + {}ms tolerance, load balancing {})",
        config.heartbeat.interval_ms,
        config.heartbeat.tolerance_ms,
        policy.is_load_balancing()
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    info!("shutting down");
    sweeper.shutdown().await?;
    store.close().await?;

    Ok(())
}

async fn log_sweep_events(mut events: broadcast::Receiver<SweepEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                for moved in &event.report.reassigned {
                    info!(
                        "{}: {:?} -> {:?}",
                        moved.generator, moved.from, moved.to
                    );
                }
                for failure in &event.report.failures {
                    warn!("{}: reassignment not persisted: {}", failure.generator, failure.error);
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!("sweep log lagged, skipped {skipped} events"),
            Err(RecvError::Closed) => break,
        }
    }
}
