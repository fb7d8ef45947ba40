use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use collector_fleet::{
    client::HeartbeatClient,
    util::{get_collector_name, get_heartbeat_interval, get_hub_url},
};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Simulated collector: registers with the hub and heartbeats on an interval
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Collector name (defaults to FLEET_COLLECTOR_NAME)
    #[arg(short, long)]
    name: Option<String>,

    /// Hub base url (defaults to FLEET_HUB_URL)
    #[arg(long)]
    hub: Option<String>,

    /// Heartbeat interval in milliseconds (defaults to FLEET_HEARTBEAT_INTERVAL_MS or 15000)
    #[arg(short, long)]
    interval_ms: Option<u64>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("collector_fleet", LevelFilter::DEBUG),
        ("fleet_collector", LevelFilter::TRACE),
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

    let name = args
        .name
        .or_else(get_collector_name)
        .context("no collector name given (use --name or FLEET_COLLECTOR_NAME)")?;
    let hub = args.hub.unwrap_or_else(get_hub_url);
    let interval_ms = args
        .interval_ms
        .or_else(get_heartbeat_interval)
        .unwrap_or(15_000)
        .max(1);

    let client = HeartbeatClient::new(&hub, name, env!("CARGO_PKG_VERSION"))?;

    info!("collector {} reporting to {hub} every {interval_ms}ms", client.name());

    let mut ticker = interval(Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut registered = false;
    let mut assigned: Vec<String> = Vec::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }

        if !registered {
            match client.register().await {
                Ok(Some(collector)) => {
                    info!("registered as id={}", collector.id);
                    registered = true;
                }
                Ok(None) => {
                    error!("collector {} was deleted on the hub, exiting", client.name());
                    return Ok(());
                }
                Err(e) => {
                    error!("registration failed: {e:#}");
                    continue;
                }
            }
        }

        match client.heartbeat(None).await {
            Ok(Some(response)) => {
                if response.generators != assigned {
                    info!("now running generators: {:?}", response.generators);
                    assigned = response.generators;
                } else {
                    debug!("heartbeat ok ({} generators)", assigned.len());
                }
            }
            Ok(None) => {
                warn!("hub does not know this collector, registering again");
                registered = false;
            }
            Err(e) => error!("heartbeat failed: {e:#}"),
        }
    }
}
