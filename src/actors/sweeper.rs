//! SweeperActor - the fleet's clock
//!
//! Runs [`FleetCoordinator::sweep`] on a fixed interval and on demand.
//!
//! ```text
//! Timer tick ─┐
//!             ├─► read PolicySwitch ─► coordinator.sweep(now, policy) ─► SweepEvent ─► [API, logs, ...]
//! SweepNow ───┘
//!     ↑
//!     └─── Commands (SweepNow, SetLoadBalancing, UpdateInterval, GetStats, Shutdown)
//! ```
//!
//! The first periodic sweep happens one full interval after spawning, which
//! gives collectors time to check in after a hub restart.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, instrument, trace, warn};

use crate::fleet::{FleetCoordinator, PolicySwitch, SweepReport};
use crate::util;

use super::messages::{SweepEvent, SweeperCommand, SweeperStats};

/// Smallest accepted sweep interval
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Milliseconds in `duration`, saturating at `u64::MAX`
fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub struct SweeperActor {
    coordinator: Arc<FleetCoordinator>,

    /// Shared with the API; read once at the start of every sweep
    policy: PolicySwitch,

    command_rx: mpsc::Receiver<SweeperCommand>,

    event_tx: broadcast::Sender<SweepEvent>,

    interval_duration: Duration,

    stats: SweeperStats,
}

impl SweeperActor {
    pub fn new(
        coordinator: Arc<FleetCoordinator>,
        policy: PolicySwitch,
        interval_duration: Duration,
        command_rx: mpsc::Receiver<SweeperCommand>,
        event_tx: broadcast::Sender<SweepEvent>,
    ) -> Self {
        let interval_duration = interval_duration.max(MIN_INTERVAL);

        Self {
            coordinator,
            policy,
            command_rx,
            event_tx,
            interval_duration,
            stats: SweeperStats {
                interval_ms: whole_millis(interval_duration),
                ..SweeperStats::default()
            },
        }
    }

    fn ticker(&self) -> Interval {
        let mut ticker = interval_at(Instant::now() + self.interval_duration, self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    #[instrument(skip(self), fields(interval_ms = self.stats.interval_ms))]
    pub async fn run(mut self) {
        info!("starting sweeper");

        let mut ticker = self.ticker();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SweeperCommand::SweepNow { respond_to } => {
                            debug!("received SweepNow command");
                            let report = self.sweep().await;
                            let _ = respond_to.send(report);
                        }

                        SweeperCommand::SetLoadBalancing { enabled } => {
                            info!("load balancing {}", if enabled { "enabled" } else { "disabled" });
                            self.policy.set_load_balancing(enabled);
                        }

                        SweeperCommand::UpdateInterval { interval_ms } => {
                            self.interval_duration = Duration::from_millis(interval_ms).max(MIN_INTERVAL);
                            self.stats.interval_ms = whole_millis(self.interval_duration);
                            debug!("sweep interval set to {}ms", self.stats.interval_ms);
                            ticker = self.ticker();
                        }

                        SweeperCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats.clone());
                        }

                        SweeperCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        info!("sweeper stopped after {} sweeps", self.stats.sweeps);
    }

    async fn sweep(&mut self) -> SweepReport {
        let load_balancing = self.policy.is_load_balancing();
        let policy = self.policy.current();
        let now = util::now_millis();

        let report = self.coordinator.sweep(now, policy).await;

        self.stats.sweeps += 1;
        self.stats.missed += report.missed.len() as u64;
        self.stats.reassigned += report.reassigned.len() as u64;
        self.stats.failures += report.failures.len() as u64;
        self.stats.last_sweep = Some(now);

        let event = SweepEvent {
            report: report.clone(),
            load_balancing,
        };
        match self.event_tx.send(event) {
            Ok(receivers) => trace!("published sweep event to {receivers} receivers"),
            Err(_) => trace!("no receivers for sweep event"),
        }

        report
    }
}

/// Handle for controlling a SweeperActor
///
/// Cheap to clone; all clones talk to the same actor.
#[derive(Clone)]
pub struct SweeperHandle {
    sender: mpsc::Sender<SweeperCommand>,
}

impl SweeperHandle {
    /// Spawn the sweeper as a tokio task
    pub fn spawn(
        coordinator: Arc<FleetCoordinator>,
        policy: PolicySwitch,
        interval: Duration,
        event_tx: broadcast::Sender<SweepEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SweeperActor::new(coordinator, policy, interval, cmd_rx, event_tx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run a sweep now and wait for its report
    pub async fn sweep_now(&self) -> Result<SweepReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SweeperCommand::SweepNow { respond_to: tx })
            .await
            .context("failed to send SweepNow command")?;

        rx.await.context("failed to receive sweep report")
    }

    pub async fn set_load_balancing(&self, enabled: bool) -> Result<()> {
        self.sender
            .send(SweeperCommand::SetLoadBalancing { enabled })
            .await
            .context("failed to send SetLoadBalancing command")?;
        Ok(())
    }

    pub async fn update_interval(&self, interval_ms: u64) -> Result<()> {
        self.sender
            .send(SweeperCommand::UpdateInterval { interval_ms })
            .await
            .context("failed to send UpdateInterval command")?;
        Ok(())
    }

    pub async fn get_stats(&self) -> Result<SweeperStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SweeperCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive sweeper stats")
    }

    /// Gracefully shut down the sweeper
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SweeperCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
