//! Tick loop and per-tick fan-out.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use vigil_escalation::{Escalator, TickOutcome};
use vigil_state::MonitorStore;

use crate::error::SchedulerResult;
use crate::inflight::InflightSet;

/// Period between polling ticks.
pub const TICK_PERIOD: Duration = Duration::from_secs(30);

/// Services evaluated concurrently within one tick.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Per-tick tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Services listed at the start of the tick.
    pub services: usize,
    /// Services probed.
    pub evaluated: usize,
    pub paused: usize,
    pub not_due: usize,
    /// Services skipped because a previous evaluation is still running.
    pub skipped: usize,
    pub failed: usize,
    pub opened: usize,
    pub escalated: usize,
    pub resolved: usize,
}

impl TickReport {
    fn record(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Paused => self.paused += 1,
            TickOutcome::NotDue => self.not_due += 1,
            TickOutcome::Vanished => {}
            TickOutcome::Healthy
            | TickOutcome::StillDown { .. }
            | TickOutcome::Acknowledged { .. } => self.evaluated += 1,
            TickOutcome::Opened { .. } => {
                self.evaluated += 1;
                self.opened += 1;
            }
            TickOutcome::Escalated { .. } => {
                self.evaluated += 1;
                self.escalated += 1;
            }
            TickOutcome::Resolved { .. } => {
                self.evaluated += 1;
                self.resolved += 1;
            }
        }
    }
}

/// Runs the escalation engine over every service on a fixed period.
pub struct Scheduler {
    store: Arc<dyn MonitorStore>,
    escalator: Arc<Escalator>,
    inflight: InflightSet,
    limiter: Arc<Semaphore>,
    period: Duration,
}

impl Scheduler {
    pub fn new(store: Arc<dyn MonitorStore>, escalator: Escalator) -> Self {
        Self {
            store,
            escalator: Arc::new(escalator),
            inflight: InflightSet::new(),
            limiter: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
            period: TICK_PERIOD,
        }
    }

    /// Bound the number of services evaluated at once (minimum 1).
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn escalator(&self) -> &Escalator {
        &self.escalator
    }

    pub fn inflight(&self) -> &InflightSet {
        &self.inflight
    }

    /// Run one tick at the current wall-clock time.
    pub async fn run_tick(&self) -> SchedulerResult<TickReport> {
        self.run_tick_at(now_secs()).await
    }

    /// Run one tick as of `now` (Unix seconds).
    ///
    /// Fails only if the service list cannot be read. Per-service errors
    /// and panics are logged with the service id and counted in
    /// [`TickReport::failed`].
    pub async fn run_tick_at(&self, now: u64) -> SchedulerResult<TickReport> {
        let services = self.store.list_services()?;
        let mut report = TickReport {
            services: services.len(),
            ..TickReport::default()
        };

        let mut tasks = JoinSet::new();
        for service in services {
            let Some(guard) = self.inflight.try_acquire(&service.id) else {
                debug!(service_id = %service.id, "evaluation still in flight, skipping");
                report.skipped += 1;
                continue;
            };
            let escalator = self.escalator.clone();
            let limiter = self.limiter.clone();

            tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await.ok();
                let service_id = guard.service_id().to_string();
                // Inner task so a panic surfaces as a JoinError we can attribute.
                let worker = tokio::spawn({
                    let service_id = service_id.clone();
                    async move { escalator.evaluate(&service_id, now).await }
                });
                let joined = worker.await;
                drop(guard);
                (service_id, joined)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Ok(outcome)))) => report.record(&outcome),
                Ok((service_id, Ok(Err(e)))) => {
                    error!(%service_id, error = %e, "service evaluation failed");
                    report.failed += 1;
                }
                Ok((service_id, Err(e))) => {
                    error!(%service_id, error = %e, "service evaluation panicked");
                    report.failed += 1;
                }
                Err(e) => {
                    error!(error = %e, "tick worker aborted");
                    report.failed += 1;
                }
            }
        }

        info!(
            services = report.services,
            evaluated = report.evaluated,
            opened = report.opened,
            escalated = report.escalated,
            resolved = report.resolved,
            skipped = report.skipped,
            failed = report.failed,
            "tick complete"
        );
        Ok(report)
    }

    /// Tick every period until `shutdown` changes. The first tick fires
    /// immediately; ticks missed while one is running are dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(period_secs = self.period.as_secs(), "scheduler started");

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_tick().await {
                        error!(error = %e, "scheduler tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }
}

/// Current Unix time in seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
