//! vigil-scheduler — drives the escalation engine on a fixed period.
//!
//! Every [`TICK_PERIOD`] the scheduler lists all monitored services and
//! evaluates each one through the [`Escalator`](vigil_escalation::Escalator)
//! with bounded parallelism. A service that is still being evaluated when
//! the next tick (or a manual tick) arrives is skipped, so one service's
//! read-decide-write sequence never overlaps itself. Errors and panics in
//! one service's evaluation are logged and counted, never propagated.

pub mod error;
pub mod inflight;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use inflight::{InflightGuard, InflightSet};
pub use scheduler::{DEFAULT_MAX_CONCURRENCY, Scheduler, TICK_PERIOD, TickReport, now_secs};
