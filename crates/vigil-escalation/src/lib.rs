//! vigil-escalation — the incident state machine.
//!
//! For each service on each tick the engine probes the health URL,
//! records the verdict, and then opens, escalates, or resolves the
//! service's active incident, dispatching the matching notification.
//!
//! # States
//!
//! ```text
//! HEALTHY ──DOWN──▶ OPEN_L1 ──≥10m──▶ OPEN_L2 ──≥15m──▶ OPEN_L3
//!    ▲                 │                 │                 │
//!    └──────UP─────────┴─────────────────┴─────────────────┘
//! ```
//!
//! A service inside its maintenance window is skipped entirely: no probe,
//! no state change, no notification.
//!
//! Incident state is always persisted before notifications go out, so a
//! failing mail or voice provider can never lose an escalation.

pub mod engine;
pub mod error;
pub mod policy;

pub use engine::{Escalator, TickOutcome};
pub use error::{EngineError, EngineResult};
pub use policy::{Decision, EscalationStep, IncidentState, decide};
