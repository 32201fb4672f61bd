//! vigil-probe — HTTP health probes for vigil.
//!
//! A probe is one GET against a service's health URL with a connect
//! timeout and a read timeout. Any 2xx response is UP; a non-2xx
//! response, a connection failure, or a timeout is DOWN. Probes never
//! retry and never return an error: the next tick is the retry.
//!
//! # Architecture
//!
//! ```text
//! Prober (trait, object-safe)
//!   └── HttpProber
//!       ├── reqwest::Client (connect + read timeouts)
//!       └── probe(url) → ProbeResult → ServiceStatus
//! ```

pub mod checker;

pub use checker::{BoxFuture, HttpProber, ProbeConfig, ProbeResult, Prober};
