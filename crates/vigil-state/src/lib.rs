//! vigil-state — embedded state store for vigil.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for monitored services, contacts, and incidents.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! An `active_incidents` index (`service_id → incident_id`) backs the
//! single-active-incident invariant: creating an incident checks and writes
//! the index inside one write transaction.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. Consumers that only need the
//! monitoring operations depend on the [`MonitorStore`] trait instead.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{MonitorStore, StateStore};
pub use types::*;
