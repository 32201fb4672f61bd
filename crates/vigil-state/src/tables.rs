//! redb table definitions for the vigil state store.
//!
//! Record tables use `&str` keys and `&[u8]` values (JSON-serialized domain types).
//! Incident keys are zero-padded ids so iteration order matches creation order.

use redb::TableDefinition;

/// Monitored services keyed by `{service_id}`.
pub const SERVICES: TableDefinition<&str, &[u8]> = TableDefinition::new("services");

/// Contacts keyed by `{contact_id}`.
pub const CONTACTS: TableDefinition<&str, &[u8]> = TableDefinition::new("contacts");

/// Incidents keyed by `{incident_id:020}`.
pub const INCIDENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("incidents");

/// Active (unacknowledged) incident per service: `{service_id}` → incident id.
pub const ACTIVE_INCIDENTS: TableDefinition<&str, u64> = TableDefinition::new("active_incidents");

/// Monotonic id sequences keyed by sequence name.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Sequence name used for incident ids.
pub const INCIDENT_SEQ: &str = "incident";

/// Shape shared by all JSON record tables.
pub type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;
