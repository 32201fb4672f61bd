//! Domain types for the vigil state store.
//!
//! These types represent the persisted state of monitored services, the
//! people contacted about them, and the incidents raised against them.
//! All types are serializable to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};

/// Unique identifier for a monitored service.
pub type ServiceId = String;

/// Unique identifier for a contact.
pub type ContactId = String;

/// Unique identifier for an incident (monotonic per store).
pub type IncidentId = u64;

// ── Service ────────────────────────────────────────────────────────

/// A service whose health endpoint is probed on every tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoredService {
    pub id: ServiceId,
    /// Display name used in notifications.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// URL probed with a bounded-timeout GET.
    pub health_url: String,
    /// Minimum minutes between probes. `None` probes on every tick.
    #[serde(default)]
    pub check_interval_minutes: Option<u32>,
    /// Unix timestamp until which probing and alerting are suppressed.
    #[serde(default)]
    pub paused_until: Option<u64>,
    #[serde(default)]
    pub pause_reason: Option<String>,
    #[serde(default)]
    pub last_status: ServiceStatus,
    /// Unix timestamp of the last recorded probe.
    #[serde(default)]
    pub last_checked_at: Option<u64>,
    /// Who gets contacted, by contact id.
    #[serde(default)]
    pub recipients: RecipientIds,
}

/// Last probe verdict recorded for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    #[default]
    Unknown,
    Up,
    Down,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => f.write_str("UNKNOWN"),
            Self::Up => f.write_str("UP"),
            Self::Down => f.write_str("DOWN"),
        }
    }
}

/// Recipient references held by a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RecipientIds {
    /// Ordered, duplicate-free list of developer contacts.
    #[serde(default)]
    pub developers: Vec<ContactId>,
    #[serde(default)]
    pub lead: Option<ContactId>,
    #[serde(default)]
    pub head: Option<ContactId>,
}

impl MonitoredService {
    /// Whether a maintenance window is active at `now`.
    pub fn is_paused(&self, now: u64) -> bool {
        self.paused_until.is_some_and(|until| until > now)
    }

    /// Whether the service should be probed at `now`, honoring
    /// `check_interval_minutes`. `slack_secs` absorbs tick jitter.
    pub fn is_due(&self, now: u64, slack_secs: u64) -> bool {
        match (self.check_interval_minutes, self.last_checked_at) {
            (Some(minutes), Some(last)) => {
                let interval = u64::from(minutes) * 60;
                now.saturating_add(slack_secs) >= last.saturating_add(interval)
            }
            _ => true,
        }
    }
}

// ── Contact ────────────────────────────────────────────────────────

/// A person who can be emailed and, if a phone is set, called.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub id: ContactId,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Contact {
    /// The phone number, if present and non-blank.
    pub fn voice_number(&self) -> Option<&str> {
        self.phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// Fully resolved recipients for a service.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Recipients {
    pub developers: Vec<Contact>,
    pub lead: Option<Contact>,
    pub head: Option<Contact>,
}

/// A service together with its resolved recipients, read fresh before dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceWithRecipients {
    pub service: MonitoredService,
    pub recipients: Recipients,
}

// ── Incident ───────────────────────────────────────────────────────

/// An outage record for a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Incident {
    pub id: IncidentId,
    pub service_id: ServiceId,
    /// Probe failure description. Redacted before it leaves the process.
    pub reason: Option<String>,
    /// Unix timestamp when the incident was opened.
    pub created_at: u64,
    /// Set on automatic resolution or manual acknowledgement.
    pub acknowledged: bool,
    /// 0 = opened (developers notified), 2 = lead notified, 3 = head notified.
    pub escalation_level: u8,
    /// Unix timestamp of the last escalation step.
    pub last_escalation_at: Option<u64>,
}

impl Incident {
    /// Whole minutes elapsed since the incident was opened.
    pub fn elapsed_minutes(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at) / 60
    }

    /// Build the table key for the incidents table.
    pub fn table_key(&self) -> String {
        incident_key(self.id)
    }
}

/// Table key for an incident id.
pub fn incident_key(id: IncidentId) -> String {
    format!("{id:020}")
}
