//! StateStore — redb-backed state persistence for vigil.
//!
//! Provides typed CRUD operations over services, contacts, and incidents.
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// The store operations the monitoring core depends on.
///
/// Implementations must make `create_incident` atomic with respect to the
/// active-incident check so two evaluations can never both open an incident
/// for the same service.
pub trait MonitorStore: Send + Sync {
    /// All registered services.
    fn list_services(&self) -> StateResult<Vec<MonitoredService>>;

    /// A single service by id.
    fn get_service(&self, service_id: &str) -> StateResult<Option<MonitoredService>>;

    /// Insert or update a service.
    fn put_service(&self, service: &MonitoredService) -> StateResult<()>;

    /// Read, modify and write one service in a single transaction.
    /// Returns the stored result, or `None` if the service does not exist.
    fn update_service(
        &self,
        service_id: &str,
        apply: &mut dyn FnMut(&mut MonitoredService),
    ) -> StateResult<Option<MonitoredService>>;

    /// Record a probe verdict without touching operator-owned fields.
    ///
    /// A service paused by the time the verdict arrives is left as it is
    /// and returned still paused, so callers can drop the verdict.
    fn record_probe(
        &self,
        service_id: &str,
        status: ServiceStatus,
        now: u64,
    ) -> StateResult<Option<MonitoredService>> {
        self.update_service(service_id, &mut |service| {
            if !service.is_paused(now) {
                service.last_status = status;
                service.last_checked_at = Some(now);
            }
        })
    }

    /// A service with its recipient ids resolved to contacts.
    fn get_service_with_recipients(&self, service_id: &str) -> StateResult<ServiceWithRecipients>;

    /// The current unacknowledged incident for a service, if any.
    fn get_active_incident(&self, service_id: &str) -> StateResult<Option<Incident>>;

    /// Open a new incident at level 0. Fails with
    /// [`StateError::ActiveIncidentExists`] if one is already active.
    fn create_incident(&self, service_id: &str, reason: &str, now: u64) -> StateResult<Incident>;

    /// Persist changes to an existing incident. Fails with
    /// [`StateError::IncidentAcknowledged`] if the stored copy is
    /// acknowledged and `incident` is not.
    fn save_incident(&self, incident: &Incident) -> StateResult<()>;

    /// A single incident by id.
    fn get_incident(&self, incident_id: IncidentId) -> StateResult<Option<Incident>>;
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SERVICES).map_err(map_err!(Table))?;
        txn.open_table(CONTACTS).map_err(map_err!(Table))?;
        txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
        txn.open_table(ACTIVE_INCIDENTS).map_err(map_err!(Table))?;
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic record helpers ─────────────────────────────────────

    fn put_record<T: Serialize>(
        &self,
        table: RecordTable,
        key: &str,
        record: &T,
    ) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_record<T: DeserializeOwned>(
        &self,
        table: RecordTable,
        key: &str,
    ) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn list_records<T: DeserializeOwned>(
        &self,
        table: RecordTable,
    ) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: T =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    fn delete_record(&self, table: RecordTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Services ───────────────────────────────────────────────────

    /// Delete a service by id. Its incidents are kept. Returns true if it existed.
    pub fn delete_service(&self, service_id: &str) -> StateResult<bool> {
        let existed = self.delete_record(SERVICES, service_id)?;
        debug!(%service_id, existed, "service deleted");
        Ok(existed)
    }

    // ── Contacts ───────────────────────────────────────────────────

    /// Insert or update a contact.
    pub fn put_contact(&self, contact: &Contact) -> StateResult<()> {
        self.put_record(CONTACTS, &contact.id, contact)?;
        debug!(contact_id = %contact.id, "contact stored");
        Ok(())
    }

    /// Get a contact by id.
    pub fn get_contact(&self, contact_id: &str) -> StateResult<Option<Contact>> {
        self.get_record(CONTACTS, contact_id)
    }

    /// List all contacts.
    pub fn list_contacts(&self) -> StateResult<Vec<Contact>> {
        self.list_records(CONTACTS)
    }

    // ── Incidents ──────────────────────────────────────────────────

    /// List all incidents for a service, oldest first.
    pub fn list_incidents_for_service(&self, service_id: &str) -> StateResult<Vec<Incident>> {
        let all: Vec<Incident> = self.list_records(INCIDENTS)?;
        Ok(all
            .into_iter()
            .filter(|inc| inc.service_id == service_id)
            .collect())
    }

    fn write_incident(txn: &WriteTransaction, incident: &Incident) -> StateResult<()> {
        let key = incident.table_key();
        let value = serde_json::to_vec(incident).map_err(map_err!(Serialize))?;
        let mut table = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
        table
            .insert(key.as_str(), value.as_slice())
            .map_err(map_err!(Write))?;
        Ok(())
    }

    fn resolve_contact(&self, service_id: &str, contact_id: &str) -> StateResult<Option<Contact>> {
        let contact = self.get_contact(contact_id)?;
        if contact.is_none() {
            warn!(%service_id, %contact_id, "recipient references unknown contact, skipping");
        }
        Ok(contact)
    }
}

impl MonitorStore for StateStore {
    fn list_services(&self) -> StateResult<Vec<MonitoredService>> {
        self.list_records(SERVICES)
    }

    fn get_service(&self, service_id: &str) -> StateResult<Option<MonitoredService>> {
        self.get_record(SERVICES, service_id)
    }

    fn put_service(&self, service: &MonitoredService) -> StateResult<()> {
        self.put_record(SERVICES, &service.id, service)?;
        debug!(service_id = %service.id, "service stored");
        Ok(())
    }

    fn update_service(
        &self,
        service_id: &str,
        apply: &mut dyn FnMut(&mut MonitoredService),
    ) -> StateResult<Option<MonitoredService>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let service = {
            let mut table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
            let current: Option<MonitoredService> = table
                .get(service_id)
                .map_err(map_err!(Read))?
                .map(|guard| serde_json::from_slice(guard.value()))
                .transpose()
                .map_err(map_err!(Deserialize))?;
            let Some(mut service) = current else {
                return Ok(None);
            };
            apply(&mut service);
            let value = serde_json::to_vec(&service).map_err(map_err!(Serialize))?;
            table
                .insert(service_id, value.as_slice())
                .map_err(map_err!(Write))?;
            service
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%service_id, "service updated");
        Ok(Some(service))
    }

    fn get_service_with_recipients(&self, service_id: &str) -> StateResult<ServiceWithRecipients> {
        let service = self
            .get_service(service_id)?
            .ok_or_else(|| StateError::NotFound(format!("service {service_id}")))?;

        let mut developers = Vec::with_capacity(service.recipients.developers.len());
        for contact_id in &service.recipients.developers {
            if let Some(contact) = self.resolve_contact(service_id, contact_id)?
                && !developers.iter().any(|c: &Contact| c.id == contact.id)
            {
                developers.push(contact);
            }
        }

        let lead = match &service.recipients.lead {
            Some(id) => self.resolve_contact(service_id, id)?,
            None => None,
        };
        let head = match &service.recipients.head {
            Some(id) => self.resolve_contact(service_id, id)?,
            None => None,
        };

        Ok(ServiceWithRecipients {
            service,
            recipients: Recipients {
                developers,
                lead,
                head,
            },
        })
    }

    fn get_active_incident(&self, service_id: &str) -> StateResult<Option<Incident>> {
        let incident_id = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(ACTIVE_INCIDENTS).map_err(map_err!(Table))?;
            table
                .get(service_id)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
        };
        match incident_id {
            Some(id) => Ok(self
                .get_incident(id)?
                .filter(|inc| !inc.acknowledged)),
            None => Ok(None),
        }
    }

    fn create_incident(&self, service_id: &str, reason: &str, now: u64) -> StateResult<Incident> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let incident = {
            let mut active = txn.open_table(ACTIVE_INCIDENTS).map_err(map_err!(Table))?;
            let existing = active
                .get(service_id)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value());
            if let Some(incident_id) = existing {
                // Dropping the transaction aborts it.
                return Err(StateError::ActiveIncidentExists {
                    service_id: service_id.to_string(),
                    incident_id,
                });
            }

            let mut seq = txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
            let next = seq
                .get(INCIDENT_SEQ)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(0)
                + 1;
            seq.insert(INCIDENT_SEQ, next).map_err(map_err!(Write))?;

            let incident = Incident {
                id: next,
                service_id: service_id.to_string(),
                reason: Some(reason.to_string()),
                created_at: now,
                acknowledged: false,
                escalation_level: 0,
                last_escalation_at: None,
            };
            active
                .insert(service_id, incident.id)
                .map_err(map_err!(Write))?;
            incident
        };
        Self::write_incident(&txn, &incident)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%service_id, incident_id = incident.id, "incident created");
        Ok(incident)
    }

    fn save_incident(&self, incident: &Incident) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let incidents = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
            let stored: Option<Incident> = incidents
                .get(incident.table_key().as_str())
                .map_err(map_err!(Read))?
                .map(|guard| serde_json::from_slice(guard.value()))
                .transpose()
                .map_err(map_err!(Deserialize))?;
            if stored.is_some_and(|s| s.acknowledged) && !incident.acknowledged {
                return Err(StateError::IncidentAcknowledged {
                    incident_id: incident.id,
                });
            }
        }
        {
            let mut active = txn.open_table(ACTIVE_INCIDENTS).map_err(map_err!(Table))?;
            let current = active
                .get(incident.service_id.as_str())
                .map_err(map_err!(Read))?
                .map(|guard| guard.value());

            match (incident.acknowledged, current) {
                (true, Some(id)) if id == incident.id => {
                    active
                        .remove(incident.service_id.as_str())
                        .map_err(map_err!(Write))?;
                }
                (false, Some(id)) if id != incident.id => {
                    return Err(StateError::ActiveIncidentExists {
                        service_id: incident.service_id.clone(),
                        incident_id: id,
                    });
                }
                (false, None) => {
                    active
                        .insert(incident.service_id.as_str(), incident.id)
                        .map_err(map_err!(Write))?;
                }
                _ => {}
            }
        }
        Self::write_incident(&txn, incident)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            incident_id = incident.id,
            level = incident.escalation_level,
            acknowledged = incident.acknowledged,
            "incident saved"
        );
        Ok(())
    }

    fn get_incident(&self, incident_id: IncidentId) -> StateResult<Option<Incident>> {
        self.get_record(INCIDENTS, &incident_key(incident_id))
    }
}
