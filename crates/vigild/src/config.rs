//! vigil.toml configuration parser.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vigil_notify::{ChatConfig, SmtpConfig, TwilioConfig};
use vigil_probe::ProbeConfig;
use vigil_state::{Contact, MonitorStore, MonitoredService, RecipientIds, ServiceStatus, StateStore};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub probe: ProbeSettings,
    pub smtp: Option<SmtpConfig>,
    pub voice: Option<TwilioConfig>,
    pub ai: Option<ChatConfig>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub services: Vec<ServiceDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Upper bound for each email, call, or summary request.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            data_dir: default_data_dir(),
            max_concurrency: default_max_concurrency(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/vigil")
}

fn default_max_concurrency() -> usize {
    vigil_scheduler::DEFAULT_MAX_CONCURRENCY
}

fn default_send_timeout_secs() -> u64 {
    vigil_notify::dispatcher::DEFAULT_SEND_TIMEOUT.as_secs()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    #[serde(default = "default_probe_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_probe_timeout_secs(),
            read_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

fn default_probe_timeout_secs() -> u64 {
    3
}

impl ProbeSettings {
    pub fn to_probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
        }
    }
}

/// A service declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDecl {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub health_url: String,
    pub check_interval_minutes: Option<u32>,
    #[serde(default)]
    pub developers: Vec<String>,
    pub lead: Option<String>,
    pub head: Option<String>,
}

impl ServiceDecl {
    fn recipient_ids(&self) -> RecipientIds {
        let mut developers: Vec<String> = Vec::with_capacity(self.developers.len());
        for id in &self.developers {
            if !developers.contains(id) {
                developers.push(id.clone());
            }
        }
        RecipientIds {
            developers,
            lead: self.lead.clone(),
            head: self.head.clone(),
        }
    }
}

impl VigilConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: VigilConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Fill secrets supplied out of band (environment or flags).
    pub fn apply_secrets(
        &mut self,
        smtp_password: Option<String>,
        twilio_auth_token: Option<String>,
        ai_api_key: Option<String>,
    ) {
        if let (Some(smtp), Some(password)) = (self.smtp.as_mut(), smtp_password) {
            smtp.password = password;
        }
        if let (Some(voice), Some(token)) = (self.voice.as_mut(), twilio_auth_token) {
            voice.auth_token = token;
        }
        if let Some(key) = ai_api_key {
            self.ai.get_or_insert_with(ChatConfig::default).api_key = key;
        }
    }

    /// Reject duplicate ids, dangling contact references, and bad URLs.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut contact_ids = HashSet::new();
        for contact in &self.contacts {
            if contact.id.trim().is_empty() {
                bail!("contact with empty id");
            }
            if !contact.email.contains('@') {
                bail!("contact {}: invalid email {:?}", contact.id, contact.email);
            }
            if !contact_ids.insert(contact.id.as_str()) {
                bail!("duplicate contact id {}", contact.id);
            }
        }

        let mut service_ids = HashSet::new();
        for svc in &self.services {
            if svc.id.trim().is_empty() {
                bail!("service with empty id");
            }
            if !service_ids.insert(svc.id.as_str()) {
                bail!("duplicate service id {}", svc.id);
            }
            if !(svc.health_url.starts_with("http://") || svc.health_url.starts_with("https://")) {
                bail!("service {}: health_url must be http(s)", svc.id);
            }
            if svc.check_interval_minutes == Some(0) {
                bail!("service {}: check_interval_minutes must be at least 1", svc.id);
            }
            let referenced = svc
                .developers
                .iter()
                .chain(svc.lead.iter())
                .chain(svc.head.iter());
            for contact_id in referenced {
                if !contact_ids.contains(contact_id.as_str()) {
                    bail!("service {}: unknown contact {contact_id}", svc.id);
                }
            }
        }

        if self.daemon.max_concurrency == 0 {
            bail!("daemon.max_concurrency must be at least 1");
        }
        Ok(())
    }

    /// Upsert declared contacts and services. Runtime fields of existing
    /// services (status, last check, maintenance window) are preserved.
    pub fn seed(&self, store: &StateStore) -> anyhow::Result<()> {
        for contact in &self.contacts {
            store.put_contact(contact)?;
        }

        for decl in &self.services {
            let service = match store.get_service(&decl.id)? {
                Some(mut existing) => {
                    existing.name = decl.name.clone().unwrap_or_else(|| decl.id.clone());
                    existing.description = decl.description.clone();
                    existing.health_url = decl.health_url.clone();
                    existing.check_interval_minutes = decl.check_interval_minutes;
                    existing.recipients = decl.recipient_ids();
                    existing
                }
                None => MonitoredService {
                    id: decl.id.clone(),
                    name: decl.name.clone().unwrap_or_else(|| decl.id.clone()),
                    description: decl.description.clone(),
                    health_url: decl.health_url.clone(),
                    check_interval_minutes: decl.check_interval_minutes,
                    paused_until: None,
                    pause_reason: None,
                    last_status: ServiceStatus::Unknown,
                    last_checked_at: None,
                    recipients: decl.recipient_ids(),
                },
            };
            store.put_service(&service)?;
            debug!(service_id = %service.id, "service seeded from config");
        }

        info!(
            contacts = self.contacts.len(),
            services = self.services.len(),
            "configuration seeded"
        );
        Ok(())
    }
}
