//! Shared fakes for scheduler integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vigil_escalation::Escalator;
use vigil_notify::{
    BoxFuture as NotifyFuture, DisabledVoice, Dispatcher, Mailer, NoContent, NotifyResult,
    OutboundEmail,
};
use vigil_probe::{BoxFuture, ProbeResult, Prober};
use vigil_scheduler::Scheduler;
use vigil_state::{Contact, MonitorStore, MonitoredService, RecipientIds, ServiceStatus, StateStore};

pub const T0: u64 = 1_700_000_000;

/// Prober whose verdict per URL is set by the test. Unknown URLs are healthy.
#[derive(Default)]
pub struct SwitchProber {
    verdicts: Mutex<HashMap<String, ProbeResult>>,
    probes: Mutex<Vec<String>>,
}

impl SwitchProber {
    pub fn set(&self, url: &str, result: ProbeResult) {
        self.verdicts.lock().unwrap().insert(url.to_string(), result);
    }

    pub fn probed(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }
}

impl Prober for SwitchProber {
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ProbeResult> {
        self.probes.lock().unwrap().push(url.to_string());
        let result = self
            .verdicts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(ProbeResult::Healthy);
        Box::pin(async move { result })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent().into_iter().map(|e| e.subject).collect()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.subjects().iter().filter(|s| s.starts_with(prefix)).count()
    }
}

impl Mailer for RecordingMailer {
    fn send<'a>(&'a self, email: &'a OutboundEmail) -> NotifyFuture<'a, NotifyResult<()>> {
        self.sent.lock().unwrap().push(email.clone());
        Box::pin(async { Ok(()) })
    }
}

pub struct Harness {
    pub store: Arc<StateStore>,
    pub prober: Arc<SwitchProber>,
    pub mailer: Arc<RecordingMailer>,
    pub scheduler: Scheduler,
}

pub fn contact(id: &str) -> Contact {
    Contact {
        id: id.to_string(),
        name: Some(id.to_string()),
        email: format!("{id}@example.com"),
        phone: None,
    }
}

pub fn service(id: &str) -> MonitoredService {
    MonitoredService {
        id: id.to_string(),
        name: id.to_string(),
        description: None,
        health_url: health_url(id),
        check_interval_minutes: None,
        paused_until: None,
        pause_reason: None,
        last_status: ServiceStatus::Unknown,
        last_checked_at: None,
        recipients: RecipientIds {
            developers: vec!["dev1".to_string(), "dev2".to_string()],
            lead: Some("lead".to_string()),
            head: Some("head".to_string()),
        },
    }
}

pub fn health_url(id: &str) -> String {
    format!("http://{id}.internal/health")
}

/// In-memory store seeded with the standard contacts and `services`.
pub fn harness(services: &[MonitoredService]) -> Harness {
    harness_with_store(Arc::new(StateStore::open_in_memory().unwrap()), services)
}

pub fn harness_with_store(store: Arc<StateStore>, services: &[MonitoredService]) -> Harness {
    for id in ["dev1", "dev2", "lead", "head"] {
        store.put_contact(&contact(id)).unwrap();
    }
    for svc in services {
        store.put_service(svc).unwrap();
    }
    let prober = Arc::new(SwitchProber::default());
    let mailer = Arc::new(RecordingMailer::default());
    let dispatcher = Dispatcher::new(mailer.clone(), Arc::new(DisabledVoice), Arc::new(NoContent));
    let escalator = Escalator::new(store.clone(), prober.clone(), dispatcher);
    let scheduler = Scheduler::new(store.clone(), escalator);
    Harness {
        store,
        prober,
        mailer,
        scheduler,
    }
}

pub fn minutes(m: u64) -> u64 {
    T0 + m * 60
}
