//! Per-service evaluation: probe, record, transition, notify.

use std::sync::Arc;

use tracing::{debug, info, warn};
use vigil_notify::{Dispatcher, NotificationKind};
use vigil_probe::Prober;
use vigil_state::{Incident, IncidentId, MonitorStore, MonitoredService, StateError};

use crate::error::{EngineError, EngineResult};
use crate::policy::{Decision, IncidentState, decide};

/// Jitter allowance when honoring per-service check intervals.
pub const DUE_SLACK_SECS: u64 = 5;

/// What happened to one service during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Inside a maintenance window; not probed.
    Paused,
    /// Its check interval has not elapsed yet; not probed.
    NotDue,
    /// Removed from the store since the tick started.
    Vanished,
    Healthy,
    Opened { incident_id: IncidentId },
    Escalated { incident_id: IncidentId, level: u8 },
    /// Acknowledged by an operator while being escalated; later steps
    /// were not sent.
    Acknowledged { incident_id: IncidentId },
    StillDown { incident_id: IncidentId, level: u8 },
    Resolved { incident_id: IncidentId },
}

/// Drives the incident lifecycle for services.
#[derive(Clone)]
pub struct Escalator {
    store: Arc<dyn MonitorStore>,
    prober: Arc<dyn Prober>,
    dispatcher: Dispatcher,
}

impl Escalator {
    pub fn new(store: Arc<dyn MonitorStore>, prober: Arc<dyn Prober>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            prober,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Evaluate one service at `now`.
    ///
    /// The service is re-read from the store so pause windows set after
    /// the tick started are honored. The verdict is recorded with a narrow
    /// store update, so operator changes made while the probe runs survive,
    /// and a window opened in that gap drops the verdict. Incident changes
    /// are persisted before the corresponding notification is dispatched.
    pub async fn evaluate(&self, service_id: &str, now: u64) -> EngineResult<TickOutcome> {
        let Some(service) = self.store.get_service(service_id)? else {
            debug!(%service_id, "service removed before evaluation");
            return Ok(TickOutcome::Vanished);
        };

        if service.is_paused(now) {
            debug!(
                %service_id,
                paused_until = service.paused_until,
                "service in maintenance window, skipping"
            );
            return Ok(TickOutcome::Paused);
        }
        if !service.is_due(now, DUE_SLACK_SECS) {
            return Ok(TickOutcome::NotDue);
        }

        let result = self.prober.probe(&service.health_url).await;
        let status = result.status();
        debug!(%service_id, %status, "probe complete");

        let Some(service) = self.store.record_probe(service_id, status, now)? else {
            debug!(%service_id, "service removed during probe");
            return Ok(TickOutcome::Vanished);
        };
        if service.is_paused(now) {
            info!(
                %service_id,
                paused_until = service.paused_until,
                "maintenance window opened during probe, verdict dropped"
            );
            return Ok(TickOutcome::Paused);
        }

        let active = self.store.get_active_incident(service_id)?;
        let state = IncidentState::of(active.as_ref());

        match (decide(active.as_ref(), status, now), active) {
            (Decision::Open, _) => {
                let incident = match self
                    .store
                    .create_incident(service_id, &result.describe(), now)
                {
                    Ok(incident) => incident,
                    Err(StateError::ActiveIncidentExists { incident_id, .. }) => {
                        warn!(%service_id, incident_id, "incident opened concurrently");
                        return Ok(TickOutcome::StillDown {
                            incident_id,
                            level: 0,
                        });
                    }
                    Err(e) => return Err(e.into()),
                };
                info!(%service_id, incident_id = incident.id, "incident opened");
                self.notify(NotificationKind::New, &service, &incident, now)
                    .await;
                Ok(TickOutcome::Opened {
                    incident_id: incident.id,
                })
            }
            (Decision::Escalate(steps), Some(mut incident)) => {
                for step in steps {
                    incident.escalation_level = step.level();
                    incident.last_escalation_at = Some(now);
                    match self.store.save_incident(&incident) {
                        Ok(()) => {}
                        Err(StateError::IncidentAcknowledged { incident_id }) => {
                            info!(
                                %service_id,
                                incident_id,
                                "incident acknowledged during evaluation, escalation stopped"
                            );
                            return Ok(TickOutcome::Acknowledged { incident_id });
                        }
                        Err(e) => return Err(e.into()),
                    }
                    info!(
                        %service_id,
                        incident_id = incident.id,
                        from = ?state,
                        level = incident.escalation_level,
                        elapsed_minutes = incident.elapsed_minutes(now),
                        "incident escalated"
                    );
                    self.notify(step.kind(), &service, &incident, now).await;
                }
                Ok(TickOutcome::Escalated {
                    incident_id: incident.id,
                    level: incident.escalation_level,
                })
            }
            (Decision::Resolve, Some(mut incident)) => {
                incident.acknowledged = true;
                self.store.save_incident(&incident)?;
                info!(
                    %service_id,
                    incident_id = incident.id,
                    elapsed_minutes = incident.elapsed_minutes(now),
                    "incident resolved"
                );
                self.notify(NotificationKind::Resolved, &service, &incident, now)
                    .await;
                Ok(TickOutcome::Resolved {
                    incident_id: incident.id,
                })
            }
            (_, Some(incident)) => Ok(TickOutcome::StillDown {
                incident_id: incident.id,
                level: incident.escalation_level,
            }),
            (_, None) => Ok(TickOutcome::Healthy),
        }
    }

    /// Dispatch with recipients fetched fresh from the store. A lookup
    /// failure skips the notification; the incident change already stands.
    async fn notify(
        &self,
        kind: NotificationKind,
        service: &MonitoredService,
        incident: &Incident,
        now: u64,
    ) {
        let mut target = match self.store.get_service_with_recipients(&service.id) {
            Ok(target) => target,
            Err(e) => {
                warn!(service_id = %service.id, %kind, error = %e, "recipient lookup failed, notification skipped");
                return;
            }
        };
        target.service.last_status = service.last_status;

        let report = self.dispatcher.dispatch(kind, &target, incident, now).await;
        if report.failures > 0 {
            warn!(
                service_id = %service.id,
                %kind,
                failures = report.failures,
                "notification partially failed"
            );
        }
    }

    /// Mark an incident acknowledged by an operator. No probe and no
    /// notification; the service may open a fresh incident on its next
    /// DOWN probe.
    pub fn acknowledge(&self, incident_id: IncidentId) -> EngineResult<Incident> {
        let mut incident = self
            .store
            .get_incident(incident_id)?
            .ok_or(EngineError::IncidentNotFound(incident_id))?;
        if incident.acknowledged {
            return Ok(incident);
        }
        incident.acknowledged = true;
        self.store.save_incident(&incident)?;
        info!(
            incident_id,
            service_id = %incident.service_id,
            level = incident.escalation_level,
            "incident acknowledged"
        );
        Ok(incident)
    }

    /// Open a maintenance window of `minutes` starting at `now`.
    pub fn pause(
        &self,
        service_id: &str,
        minutes: u32,
        reason: Option<String>,
        now: u64,
    ) -> EngineResult<MonitoredService> {
        if minutes == 0 {
            return Err(EngineError::InvalidPause(
                "duration must be at least one minute".to_string(),
            ));
        }
        let until = now.saturating_add(u64::from(minutes) * 60);
        let service = self
            .store
            .update_service(service_id, &mut |service| {
                service.paused_until = Some(until);
                service.pause_reason = reason.clone();
            })?
            .ok_or_else(|| EngineError::ServiceNotFound(service_id.to_string()))?;
        info!(%service_id, paused_until = until, "maintenance window opened");
        Ok(service)
    }

    /// Close any maintenance window immediately.
    pub fn resume(&self, service_id: &str) -> EngineResult<MonitoredService> {
        let service = self
            .store
            .update_service(service_id, &mut |service| {
                service.paused_until = None;
                service.pause_reason = None;
            })?
            .ok_or_else(|| EngineError::ServiceNotFound(service_id.to_string()))?;
        info!(%service_id, "maintenance window closed");
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Mutex, OnceLock};

    use vigil_notify::{DisabledVoice, Mailer, NoContent, NotifyResult, OutboundEmail};
    use vigil_probe::{BoxFuture, ProbeResult};
    use vigil_state::{Contact, RecipientIds, ServiceStatus, StateStore};

    const T0: u64 = 1_700_000_000;

    /// Returns queued results, then repeats the last one.
    struct ScriptedProber {
        script: Mutex<VecDeque<ProbeResult>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProber {
        fn new(results: &[ProbeResult]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(results.iter().cloned().collect()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl Prober for ScriptedProber {
        fn probe<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, ProbeResult> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            };
            let result = next.unwrap_or(ProbeResult::Healthy);
            Box::pin(async move { result })
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutboundEmail>>,
    }

    impl RecordingMailer {
        fn subjects(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.subject.clone())
                .collect()
        }
    }

    impl Mailer for RecordingMailer {
        fn send<'a>(&'a self, email: &'a OutboundEmail) -> BoxFuture<'a, NotifyResult<()>> {
            self.sent.lock().unwrap().push(email.clone());
            Box::pin(async { Ok(()) })
        }
    }

    fn seeded_store() -> Arc<StateStore> {
        let store = StateStore::open_in_memory().unwrap();
        for (id, email) in [
            ("dev", "dev@example.com"),
            ("lead", "lead@example.com"),
            ("head", "head@example.com"),
        ] {
            store
                .put_contact(&Contact {
                    id: id.to_string(),
                    name: None,
                    email: email.to_string(),
                    phone: None,
                })
                .unwrap();
        }
        store
            .put_service(&MonitoredService {
                id: "checkout-api".to_string(),
                name: "checkout-api".to_string(),
                description: None,
                health_url: "http://checkout.internal/health".to_string(),
                check_interval_minutes: None,
                paused_until: None,
                pause_reason: None,
                last_status: ServiceStatus::Unknown,
                last_checked_at: None,
                recipients: RecipientIds {
                    developers: vec!["dev".to_string()],
                    lead: Some("lead".to_string()),
                    head: Some("head".to_string()),
                },
            })
            .unwrap();
        Arc::new(store)
    }

    fn escalator(
        store: Arc<StateStore>,
        prober: Arc<ScriptedProber>,
    ) -> (Escalator, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = Dispatcher::new(mailer.clone(), Arc::new(DisabledVoice), Arc::new(NoContent));
        (Escalator::new(store, prober, dispatcher), mailer)
    }

    fn down() -> ProbeResult {
        ProbeResult::Unhealthy(503)
    }

    #[tokio::test]
    async fn healthy_service_records_status_only() {
        let store = seeded_store();
        let (engine, mailer) = escalator(store.clone(), ScriptedProber::new(&[ProbeResult::Healthy]));

        let outcome = engine.evaluate("checkout-api", T0).await.unwrap();
        assert_eq!(outcome, TickOutcome::Healthy);

        let svc = store.get_service("checkout-api").unwrap().unwrap();
        assert_eq!(svc.last_status, ServiceStatus::Up);
        assert_eq!(svc.last_checked_at, Some(T0));
        assert!(mailer.subjects().is_empty());
    }

    #[tokio::test]
    async fn down_opens_one_incident_and_notifies_developers() {
        let store = seeded_store();
        let (engine, mailer) = escalator(store.clone(), ScriptedProber::new(&[down()]));

        let outcome = engine.evaluate("checkout-api", T0).await.unwrap();
        let TickOutcome::Opened { incident_id } = outcome else {
            panic!("expected Opened, got {outcome:?}");
        };

        let incident = store.get_incident(incident_id).unwrap().unwrap();
        assert_eq!(incident.escalation_level, 0);
        assert_eq!(
            incident.reason.as_deref(),
            Some("health endpoint returned HTTP 503")
        );
        assert_eq!(mailer.subjects(), ["[INCIDENT] checkout-api is DOWN"]);

        // Staying down before the threshold changes nothing.
        let outcome = engine.evaluate("checkout-api", T0 + 60).await.unwrap();
        assert_eq!(outcome, TickOutcome::StillDown { incident_id, level: 0 });
        assert_eq!(mailer.subjects().len(), 1);
    }

    #[tokio::test]
    async fn full_lifecycle_escalates_then_resolves() {
        let store = seeded_store();
        let prober = ScriptedProber::new(&[down(), down(), down(), ProbeResult::Healthy]);
        let (engine, mailer) = escalator(store.clone(), prober);

        let TickOutcome::Opened { incident_id } = engine.evaluate("checkout-api", T0).await.unwrap()
        else {
            panic!("expected Opened");
        };
        assert_eq!(
            engine.evaluate("checkout-api", T0 + 11 * 60).await.unwrap(),
            TickOutcome::Escalated { incident_id, level: 2 }
        );
        assert_eq!(
            engine.evaluate("checkout-api", T0 + 16 * 60).await.unwrap(),
            TickOutcome::Escalated { incident_id, level: 3 }
        );
        assert_eq!(
            engine.evaluate("checkout-api", T0 + 20 * 60).await.unwrap(),
            TickOutcome::Resolved { incident_id }
        );

        assert_eq!(
            mailer.subjects(),
            [
                "[INCIDENT] checkout-api is DOWN",
                "[ESCALATION L2] Lead attention required - checkout-api",
                "[ESCALATION L3] Head escalation - checkout-api",
                "[RESOLVED] checkout-api is UP",
            ]
        );
        assert!(store.get_active_incident("checkout-api").unwrap().is_none());
        let incident = store.get_incident(incident_id).unwrap().unwrap();
        assert!(incident.acknowledged);
        assert_eq!(incident.escalation_level, 3);
    }

    #[tokio::test]
    async fn overdue_incident_escalates_twice_in_one_tick() {
        let store = seeded_store();
        let (engine, mailer) = escalator(store.clone(), ScriptedProber::new(&[down()]));

        let TickOutcome::Opened { incident_id } = engine.evaluate("checkout-api", T0).await.unwrap()
        else {
            panic!("expected Opened");
        };
        assert_eq!(
            engine.evaluate("checkout-api", T0 + 16 * 60).await.unwrap(),
            TickOutcome::Escalated { incident_id, level: 3 }
        );
        let subjects = mailer.subjects();
        assert_eq!(subjects.len(), 3);
        assert!(subjects[1].starts_with("[ESCALATION L2]"));
        assert!(subjects[2].starts_with("[ESCALATION L3]"));
    }

    #[tokio::test]
    async fn paused_service_is_not_probed() {
        let store = seeded_store();
        let prober = ScriptedProber::new(&[down()]);
        let (engine, mailer) = escalator(store.clone(), prober.clone());

        engine
            .pause("checkout-api", 30, Some("deploy".to_string()), T0)
            .unwrap();
        let outcome = engine.evaluate("checkout-api", T0 + 60).await.unwrap();
        assert_eq!(outcome, TickOutcome::Paused);
        assert_eq!(prober.calls(), 0);
        assert!(mailer.subjects().is_empty());

        let svc = store.get_service("checkout-api").unwrap().unwrap();
        assert_eq!(svc.last_status, ServiceStatus::Unknown);
        assert_eq!(svc.pause_reason.as_deref(), Some("deploy"));

        // The window ends exactly at paused_until.
        let outcome = engine.evaluate("checkout-api", T0 + 30 * 60).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Opened { .. }));
    }

    #[tokio::test]
    async fn resume_closes_the_window() {
        let store = seeded_store();
        let (engine, _) = escalator(store.clone(), ScriptedProber::new(&[ProbeResult::Healthy]));

        engine.pause("checkout-api", 60, None, T0).unwrap();
        let svc = engine.resume("checkout-api").unwrap();
        assert!(svc.paused_until.is_none());
        assert_eq!(
            engine.evaluate("checkout-api", T0 + 60).await.unwrap(),
            TickOutcome::Healthy
        );
    }

    #[test]
    fn pause_rejects_zero_minutes_and_unknown_services() {
        let store = seeded_store();
        let (engine, _) = escalator(store, ScriptedProber::new(&[]));
        assert!(matches!(
            engine.pause("checkout-api", 0, None, T0),
            Err(EngineError::InvalidPause(_))
        ));
        assert!(matches!(
            engine.pause("nope", 5, None, T0),
            Err(EngineError::ServiceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn interval_gates_probing() {
        let store = seeded_store();
        let mut svc = store.get_service("checkout-api").unwrap().unwrap();
        svc.check_interval_minutes = Some(5);
        store.put_service(&svc).unwrap();

        let prober = ScriptedProber::new(&[ProbeResult::Healthy]);
        let (engine, _) = escalator(store, prober.clone());

        assert_eq!(engine.evaluate("checkout-api", T0).await.unwrap(), TickOutcome::Healthy);
        assert_eq!(
            engine.evaluate("checkout-api", T0 + 30).await.unwrap(),
            TickOutcome::NotDue
        );
        assert_eq!(
            engine.evaluate("checkout-api", T0 + 5 * 60 - 2).await.unwrap(),
            TickOutcome::Healthy
        );
        assert_eq!(prober.calls(), 2);
    }

    #[tokio::test]
    async fn acknowledge_frees_the_slot_without_notifying() {
        let store = seeded_store();
        let (engine, mailer) = escalator(store.clone(), ScriptedProber::new(&[down()]));

        let TickOutcome::Opened { incident_id } = engine.evaluate("checkout-api", T0).await.unwrap()
        else {
            panic!("expected Opened");
        };
        let acked = engine.acknowledge(incident_id).unwrap();
        assert!(acked.acknowledged);
        assert!(store.get_active_incident("checkout-api").unwrap().is_none());
        assert_eq!(mailer.subjects().len(), 1);

        // Idempotent.
        assert!(engine.acknowledge(incident_id).unwrap().acknowledged);

        // Still down: a fresh incident opens at level 0.
        let outcome = engine.evaluate("checkout-api", T0 + 60).await.unwrap();
        let TickOutcome::Opened { incident_id: second } = outcome else {
            panic!("expected Opened, got {outcome:?}");
        };
        assert_ne!(second, incident_id);
    }

    #[test]
    fn acknowledge_unknown_incident_fails() {
        let (engine, _) = escalator(seeded_store(), ScriptedProber::new(&[]));
        assert!(matches!(
            engine.acknowledge(42),
            Err(EngineError::IncidentNotFound(42))
        ));
    }

    #[tokio::test]
    async fn deleted_service_vanishes() {
        let store = seeded_store();
        store.delete_service("checkout-api").unwrap();
        let (engine, _) = escalator(store, ScriptedProber::new(&[down()]));
        assert_eq!(
            engine.evaluate("checkout-api", T0).await.unwrap(),
            TickOutcome::Vanished
        );
    }

    #[tokio::test]
    async fn missing_recipients_do_not_block_state_changes() {
        let store = seeded_store();
        let mut svc = store.get_service("checkout-api").unwrap().unwrap();
        svc.recipients = RecipientIds::default();
        store.put_service(&svc).unwrap();

        let (engine, mailer) = escalator(store.clone(), ScriptedProber::new(&[down()]));
        let outcome = engine.evaluate("checkout-api", T0).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Opened { .. }));
        assert!(store.get_active_incident("checkout-api").unwrap().is_some());
        assert!(mailer.subjects().is_empty());
    }

    type OperatorAction = Box<dyn Fn(&Escalator) + Send + Sync>;

    /// Performs an operator action while the probe is in flight, then
    /// reports the service down.
    struct OperatorDuringProbe {
        engine: OnceLock<Escalator>,
        action: OperatorAction,
    }

    impl Prober for OperatorDuringProbe {
        fn probe<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, ProbeResult> {
            if let Some(engine) = self.engine.get() {
                (self.action)(engine);
            }
            Box::pin(async { ProbeResult::Unhealthy(500) })
        }
    }

    fn engine_with_operator_probe(
        store: Arc<StateStore>,
        action: OperatorAction,
    ) -> (Escalator, Arc<RecordingMailer>) {
        let prober = Arc::new(OperatorDuringProbe {
            engine: OnceLock::new(),
            action,
        });
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = Dispatcher::new(mailer.clone(), Arc::new(DisabledVoice), Arc::new(NoContent));
        let engine = Escalator::new(store, prober.clone(), dispatcher);
        let _ = prober.engine.set(engine.clone());
        (engine, mailer)
    }

    /// Records mail and acknowledges incident 1 when the lead is paged.
    #[derive(Default)]
    struct AcknowledgingMailer {
        engine: OnceLock<Escalator>,
        sent: Mutex<Vec<String>>,
    }

    impl Mailer for AcknowledgingMailer {
        fn send<'a>(&'a self, email: &'a OutboundEmail) -> BoxFuture<'a, NotifyResult<()>> {
            self.sent.lock().unwrap().push(email.subject.clone());
            if email.subject.starts_with("[ESCALATION L2]")
                && let Some(engine) = self.engine.get()
            {
                engine.acknowledge(1).unwrap();
            }
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn pause_during_health_check_is_kept_and_drops_the_verdict() {
        let store = seeded_store();
        let (engine, mailer) = engine_with_operator_probe(
            store.clone(),
            Box::new(|engine: &Escalator| {
                engine
                    .pause("checkout-api", 60, Some("failover".to_string()), T0)
                    .unwrap();
            }),
        );

        assert_eq!(engine.evaluate("checkout-api", T0).await.unwrap(), TickOutcome::Paused);

        let svc = store.get_service("checkout-api").unwrap().unwrap();
        assert_eq!(svc.paused_until, Some(T0 + 60 * 60));
        assert_eq!(svc.pause_reason.as_deref(), Some("failover"));
        assert_eq!(svc.last_status, ServiceStatus::Unknown);
        assert!(store.get_active_incident("checkout-api").unwrap().is_none());
        assert!(mailer.subjects().is_empty());
    }

    #[tokio::test]
    async fn registration_during_health_check_is_not_overwritten() {
        let store = seeded_store();
        let writer = store.clone();
        let (engine, _) = engine_with_operator_probe(
            store.clone(),
            Box::new(move |_: &Escalator| {
                let mut svc = writer.get_service("checkout-api").unwrap().unwrap();
                svc.health_url = "http://checkout-v2.internal/health".to_string();
                svc.recipients.lead = None;
                writer.put_service(&svc).unwrap();
            }),
        );

        let outcome = engine.evaluate("checkout-api", T0).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Opened { .. }));

        let svc = store.get_service("checkout-api").unwrap().unwrap();
        assert_eq!(svc.health_url, "http://checkout-v2.internal/health");
        assert!(svc.recipients.lead.is_none());
        assert_eq!(svc.last_status, ServiceStatus::Down);
        assert_eq!(svc.last_checked_at, Some(T0));
    }

    #[tokio::test]
    async fn acknowledge_during_lead_page_stops_head_escalation() {
        let store = seeded_store();
        let mailer = Arc::new(AcknowledgingMailer::default());
        let dispatcher = Dispatcher::new(mailer.clone(), Arc::new(DisabledVoice), Arc::new(NoContent));
        let engine = Escalator::new(store.clone(), ScriptedProber::new(&[down()]), dispatcher);
        let _ = mailer.engine.set(engine.clone());

        let TickOutcome::Opened { incident_id } = engine.evaluate("checkout-api", T0).await.unwrap()
        else {
            panic!("expected Opened");
        };
        assert_eq!(incident_id, 1);

        assert_eq!(
            engine.evaluate("checkout-api", T0 + 16 * 60).await.unwrap(),
            TickOutcome::Acknowledged { incident_id }
        );

        let incident = store.get_incident(incident_id).unwrap().unwrap();
        assert!(incident.acknowledged);
        assert_eq!(incident.escalation_level, 2);
        assert!(store.get_active_incident("checkout-api").unwrap().is_none());
        let sent = mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|s| !s.starts_with("[ESCALATION L3]")));
    }
}
