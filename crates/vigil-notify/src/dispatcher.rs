//! Routes each notification kind to the right people.
//!
//! | Kind | Email To | Email Cc | Voice |
//! |---|---|---|---|
//! | new | developers | lead, head | developers |
//! | escalate-lead | lead | developers, head | lead |
//! | escalate-head | head | lead, developers | head |
//! | resolved | developers, lead | head | developers, lead |

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use vigil_state::{Contact, Incident, Recipients, ServiceWithRecipients};

use crate::content::{self, ContentGenerator, IncidentBrief};
use crate::email::{Mailer, OutboundEmail};
use crate::error::{NotifyError, NotifyResult};
use crate::templates::{NotificationKind, with_summary};
use crate::voice::VoiceChannel;

/// Default bound on any single outbound send or generation request.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(20);

/// What a dispatch actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub emails_sent: u32,
    pub calls_placed: u32,
    /// Recipients that would have been called but have no phone number.
    pub calls_skipped: u32,
    pub failures: u32,
}

/// Composes and sends incident notifications.
#[derive(Clone)]
pub struct Dispatcher {
    mailer: Arc<dyn Mailer>,
    voice: Arc<dyn VoiceChannel>,
    content: Arc<dyn ContentGenerator>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        voice: Arc<dyn VoiceChannel>,
        content: Arc<dyn ContentGenerator>,
    ) -> Self {
        Self {
            mailer,
            voice,
            content,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Override the per-send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn content(&self) -> &Arc<dyn ContentGenerator> {
        &self.content
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    pub async fn notify_new(
        &self,
        target: &ServiceWithRecipients,
        incident: &Incident,
        now: u64,
    ) -> DispatchReport {
        self.dispatch(NotificationKind::New, target, incident, now).await
    }

    pub async fn notify_escalate_lead(
        &self,
        target: &ServiceWithRecipients,
        incident: &Incident,
        now: u64,
    ) -> DispatchReport {
        self.dispatch(NotificationKind::EscalateLead, target, incident, now)
            .await
    }

    pub async fn notify_escalate_head(
        &self,
        target: &ServiceWithRecipients,
        incident: &Incident,
        now: u64,
    ) -> DispatchReport {
        self.dispatch(NotificationKind::EscalateHead, target, incident, now)
            .await
    }

    pub async fn notify_resolved(
        &self,
        target: &ServiceWithRecipients,
        incident: &Incident,
        now: u64,
    ) -> DispatchReport {
        self.dispatch(NotificationKind::Resolved, target, incident, now)
            .await
    }

    /// Send one notification: voice first (if configured), then email.
    /// Never fails; problems are logged and counted in the report.
    pub async fn dispatch(
        &self,
        kind: NotificationKind,
        target: &ServiceWithRecipients,
        incident: &Incident,
        now: u64,
    ) -> DispatchReport {
        let service = &target.service;
        let brief = IncidentBrief::new(kind, service, incident, now);
        let mut report = DispatchReport::default();

        if self.voice.is_configured() {
            self.dispatch_voice(kind, &target.recipients, &brief, &mut report)
                .await;
        } else {
            debug!(service_id = %service.id, %kind, "voice not configured, skipping calls");
        }

        let (to, cc) = route_email(kind, &target.recipients);
        if to.is_empty() {
            warn!(service_id = %service.id, %kind, "no primary email recipients, email skipped");
        } else {
            let summary = self
                .bounded("content generation", async {
                    Ok(content::email_paragraph(self.content.as_ref(), &brief).await)
                })
                .await
                .ok()
                .flatten();
            let email = OutboundEmail {
                to,
                cc,
                subject: kind.subject(service),
                body: with_summary(kind.body(service, incident, now), summary.as_deref()),
            };
            match self.bounded("email", self.mailer.send(&email)).await {
                Ok(()) => report.emails_sent += 1,
                Err(e) => {
                    report.failures += 1;
                    warn!(service_id = %service.id, %kind, error = %e, "email notification failed");
                }
            }
        }

        info!(
            service_id = %service.id,
            incident_id = incident.id,
            %kind,
            emails = report.emails_sent,
            calls = report.calls_placed,
            skipped_calls = report.calls_skipped,
            failures = report.failures,
            "notification dispatched"
        );
        report
    }

    async fn dispatch_voice(
        &self,
        kind: NotificationKind,
        recipients: &Recipients,
        brief: &IncidentBrief,
        report: &mut DispatchReport,
    ) {
        let targets = route_voice(kind, recipients);
        if targets.is_empty() {
            return;
        }

        let script = match self
            .bounded("content generation", async {
                Ok(content::voice_script(self.content.as_ref(), brief).await)
            })
            .await
        {
            Ok(script) => script,
            Err(_) => brief.fallback_voice(),
        };

        for contact in targets {
            let Some(number) = contact.voice_number() else {
                report.calls_skipped += 1;
                info!(contact_id = %contact.id, %kind, "no phone configured, call skipped");
                continue;
            };
            match self.bounded("voice call", self.voice.call(number, &script)).await {
                Ok(()) => report.calls_placed += 1,
                Err(e) => {
                    report.failures += 1;
                    warn!(contact_id = %contact.id, %kind, error = %e, "voice call failed");
                }
            }
        }
    }

    async fn bounded<T>(
        &self,
        what: &'static str,
        fut: impl Future<Output = NotifyResult<T>>,
    ) -> NotifyResult<T> {
        match tokio::time::timeout(self.send_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(what)),
        }
    }
}

/// Email To and Cc addresses for a kind. Cc never repeats a To address.
pub fn route_email(kind: NotificationKind, recipients: &Recipients) -> (Vec<String>, Vec<String>) {
    let devs = || recipients.developers.iter();
    let lead = || recipients.lead.iter();
    let head = || recipients.head.iter();

    let (to, cc): (Vec<&Contact>, Vec<&Contact>) = match kind {
        NotificationKind::New => (devs().collect(), lead().chain(head()).collect()),
        NotificationKind::EscalateLead => (lead().collect(), devs().chain(head()).collect()),
        NotificationKind::EscalateHead => (head().collect(), lead().chain(devs()).collect()),
        NotificationKind::Resolved => (devs().chain(lead()).collect(), head().collect()),
    };

    let to = unique_emails(to, &[]);
    let cc = unique_emails(cc, &to);
    (to, cc)
}

/// Contacts to call for a kind, before the per-contact phone check.
pub fn route_voice(kind: NotificationKind, recipients: &Recipients) -> Vec<&Contact> {
    match kind {
        NotificationKind::New => recipients.developers.iter().collect(),
        NotificationKind::EscalateLead => recipients.lead.iter().collect(),
        NotificationKind::EscalateHead => recipients.head.iter().collect(),
        NotificationKind::Resolved => recipients
            .developers
            .iter()
            .chain(recipients.lead.iter())
            .collect(),
    }
}

fn unique_emails(contacts: Vec<&Contact>, exclude: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(contacts.len());
    for contact in contacts {
        let email = contact.email.trim();
        if email.is_empty()
            || exclude.iter().any(|e| e.eq_ignore_ascii_case(email))
            || out.iter().any(|e| e.eq_ignore_ascii_case(email))
        {
            continue;
        }
        out.push(email.to_string());
    }
    out
}
