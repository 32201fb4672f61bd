//! Deterministic subject and body templates per notification kind.

use chrono::{DateTime, SecondsFormat, Utc};

use vigil_state::{Incident, MonitoredService};

use crate::redact::redact_reason;

/// The four notifications an incident can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Incident opened; developers are the audience.
    New,
    /// Open for 10 minutes; the team lead is the audience.
    EscalateLead,
    /// Open for 15 minutes; the organization head is the audience.
    EscalateHead,
    /// Service recovered.
    Resolved,
}

impl NotificationKind {
    /// Audience role named in generated content.
    pub fn audience(self) -> &'static str {
        match self {
            Self::New => "Developer",
            Self::EscalateLead => "Team Lead",
            Self::EscalateHead => "Head",
            Self::Resolved => "All",
        }
    }

    /// Tone requested for the spoken script.
    pub fn tone(self) -> &'static str {
        match self {
            Self::New => "calm and urgent",
            Self::EscalateLead => "decisive and brief",
            Self::EscalateHead => "executive concise",
            Self::Resolved => "positive and succinct",
        }
    }

    /// Short name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::EscalateLead => "escalate-lead",
            Self::EscalateHead => "escalate-head",
            Self::Resolved => "resolved",
        }
    }

    /// Email subject line.
    pub fn subject(self, service: &MonitoredService) -> String {
        match self {
            Self::New => format!("[INCIDENT] {} is DOWN", service.name),
            Self::EscalateLead => {
                format!("[ESCALATION L2] Lead attention required - {}", service.name)
            }
            Self::EscalateHead => format!("[ESCALATION L3] Head escalation - {}", service.name),
            Self::Resolved => format!("[RESOLVED] {} is UP", service.name),
        }
    }

    /// Email body, without any generated summary.
    pub fn body(self, service: &MonitoredService, incident: &Incident, now: u64) -> String {
        let opened = format_timestamp(incident.created_at);
        let elapsed = incident.elapsed_minutes(now);
        let reason = redact_reason(incident.reason.as_deref());
        match self {
            Self::New => format!(
                "Service is DOWN.\n\n\
                 Project: {name}\n\
                 Health URL: {url}\n\
                 Detected at: {opened}\n\
                 Reason: {reason}\n\n\
                 Action:\n\
                 - Developer: start investigation\n\
                 - Lead: may pause if maintenance\n\
                 - Head: visibility only\n\n\
                 This incident is now active (level 1).\n",
                name = service.name,
                url = service.health_url,
            ),
            Self::EscalateLead => format!(
                "Incident still OPEN.\n\n\
                 Project: {name}\n\
                 Health URL: {url}\n\
                 Open since: {opened}\n\
                 Elapsed: {elapsed} minutes\n\
                 Reason: {reason}\n\n\
                 Action:\n\
                 - Lead: acknowledge, coordinate fix, pause if maintenance\n\
                 - Dev: continue remediation\n",
                name = service.name,
                url = service.health_url,
            ),
            Self::EscalateHead => format!(
                "High priority escalation.\n\n\
                 Project: {name}\n\
                 Health URL: {url}\n\
                 Open since: {opened}\n\
                 Elapsed: {elapsed} minutes\n\
                 Reason: {reason}\n\n\
                 Action:\n\
                 - Head: coordinate with Lead for incident command\n\
                 - Lead/Dev: provide recovery ETA\n",
                name = service.name,
                url = service.health_url,
            ),
            Self::Resolved => format!(
                "Service recovered.\n\n\
                 Project: {name}\n\
                 Health URL: {url}\n\
                 Total downtime: {elapsed} minutes\n\n\
                 Incident marked resolved.\n",
                name = service.name,
                url = service.health_url,
            ),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format a unix timestamp as RFC 3339 UTC.
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map_or_else(
            || secs.to_string(),
            |dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
}

/// Append the generated summary, if any, to a template body.
pub fn with_summary(body: String, summary: Option<&str>) -> String {
    match summary {
        Some(para) => format!("{body}\nAI summary:\n{para}\n"),
        None => body,
    }
}
