//! Pure escalation policy.

use vigil_notify::NotificationKind;
use vigil_state::{Incident, ServiceStatus};

/// Incident age after which the team lead is escalated to.
pub const LEAD_ESCALATION_AFTER_SECS: u64 = 10 * 60;

/// Incident age after which the organization head is escalated to.
pub const HEAD_ESCALATION_AFTER_SECS: u64 = 15 * 60;

/// Where a service sits in the incident lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentState {
    Healthy,
    OpenL1,
    OpenL2,
    OpenL3,
}

impl IncidentState {
    pub fn of(active: Option<&Incident>) -> Self {
        match active.map(|inc| inc.escalation_level) {
            None => Self::Healthy,
            Some(0 | 1) => Self::OpenL1,
            Some(2) => Self::OpenL2,
            Some(_) => Self::OpenL3,
        }
    }
}

/// One escalation step raised on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationStep {
    Lead,
    Head,
}

impl EscalationStep {
    /// Escalation level the incident moves to.
    pub fn level(self) -> u8 {
        match self {
            Self::Lead => 2,
            Self::Head => 3,
        }
    }

    /// Notification sent for this step.
    pub fn kind(self) -> NotificationKind {
        match self {
            Self::Lead => NotificationKind::EscalateLead,
            Self::Head => NotificationKind::EscalateHead,
        }
    }
}

/// What to do with a service's incident after a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing changes.
    NoChange,
    /// Open a new incident and notify developers.
    Open,
    /// Raise the active incident through these steps, in order.
    Escalate(Vec<EscalationStep>),
    /// Close the active incident and send the recovery notice.
    Resolve,
}

/// Decide the transition for one service given its probe verdict.
///
/// Both escalation thresholds are checked independently, so a single
/// call can return `[Lead, Head]` when an incident is already 15 minutes
/// old at level 0/1. Levels never decrease.
pub fn decide(active: Option<&Incident>, status: ServiceStatus, now: u64) -> Decision {
    match (status, active) {
        (ServiceStatus::Down, None) => Decision::Open,
        (ServiceStatus::Down, Some(inc)) => {
            let elapsed = now.saturating_sub(inc.created_at);
            let mut steps = Vec::new();
            let mut level = inc.escalation_level;
            if elapsed >= LEAD_ESCALATION_AFTER_SECS && level < EscalationStep::Lead.level() {
                steps.push(EscalationStep::Lead);
                level = EscalationStep::Lead.level();
            }
            if elapsed >= HEAD_ESCALATION_AFTER_SECS && level < EscalationStep::Head.level() {
                steps.push(EscalationStep::Head);
            }
            if steps.is_empty() {
                Decision::NoChange
            } else {
                Decision::Escalate(steps)
            }
        }
        (ServiceStatus::Up, Some(inc)) if !inc.acknowledged => Decision::Resolve,
        _ => Decision::NoChange,
    }
}
