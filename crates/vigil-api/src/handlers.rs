//! REST API handlers.
//!
//! Handlers read and write through `StateStore`; lifecycle changes
//! (pause, resume, acknowledge) go through the escalation engine.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::info;
use vigil_escalation::EngineError;
use vigil_notify::ContentGenerator;
use vigil_scheduler::now_secs;
use vigil_state::*;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

fn internal(e: impl std::fmt::Display) -> Response {
    error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
}

fn engine_error(e: EngineError) -> Response {
    let status = match &e {
        EngineError::IncidentNotFound(_) | EngineError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidPause(_) => StatusCode::BAD_REQUEST,
        EngineError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status)
}

pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}

// ── Services ───────────────────────────────────────────────────

/// GET /api/v1/services
pub async fn list_services(State(state): State<ApiState>) -> Response {
    match state.store.list_services() {
        Ok(services) => ApiResponse::ok(services).into_response(),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/services/{id}
pub async fn get_service(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.store.get_service_with_recipients(&id) {
        Ok(target) => ApiResponse::ok(serde_json::json!({
            "service": target.service,
            "recipients": {
                "developers": target.recipients.developers,
                "lead": target.recipients.lead,
                "head": target.recipients.head,
            },
        }))
        .into_response(),
        Err(StateError::NotFound(_)) => error_response("service not found", StatusCode::NOT_FOUND),
        Err(e) => internal(e),
    }
}

/// Service registration body. Runtime fields (status, pause window,
/// last check) are preserved when an existing service is replaced.
#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub health_url: String,
    pub check_interval_minutes: Option<u32>,
    #[serde(default)]
    pub recipients: RecipientIds,
}

/// POST /api/v1/services
pub async fn create_service(
    State(state): State<ApiState>,
    Json(req): Json<CreateServiceRequest>,
) -> Response {
    let id = req.id.trim().to_string();
    if id.is_empty() {
        return error_response("service id must not be empty", StatusCode::BAD_REQUEST);
    }
    if !(req.health_url.starts_with("http://") || req.health_url.starts_with("https://")) {
        return error_response("health_url must be an http(s) URL", StatusCode::BAD_REQUEST);
    }
    if req.check_interval_minutes == Some(0) {
        return error_response(
            "check_interval_minutes must be at least 1",
            StatusCode::BAD_REQUEST,
        );
    }

    let mut recipients = req.recipients;
    let mut seen = Vec::with_capacity(recipients.developers.len());
    recipients.developers.retain(|c| {
        let fresh = !seen.contains(c);
        seen.push(c.clone());
        fresh
    });
    let referenced = recipients
        .developers
        .iter()
        .chain(recipients.lead.iter())
        .chain(recipients.head.iter());
    for contact_id in referenced {
        match state.store.get_contact(contact_id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                return error_response(
                    &format!("unknown contact: {contact_id}"),
                    StatusCode::BAD_REQUEST,
                );
            }
            Err(e) => return internal(e),
        }
    }

    let name = req.name.unwrap_or_else(|| id.clone());
    let updated = state.store.update_service(&id, &mut |service| {
        service.name = name.clone();
        service.description = req.description.clone();
        service.health_url = req.health_url.clone();
        service.check_interval_minutes = req.check_interval_minutes;
        service.recipients = recipients.clone();
    });
    let (service, created) = match updated {
        Ok(Some(service)) => (service, false),
        Ok(None) => {
            let service = MonitoredService {
                id: id.clone(),
                name,
                description: req.description,
                health_url: req.health_url,
                check_interval_minutes: req.check_interval_minutes,
                paused_until: None,
                pause_reason: None,
                last_status: ServiceStatus::Unknown,
                last_checked_at: None,
                recipients,
            };
            if let Err(e) = state.store.put_service(&service) {
                return internal(e);
            }
            (service, true)
        }
        Err(e) => return internal(e),
    };
    info!(service_id = %service.id, created, "service registered");
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    (status, ApiResponse::ok(service)).into_response()
}

/// DELETE /api/v1/services/{id}
pub async fn delete_service(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.store.delete_service(&id) {
        Ok(true) => {
            info!(service_id = %id, "service removed");
            ApiResponse::ok("deleted").into_response()
        }
        Ok(false) => error_response("service not found", StatusCode::NOT_FOUND),
        Err(e) => internal(e),
    }
}

/// Maintenance window request body.
#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    pub minutes: u32,
    pub reason: Option<String>,
}

/// POST /api/v1/services/{id}/pause
pub async fn pause_service(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<PauseRequest>,
) -> Response {
    match state
        .scheduler
        .escalator()
        .pause(&id, req.minutes, req.reason, now_secs())
    {
        Ok(service) => ApiResponse::ok(service).into_response(),
        Err(e) => engine_error(e),
    }
}

/// POST /api/v1/services/{id}/resume
pub async fn resume_service(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.scheduler.escalator().resume(&id) {
        Ok(service) => ApiResponse::ok(service).into_response(),
        Err(e) => engine_error(e),
    }
}

// ── Incidents ──────────────────────────────────────────────────

/// GET /api/v1/services/{id}/incidents
pub async fn list_incidents(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.store.list_incidents_for_service(&id) {
        Ok(incidents) => ApiResponse::ok(incidents).into_response(),
        Err(e) => internal(e),
    }
}

/// GET /api/v1/services/{id}/incidents/active
pub async fn active_incident(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.store.get_active_incident(&id) {
        Ok(Some(incident)) => ApiResponse::ok(incident).into_response(),
        Ok(None) => error_response("no active incident", StatusCode::NOT_FOUND),
        Err(e) => internal(e),
    }
}

/// POST /api/v1/incidents/{id}/acknowledge
pub async fn acknowledge_incident(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
) -> Response {
    match state.scheduler.escalator().acknowledge(id) {
        Ok(incident) => ApiResponse::ok(incident).into_response(),
        Err(e) => engine_error(e),
    }
}

// ── Contacts ───────────────────────────────────────────────────

/// GET /api/v1/contacts
pub async fn list_contacts(State(state): State<ApiState>) -> Response {
    match state.store.list_contacts() {
        Ok(contacts) => ApiResponse::ok(contacts).into_response(),
        Err(e) => internal(e),
    }
}

/// POST /api/v1/contacts
pub async fn create_contact(State(state): State<ApiState>, Json(contact): Json<Contact>) -> Response {
    if contact.id.trim().is_empty() {
        return error_response("contact id must not be empty", StatusCode::BAD_REQUEST);
    }
    if !contact.email.contains('@') {
        return error_response("email must be an address", StatusCode::BAD_REQUEST);
    }
    match state.store.put_contact(&contact) {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok(contact)).into_response(),
        Err(e) => internal(e),
    }
}

// ── Scheduler ──────────────────────────────────────────────────

/// POST /api/v1/tick
pub async fn run_tick(State(state): State<ApiState>) -> Response {
    match state.scheduler.run_tick().await {
        Ok(report) => ApiResponse::ok(serde_json::json!({
            "services": report.services,
            "evaluated": report.evaluated,
            "paused": report.paused,
            "not_due": report.not_due,
            "skipped": report.skipped,
            "failed": report.failed,
            "opened": report.opened,
            "escalated": report.escalated,
            "resolved": report.resolved,
        }))
        .into_response(),
        Err(e) => internal(e),
    }
}

// ── Assistant ──────────────────────────────────────────────────

const ASK_SYSTEM_PROMPT: &str =
    "You are a helpful backend/devops assistant. Answer briefly with clear steps.";

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Replaces the default system prompt.
    pub system: Option<String>,
}

/// POST /api/v1/ask
pub async fn ask(State(state): State<ApiState>, Json(req): Json<AskRequest>) -> Response {
    let question = req.question.trim();
    if question.is_empty() {
        return error_response("question must not be empty", StatusCode::BAD_REQUEST);
    }
    let dispatcher = state.scheduler.escalator().dispatcher();
    let content = dispatcher.content();
    if !content.is_available() {
        return error_response("no model configured", StatusCode::SERVICE_UNAVAILABLE);
    }
    let system = req.system.as_deref().unwrap_or(ASK_SYSTEM_PROMPT);

    match tokio::time::timeout(dispatcher.send_timeout(), content.generate(system, question)).await {
        Ok(Ok(answer)) => ApiResponse::ok(serde_json::json!({ "answer": answer })).into_response(),
        Ok(Err(e)) => error_response(&e.to_string(), StatusCode::BAD_GATEWAY),
        Err(_) => error_response("model did not answer in time", StatusCode::GATEWAY_TIMEOUT),
    }
}
