//! vigil-api — REST API for vigil.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Liveness |
//! | GET | `/api/v1/services` | List monitored services |
//! | POST | `/api/v1/services` | Register or replace a service |
//! | GET | `/api/v1/services/{id}` | Service with resolved recipients |
//! | DELETE | `/api/v1/services/{id}` | Stop monitoring a service |
//! | POST | `/api/v1/services/{id}/pause` | Open a maintenance window |
//! | POST | `/api/v1/services/{id}/resume` | Close the maintenance window |
//! | GET | `/api/v1/services/{id}/incidents` | Incident history |
//! | GET | `/api/v1/services/{id}/incidents/active` | Active incident, if any |
//! | GET | `/api/v1/contacts` | List contacts |
//! | POST | `/api/v1/contacts` | Create or replace a contact |
//! | POST | `/api/v1/incidents/{id}/acknowledge` | Manual acknowledge |
//! | POST | `/api/v1/tick` | Run one polling tick now |
//! | POST | `/api/v1/ask` | Ask the configured model an ops question |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use vigil_scheduler::Scheduler;
use vigil_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<StateStore>,
    pub scheduler: Arc<Scheduler>,
}

/// Build the complete API router.
pub fn build_router(store: Arc<StateStore>, scheduler: Arc<Scheduler>) -> Router {
    let state = ApiState { store, scheduler };

    let api_routes = Router::new()
        .route("/services", get(handlers::list_services).post(handlers::create_service))
        .route("/services/{id}", get(handlers::get_service).delete(handlers::delete_service))
        .route("/services/{id}/pause", post(handlers::pause_service))
        .route("/services/{id}/resume", post(handlers::resume_service))
        .route("/services/{id}/incidents", get(handlers::list_incidents))
        .route("/services/{id}/incidents/active", get(handlers::active_incident))
        .route("/contacts", get(handlers::list_contacts).post(handlers::create_contact))
        .route("/incidents/{id}/acknowledge", post(handlers::acknowledge_incident))
        .route("/tick", post(handlers::run_tick))
        .route("/ask", post(handlers::ask))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
