//! Daemon-level API tests.
//!
//! Builds the daemon exactly as `vigild run` does (config → store →
//! scheduler → router) against a local health endpoint, and drives it
//! through the REST API.

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use vigil_state::{MonitorStore, StateStore};
use vigild::{VigilConfig, build_scheduler};

/// Local health endpoint whose status code the test controls.
async fn health_stub() -> (String, Arc<AtomicU16>) {
    let status = Arc::new(AtomicU16::new(200));
    let shared = status.clone();
    let router = axum::Router::new().route(
        "/health",
        axum::routing::get(move || {
            let shared = shared.clone();
            async move { StatusCode::from_u16(shared.load(Ordering::SeqCst)).unwrap() }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    (format!("http://{addr}/health"), status)
}

fn config(health_url: &str) -> VigilConfig {
    let raw = format!(
        r#"
[[contacts]]
id = "ana"
email = "ana@example.com"

[[contacts]]
id = "lee"
email = "lee@example.com"

[[services]]
id = "checkout-api"
health_url = "{health_url}"
developers = ["ana"]
lead = "lee"
"#
    );
    let config: VigilConfig = toml::from_str(&raw).unwrap();
    config.validate().unwrap();
    config
}

async fn daemon(health_url: &str) -> (axum::Router, Arc<StateStore>) {
    let config = config(health_url);
    let store = Arc::new(StateStore::open_in_memory().unwrap());
    config.seed(&store).unwrap();
    let scheduler = Arc::new(build_scheduler(&config, store.clone()).unwrap());
    (vigil_api::build_router(store.clone(), scheduler), store)
}

async fn call(router: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            req = req.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };
    let resp = router.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn healthz_responds() {
    let (url, _) = health_stub().await;
    let (router, _) = daemon(&url).await;
    let (status, body) = call(&router, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn seeded_service_is_listed_with_recipients() {
    let (url, _) = health_stub().await;
    let (router, _) = daemon(&url).await;

    let (status, body) = call(&router, "GET", "/api/v1/services", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], "checkout-api");
    assert_eq!(body["data"][0]["last_status"], "UNKNOWN");

    let (status, body) = call(&router, "GET", "/api/v1/services/checkout-api", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["recipients"]["developers"][0]["email"], "ana@example.com");
    assert_eq!(body["data"]["recipients"]["lead"]["id"], "lee");
    assert!(body["data"]["recipients"]["head"].is_null());
}

#[tokio::test]
async fn outage_opens_incident_and_recovery_resolves_it() {
    let (url, code) = health_stub().await;
    let (router, store) = daemon(&url).await;

    code.store(500, Ordering::SeqCst);
    let (status, body) = call(&router, "POST", "/api/v1/tick", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["opened"], 1);

    let (status, body) = call(&router, "GET", "/api/v1/services/checkout-api/incidents/active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["escalation_level"], 0);
    assert_eq!(body["data"]["reason"], "health endpoint returned HTTP 500");
    assert_eq!(
        store.get_service("checkout-api").unwrap().unwrap().last_status.to_string(),
        "DOWN"
    );

    code.store(200, Ordering::SeqCst);
    let (_, body) = call(&router, "POST", "/api/v1/tick", None).await;
    assert_eq!(body["data"]["resolved"], 1);

    let (status, _) = call(&router, "GET", "/api/v1/services/checkout-api/incidents/active", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = call(&router, "GET", "/api/v1/services/checkout-api/incidents", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["acknowledged"], true);
}

#[tokio::test]
async fn manual_acknowledge_frees_the_slot() {
    let (url, code) = health_stub().await;
    let (router, _) = daemon(&url).await;

    code.store(503, Ordering::SeqCst);
    call(&router, "POST", "/api/v1/tick", None).await;
    let (_, body) = call(&router, "GET", "/api/v1/services/checkout-api/incidents/active", None).await;
    let id = body["data"]["id"].as_u64().unwrap();

    let (status, body) = call(&router, "POST", &format!("/api/v1/incidents/{id}/acknowledge"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["acknowledged"], true);

    let (status, _) = call(&router, "GET", "/api/v1/services/checkout-api/incidents/active", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&router, "POST", "/api/v1/incidents/999/acknowledge", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn paused_service_is_skipped_by_manual_tick() {
    let (url, code) = health_stub().await;
    let (router, store) = daemon(&url).await;
    code.store(500, Ordering::SeqCst);

    let (status, body) = call(
        &router,
        "POST",
        "/api/v1/services/checkout-api/pause",
        Some(json!({ "minutes": 30, "reason": "schema migration" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pause_reason"], "schema migration");

    let (_, body) = call(&router, "POST", "/api/v1/tick", None).await;
    assert_eq!(body["data"]["paused"], 1);
    assert_eq!(body["data"]["opened"], 0);
    assert!(store.get_active_incident("checkout-api").unwrap().is_none());

    let (status, _) = call(&router, "POST", "/api/v1/services/checkout-api/resume", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&router, "POST", "/api/v1/tick", None).await;
    assert_eq!(body["data"]["opened"], 1);
}

#[tokio::test]
async fn register_contact_and_service_over_api() {
    let (url, _) = health_stub().await;
    let (router, _) = daemon(&url).await;

    let (status, _) = call(
        &router,
        "POST",
        "/api/v1/contacts",
        Some(json!({ "id": "kim", "email": "kim@example.com", "phone": "+1 555 0199" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &router,
        "POST",
        "/api/v1/services",
        Some(json!({
            "id": "search",
            "health_url": url,
            "check_interval_minutes": 5,
            "recipients": { "developers": ["kim"], "head": "lee" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["check_interval_minutes"], 5);

    let (_, body) = call(&router, "GET", "/api/v1/services", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = call(&router, "DELETE", "/api/v1/services/search", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&router, "GET", "/api/v1/services/search", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn on_disk_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let (url, _) = health_stub().await;
    let mut config = config(&url);
    config.daemon.data_dir = dir.path().to_path_buf();

    {
        let store = vigild::open_store(&config).unwrap();
        store.create_incident("checkout-api", "down", 1_000).unwrap();
    }

    let store = vigild::open_store(&config).unwrap();
    assert!(store.get_active_incident("checkout-api").unwrap().is_some());
    assert_eq!(store.list_services().unwrap().len(), 1);
}
