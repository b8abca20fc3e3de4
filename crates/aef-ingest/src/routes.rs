use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use aef_backends::Backend;
use aef_engine::ToolNameCache;
use aef_types::Event;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

/// Sessions tracked for tool-name enrichment at any one time
const MAX_TRACKED_SESSIONS: usize = 256;

/// Per-session enrichment caches with oldest-session eviction.
///
/// Some producers emit tool results carrying only a `tool_use_id`; the
/// name recorded on the matching tool-call event is restored here before
/// persistence.
struct SessionCaches {
    caches: HashMap<String, ToolNameCache>,
    order: VecDeque<String>,
}

impl SessionCaches {
    fn new() -> Self {
        Self {
            caches: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn process(&mut self, event: &mut Event) {
        if !self.caches.contains_key(&event.session_id) {
            self.caches
                .insert(event.session_id.clone(), ToolNameCache::new());
            self.order.push_back(event.session_id.clone());
            if self.order.len() > MAX_TRACKED_SESSIONS
                && let Some(oldest) = self.order.pop_front()
            {
                self.caches.remove(&oldest);
            }
        }
        if let Some(cache) = self.caches.get_mut(&event.session_id) {
            cache.observe(event);
            cache.enrich(event);
        }
    }
}

#[derive(Clone)]
struct AppState {
    backend: Arc<dyn Backend>,
    caches: Arc<Mutex<SessionCaches>>,
}

/// Build the ingestion router over the given backend
pub fn router(backend: Arc<dyn Backend>) -> Router {
    Router::new()
        .route("/events", post(ingest_event))
        .route("/events/batch", post(ingest_batch))
        .route("/health", get(health))
        .with_state(AppState {
            backend,
            caches: Arc::new(Mutex::new(SessionCaches::new())),
        })
}

/// Serve the ingestion API on an already-bound listener
pub async fn serve(
    listener: tokio::net::TcpListener,
    backend: Arc<dyn Backend>,
) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "ingestion endpoint listening");
    axum::serve(listener, router(backend)).await
}

fn validate(payload: &Value) -> Result<Event, String> {
    let object = payload
        .as_object()
        .ok_or_else(|| "event must be a JSON object".to_string())?;

    if !object.get("event_type").is_some_and(Value::is_string) {
        return Err("missing required field: event_type".to_string());
    }
    let has_session = object
        .get("session_id")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    if !has_session {
        return Err("missing required field: session_id".to_string());
    }

    Event::from_value(payload).map_err(|e| e.to_string())
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
}

fn storage_failure(err: aef_backends::Error) -> Response {
    tracing::error!(%err, "backend write failed");
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({"error": "storage failure"})),
    )
        .into_response()
}

async fn ingest_event(State(state): State<AppState>, Json(payload): Json<Value>) -> Response {
    let mut event = match validate(&payload) {
        Ok(event) => event,
        Err(message) => return bad_request(message),
    };
    state.caches.lock().unwrap().process(&mut event);

    match state.backend.write(std::slice::from_ref(&event)).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({"event_id": event.event_id})),
        )
            .into_response(),
        Err(err) => storage_failure(err),
    }
}

async fn ingest_batch(State(state): State<AppState>, Json(payload): Json<Value>) -> Response {
    let Some(items) = payload.as_array() else {
        return bad_request("batch body must be a JSON array".to_string());
    };

    let mut events = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match validate(item) {
            Ok(event) => events.push(event),
            Err(message) => {
                return bad_request(format!("event {}: {}", index, message));
            }
        }
    }

    {
        let mut caches = state.caches.lock().unwrap();
        for event in &mut events {
            caches.process(event);
        }
    }

    match state.backend.write(&events).await {
        Ok(()) => {
            let event_ids: Vec<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
            (
                StatusCode::ACCEPTED,
                Json(json!({"count": events.len(), "event_ids": event_ids})),
            )
                .into_response()
        }
        Err(err) => storage_failure(err),
    }
}

async fn health(State(state): State<AppState>) -> Response {
    let backend_ok = state.backend.health_check().await;
    let status = if backend_ok { "ok" } else { "degraded" };
    (
        StatusCode::OK,
        Json(json!({"status": status, "backend_ok": backend_ok})),
    )
        .into_response()
}
