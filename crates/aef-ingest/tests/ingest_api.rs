use std::sync::Arc;

use aef_backends::{Backend, NullBackend, Result as BackendResult};
use aef_ingest::router;
use aef_testing::test_environment;
use aef_types::Event;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn send(
    router: axum::Router,
    method: &str,
    uri: &str,
    body: Value,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn single_event_is_accepted_and_persisted() {
    let _env = test_environment();
    let backend = Arc::new(NullBackend::new().unwrap());
    let app = router(backend.clone());

    let (status, body) = send(
        app,
        "POST",
        "/events",
        json!({"event_type": "session.started", "session_id": "s1"}),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let event_id = body["event_id"].as_str().unwrap();
    assert_eq!(event_id.len(), 36);

    let stored = backend.events_received();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].event_id, event_id);
    assert_eq!(stored[0].session_id, "s1");
}

#[tokio::test]
async fn supplied_event_id_is_kept() {
    let _env = test_environment();
    let backend = Arc::new(NullBackend::new().unwrap());
    let app = router(backend.clone());

    let (status, body) = send(
        app,
        "POST",
        "/events",
        json!({
            "event_type": "tool.called",
            "session_id": "s1",
            "event_id": "11111111-2222-3333-4444-555555555555",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["event_id"], "11111111-2222-3333-4444-555555555555");
}

#[tokio::test]
async fn missing_session_id_is_rejected() {
    let _env = test_environment();
    let backend = Arc::new(NullBackend::new().unwrap());
    let app = router(backend.clone());

    let (status, body) = send(
        app,
        "POST",
        "/events",
        json!({"event_type": "session.started"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("session_id"));
    assert!(backend.is_empty());
}

#[tokio::test]
async fn empty_session_id_is_rejected() {
    let _env = test_environment();
    let backend = Arc::new(NullBackend::new().unwrap());
    let app = router(backend);

    let (status, _) = send(
        app,
        "POST",
        "/events",
        json!({"event_type": "session.started", "session_id": ""}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_event_type_is_rejected() {
    let _env = test_environment();
    let backend = Arc::new(NullBackend::new().unwrap());
    let app = router(backend);

    let (status, body) = send(app, "POST", "/events", json!({"session_id": "s1"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("event_type"));
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let _env = test_environment();
    let backend = Arc::new(NullBackend::new().unwrap());
    let app = router(backend);

    let request = Request::builder()
        .method("POST")
        .uri("/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn batch_is_persisted_as_one_write() {
    let _env = test_environment();
    let backend = Arc::new(NullBackend::new().unwrap());
    let app = router(backend.clone());

    let (status, body) = send(
        app,
        "POST",
        "/events/batch",
        json!([
            {"event_type": "session.started", "session_id": "s1"},
            {"event_type": "tokens.used", "session_id": "s1"},
            {"event_type": "session.ended", "session_id": "s1"},
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["count"], 3);
    assert_eq!(body["event_ids"].as_array().unwrap().len(), 3);
    assert_eq!(backend.len(), 3);
}

#[tokio::test]
async fn batch_with_one_invalid_event_is_rejected_whole() {
    let _env = test_environment();
    let backend = Arc::new(NullBackend::new().unwrap());
    let app = router(backend.clone());

    let (status, body) = send(
        app,
        "POST",
        "/events/batch",
        json!([
            {"event_type": "session.started", "session_id": "s1"},
            {"event_type": "tokens.used"},
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("event 1"));
    assert!(backend.is_empty());
}

#[tokio::test]
async fn batch_must_be_an_array() {
    let _env = test_environment();
    let backend = Arc::new(NullBackend::new().unwrap());
    let app = router(backend);

    let (status, _) = send(
        app,
        "POST",
        "/events/batch",
        json!({"event_type": "session.started", "session_id": "s1"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn storage_failure_maps_to_bad_gateway() {
    struct BrokenBackend;

    #[async_trait::async_trait]
    impl Backend for BrokenBackend {
        async fn write(&self, _batch: &[Event]) -> BackendResult<()> {
            Err(aef_backends::Error::Io(std::io::Error::other("disk full")))
        }

        async fn close(&self) -> BackendResult<()> {
            Ok(())
        }

        async fn health_check(&self) -> bool {
            false
        }
    }

    let app = router(Arc::new(BrokenBackend));

    let (status, _) = send(
        app.clone(),
        "POST",
        "/events",
        json!({"event_type": "session.started", "session_id": "s1"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, body) = send(app, "GET", "/health", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend_ok"], false);
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn tool_results_are_enriched_with_cached_tool_name() {
    let _env = test_environment();
    let backend = Arc::new(NullBackend::new().unwrap());
    let app = router(backend.clone());

    let (status, _) = send(
        app.clone(),
        "POST",
        "/events/batch",
        json!([
            {
                "event_type": "tool.execution_started",
                "session_id": "s1",
                "tool_use_id": "toolu_42",
                "data": {"tool_name": "Bash"},
            },
            {
                "event_type": "tool.execution_completed",
                "session_id": "s1",
                "tool_use_id": "toolu_42",
                "data": {"success": true},
            },
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let stored = backend.events_received();
    assert_eq!(stored.len(), 2);
    // The result event arrived without a tool name; the per-session cache
    // restored it from the start event
    assert_eq!(stored[1].data["tool_name"], "Bash");
    assert_eq!(stored[1].data["success"], true);
}

#[tokio::test]
async fn enrichment_is_scoped_per_session() {
    let _env = test_environment();
    let backend = Arc::new(NullBackend::new().unwrap());
    let app = router(backend.clone());

    let (status, _) = send(
        app,
        "POST",
        "/events/batch",
        json!([
            {
                "event_type": "tool.execution_started",
                "session_id": "s1",
                "tool_use_id": "toolu_42",
                "data": {"tool_name": "Bash"},
            },
            {
                "event_type": "tool.execution_completed",
                "session_id": "other-session",
                "tool_use_id": "toolu_42",
                "data": {},
            },
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let stored = backend.events_received();
    assert!(!stored[1].data.contains_key("tool_name"));
}

#[tokio::test]
async fn health_reports_ok_backend() {
    let _env = test_environment();
    let backend = Arc::new(NullBackend::new().unwrap());
    let app = router(backend);

    let (status, body) = send(app, "GET", "/health", Value::Null).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend_ok"], true);
}
