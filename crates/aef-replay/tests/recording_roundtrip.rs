use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use aef_replay::{Player, Recorder, RecordingInfo, load_recording};
use aef_testing::{make_event, make_tool_event};
use aef_types::Event;
use serde_json::{Value, json};

fn record_session(path: &std::path::Path) -> Vec<Event> {
    let events = vec![
        Event::session_started("s1", "claude-sonnet-4-5", "claude"),
        make_tool_event("s1", "Bash", false),
        make_tool_event("s1", "Read", false),
        Event::session_ended("s1", "normal", 150),
    ];

    let mut recorder = Recorder::create(
        path,
        RecordingInfo {
            cli_version: "2.0.74".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            provider: "claude".to_string(),
            task: "demo".to_string(),
            capture_method: "test".to_string(),
            ..RecordingInfo::default()
        },
    );
    for (index, event) in events.iter().enumerate() {
        recorder.record_at(event, index as u64 * 50).unwrap();
    }
    recorder.finish().unwrap();

    events
}

#[tokio::test]
async fn recording_roundtrip_preserves_events_and_timing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");
    let recorded = record_session(&path);

    let player = Player::load(&path).unwrap();

    assert_eq!(player.metadata().event_count, 4);
    assert_eq!(player.metadata().duration_ms, 150);
    assert_eq!(player.session_id(), Some("s1"));

    // Fast replay: four events, effectively no wall-clock delay
    let emitted = Arc::new(Mutex::new(Vec::new()));
    let sink = emitted.clone();
    let started = Instant::now();
    let count = player
        .play(
            move |event| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(event);
                    Ok::<(), std::convert::Infallible>(())
                }
            },
            1e6,
        )
        .await
        .unwrap();

    assert_eq!(count, 4);
    assert!(started.elapsed().as_millis() < 10);

    let emitted = emitted.lock().unwrap();
    for (played, original) in emitted.iter().zip(&recorded) {
        assert!(played.get("_offset_ms").is_none());
        assert_eq!(played, &original.to_value().unwrap());
    }
}

#[tokio::test]
async fn infinite_speed_skips_all_sleeps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");

    let mut recorder = Recorder::create(&path, RecordingInfo::default());
    recorder.record_at(&make_event("s1"), 0).unwrap();
    recorder.record_at(&make_event("s1"), 60_000).unwrap();
    recorder.finish().unwrap();

    let player = Player::load(&path).unwrap();
    let started = Instant::now();
    let count = player
        .play(
            |_| async { Ok::<(), std::convert::Infallible>(()) },
            f64::INFINITY,
        )
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert!(started.elapsed().as_millis() < 10);
}

#[tokio::test]
async fn non_positive_speed_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");
    record_session(&path);

    let player = Player::load(&path).unwrap();
    let emit = |_| async { Ok::<(), std::convert::Infallible>(()) };

    assert!(player.play(emit, 0.0).await.is_err());
    assert!(player.play(emit, -1.0).await.is_err());
    assert!(player.play(emit, f64::NAN).await.is_err());
}

#[tokio::test]
async fn emit_error_aborts_replay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");
    record_session(&path);

    let player = Player::load(&path).unwrap();
    let calls = Arc::new(Mutex::new(0usize));
    let seen = calls.clone();

    let result = player
        .play(
            move |_| {
                let seen = seen.clone();
                async move {
                    let mut calls = seen.lock().unwrap();
                    *calls += 1;
                    if *calls == 2 {
                        Err("sink unavailable")
                    } else {
                        Ok(())
                    }
                }
            },
            f64::INFINITY,
        )
        .await;

    assert!(result.is_err());
    assert_eq!(*calls.lock().unwrap(), 2);
}

#[test]
fn instant_events_strip_timing_only_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");
    record_session(&path);

    let player = Player::load(&path).unwrap();

    let stripped = player.events(true);
    assert!(stripped.iter().all(|e| e.get("_offset_ms").is_none()));

    let timed = player.events(false);
    assert_eq!(timed[3]["_offset_ms"], 150);
}

#[test]
fn headerless_file_loads_with_version_zero_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "{}",
        json!({"event_type": "session_started", "session_id": "legacy-1", "context": {}})
    )
    .unwrap();
    writeln!(
        file,
        "{}",
        json!({"event_type": "tool_execution_started", "session_id": "legacy-1",
               "context": {"tool_name": "Bash"}})
    )
    .unwrap();

    let player = Player::load(&path).unwrap();

    assert_eq!(player.metadata().version, 0);
    assert_eq!(player.metadata().event_count, 2);
    assert_eq!(player.session_id(), Some("legacy-1"));

    // Schema version defaulted to 0, so the v0 migration ran
    let events = player.events(true);
    assert_eq!(events[0]["event_type"], "session.started");
    assert_eq!(events[1]["event_type"], "tool.execution_started");
    assert_eq!(events[1]["data"]["tool_name"], "Bash");
}

#[test]
fn current_schema_recordings_are_not_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");
    record_session(&path);

    let player = Player::load(&path).unwrap();
    let events = player.events(true);

    // Dotted names stay as written
    assert_eq!(events[0]["event_type"], "session.started");
    assert!(events[0].get("context").is_none());
}

#[test]
fn directory_recording_roundtrips_workspace_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("artifact-run");

    let mut recorder = Recorder::create(&path, RecordingInfo::default());
    recorder.record_at(&make_event("s1"), 0).unwrap();
    recorder.attach_workspace_file("artifacts/output/summary.md", b"# done".to_vec());
    recorder.attach_workspace_file("notes.txt", b"note".to_vec());
    recorder.finish().unwrap();

    let player = Player::load(&path).unwrap();

    assert!(player.has_workspace());
    let files = player.workspace_files();
    assert_eq!(files.len(), 2);
    assert_eq!(
        files.get("artifacts/output/summary.md").map(Vec::as_slice),
        Some(b"# done".as_slice())
    );
}

#[test]
fn file_recording_has_no_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");
    record_session(&path);

    let player = Player::load(&path).unwrap();
    assert!(!player.has_workspace());
    assert!(player.workspace_files().is_empty());
}

#[test]
fn missing_recording_is_not_found() {
    assert!(matches!(
        Player::load("/nonexistent/recording.jsonl"),
        Err(aef_replay::Error::NotFound(_))
    ));
}

#[test]
fn fixtures_resolve_by_name_with_env_override() {
    let dir = tempfile::tempdir().unwrap();
    record_session(&dir.path().join("v2.0.74_claude_list-files.jsonl"));
    record_session(&dir.path().join("v2.0.74_claude_multi-tool.jsonl"));

    // Serializes against other env-touching tests in this process
    unsafe {
        std::env::set_var("AGENTIC_RECORDINGS_DIR", dir.path());
    }

    let listed = aef_replay::list_recordings();
    assert_eq!(listed.len(), 2);

    let player = load_recording("list-files").unwrap();
    assert_eq!(player.len(), 4);

    // Substring shared by both recordings is ambiguous
    assert!(load_recording("claude").is_err());
    assert!(load_recording("does-not-exist").is_err());

    unsafe {
        std::env::remove_var("AGENTIC_RECORDINGS_DIR");
    }
}

#[test]
fn strip_timing_comparison_uses_value_equality() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");
    let recorded = record_session(&path);

    let player = Player::load(&path).unwrap();
    let values: Vec<Value> = recorded.iter().map(|e| e.to_value().unwrap()).collect();

    assert_eq!(player.events(true), values);
}
