use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Type of pipeline event.
///
/// The canonical vocabulary is closed; producers with bespoke needs use
/// [`EventType::Custom`], which survives (de)serialization as an opaque
/// string so newer producers never break older consumers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    // Session lifecycle
    SessionStarted,
    SessionEnded,
    SessionCompleted,

    // Tokens
    TokensUsed,

    // Tools
    ToolCalled,
    ToolExecutionStarted,
    ToolExecutionCompleted,
    ToolBlocked,
    ToolExecutionFailed,

    // Security
    SecurityDecision,

    // User interaction
    UserPromptSubmitted,
    PermissionRequested,

    // System
    Notification,
    ContextCompacted,
    AgentStopped,
    SubagentStopped,

    // Git operations
    GitCommit,
    GitPush,
    GitMerge,
    GitRewrite,
    GitBranchChanged,
    GitOperation,

    /// Any event type outside the canonical vocabulary
    Custom(String),
}

impl EventType {
    /// String representation used on the wire
    pub fn as_str(&self) -> &str {
        match self {
            EventType::SessionStarted => "session.started",
            EventType::SessionEnded => "session.ended",
            EventType::SessionCompleted => "session.completed",
            EventType::TokensUsed => "tokens.used",
            EventType::ToolCalled => "tool.called",
            EventType::ToolExecutionStarted => "tool.execution_started",
            EventType::ToolExecutionCompleted => "tool.execution_completed",
            EventType::ToolBlocked => "tool.blocked",
            EventType::ToolExecutionFailed => "tool.execution_failed",
            EventType::SecurityDecision => "security_decision",
            EventType::UserPromptSubmitted => "user.prompt_submitted",
            EventType::PermissionRequested => "permission.requested",
            EventType::Notification => "notification",
            EventType::ContextCompacted => "context_compacted",
            EventType::AgentStopped => "agent_stopped",
            EventType::SubagentStopped => "subagent_stopped",
            EventType::GitCommit => "git.commit",
            EventType::GitPush => "git.push",
            EventType::GitMerge => "git.merge",
            EventType::GitRewrite => "git.rewrite",
            EventType::GitBranchChanged => "git.branch_changed",
            EventType::GitOperation => "git.operation",
            EventType::Custom(s) => s.as_str(),
        }
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "session.started" => EventType::SessionStarted,
            "session.ended" => EventType::SessionEnded,
            "session.completed" => EventType::SessionCompleted,
            "tokens.used" => EventType::TokensUsed,
            "tool.called" => EventType::ToolCalled,
            "tool.execution_started" => EventType::ToolExecutionStarted,
            "tool.execution_completed" => EventType::ToolExecutionCompleted,
            "tool.blocked" => EventType::ToolBlocked,
            "tool.execution_failed" => EventType::ToolExecutionFailed,
            "security_decision" => EventType::SecurityDecision,
            "user.prompt_submitted" => EventType::UserPromptSubmitted,
            "permission.requested" => EventType::PermissionRequested,
            "notification" => EventType::Notification,
            "context_compacted" => EventType::ContextCompacted,
            "agent_stopped" => EventType::AgentStopped,
            "subagent_stopped" => EventType::SubagentStopped,
            "git.commit" => EventType::GitCommit,
            "git.push" => EventType::GitPush,
            "git.merge" => EventType::GitMerge,
            "git.rewrite" => EventType::GitRewrite,
            "git.branch_changed" => EventType::GitBranchChanged,
            "git.operation" => EventType::GitOperation,
            other => EventType::Custom(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        EventType::from(s.as_str())
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EventType::from(s))
    }
}

/// A single observation emitted by an agent runtime.
///
/// Events are created by a producer, owned by the client until flushed,
/// handed to a backend for the write, then released. `event_id` is assigned
/// at construction and never changes; `timestamp` defaults to emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique identifier (UUID v4), generated at construction
    pub event_id: String,

    pub event_type: EventType,

    /// UTC instant with sub-second precision (RFC 3339 on the wire)
    pub timestamp: DateTime<Utc>,

    /// Groups all events of one agent run. Required; an empty string means
    /// the producer did not supply one and downstream validation applies.
    pub session_id: String,

    /// Nests the session into a larger orchestration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<String>,

    /// Links a tool-result event back to its tool-call event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,

    /// Payload specific to `event_type`
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Event {
    pub fn new(event_type: EventType, session_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            session_id: session_id.into(),
            workflow_id: None,
            phase_id: None,
            milestone_id: None,
            tool_use_id: None,
            data: Map::new(),
        }
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_phase_id(mut self, phase_id: impl Into<String>) -> Self {
        self.phase_id = Some(phase_id.into());
        self
    }

    pub fn with_milestone_id(mut self, milestone_id: impl Into<String>) -> Self {
        self.milestone_id = Some(milestone_id.into());
        self
    }

    pub fn with_tool_use_id(mut self, tool_use_id: impl Into<String>) -> Self {
        self.tool_use_id = Some(tool_use_id.into());
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Insert a single payload entry
    pub fn with_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Serialize to a JSON object. Optional fields that are unset do not
    /// appear in the output.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Build an event from a JSON object.
    ///
    /// Unknown `event_type` strings survive as [`EventType::Custom`]. A
    /// missing `session_id` defaults to the empty string (callers validate
    /// downstream). `event_id` and `timestamp` are regenerated only when
    /// absent from the input.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| Error::Validation("event must be a JSON object".to_string()))?;

        let event_type = map
            .get("event_type")
            .and_then(Value::as_str)
            .map(EventType::from)
            .ok_or_else(|| Error::Validation("missing or non-string event_type".to_string()))?;

        let event_id = match map.get("event_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let timestamp = match map.get("timestamp") {
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map_err(|e| Error::Validation(format!("invalid timestamp '{}': {}", s, e)))?
                .with_timezone(&Utc),
            Some(other) => {
                return Err(Error::Validation(format!(
                    "timestamp must be an RFC 3339 string, got {}",
                    other
                )));
            }
            None => Utc::now(),
        };

        let session_id = map
            .get("session_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let opt_string = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        };

        let data = match map.get("data") {
            Some(Value::Object(m)) => m.clone(),
            _ => Map::new(),
        };

        Ok(Self {
            event_id,
            event_type,
            timestamp,
            session_id,
            workflow_id: opt_string("workflow_id"),
            phase_id: opt_string("phase_id"),
            milestone_id: opt_string("milestone_id"),
            tool_use_id: opt_string("tool_use_id"),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_event_has_unique_id_and_recent_timestamp() {
        let before = Utc::now();
        let events: Vec<Event> = (0..100)
            .map(|_| Event::new(EventType::SessionStarted, "s1"))
            .collect();
        let after = Utc::now();

        let ids: std::collections::HashSet<&str> =
            events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids.len(), 100);

        for event in &events {
            assert!(before <= event.timestamp && event.timestamp <= after);
            assert_eq!(event.event_id.len(), 36);
        }
    }

    #[test]
    fn event_type_roundtrips_through_strings() {
        assert_eq!(EventType::from("session.started"), EventType::SessionStarted);
        assert_eq!(EventType::from("tokens.used"), EventType::TokensUsed);
        assert_eq!(EventType::ToolCalled.as_str(), "tool.called");
        assert_eq!(
            EventType::from("my_custom_type"),
            EventType::Custom("my_custom_type".to_string())
        );
        assert_eq!(
            EventType::Custom("my_custom_type".to_string()).as_str(),
            "my_custom_type"
        );
    }

    #[test]
    fn serialization_omits_unset_optional_fields() {
        let event = Event::new(EventType::SessionStarted, "session-123");
        let value = event.to_value().unwrap();
        let map = value.as_object().unwrap();

        assert_eq!(map.get("event_type"), Some(&json!("session.started")));
        assert_eq!(map.get("session_id"), Some(&json!("session-123")));
        assert!(!map.contains_key("workflow_id"));
        assert!(!map.contains_key("phase_id"));
        assert!(!map.contains_key("tool_use_id"));
        assert!(map.get("timestamp").unwrap().is_string());
    }

    #[test]
    fn serialization_includes_set_optional_fields() {
        let event = Event::new(EventType::ToolExecutionStarted, "session-123")
            .with_workflow_id("workflow-456")
            .with_phase_id("phase-1")
            .with_milestone_id("milestone-1")
            .with_entry("tool_name", json!("Write"));

        let value = event.to_value().unwrap();
        assert_eq!(value["workflow_id"], json!("workflow-456"));
        assert_eq!(value["phase_id"], json!("phase-1"));
        assert_eq!(value["milestone_id"], json!("milestone-1"));
        assert_eq!(value["data"]["tool_name"], json!("Write"));
    }

    #[test]
    fn from_value_roundtrip_preserves_fields() {
        let original = Event::new(EventType::ToolExecutionCompleted, "session-123")
            .with_workflow_id("workflow-456")
            .with_tool_use_id("toolu_abc")
            .with_entry("result", json!("success"))
            .with_entry("count", json!(42));

        let value = original.to_value().unwrap();
        let restored = Event::from_value(&value).unwrap();

        assert_eq!(restored, original);
    }

    #[test]
    fn from_value_generates_missing_id_and_timestamp() {
        let value = json!({
            "event_type": "session.started",
            "session_id": "session-123",
        });

        let event = Event::from_value(&value).unwrap();
        assert_eq!(event.event_id.len(), 36);
        assert_eq!(event.session_id, "session-123");
    }

    #[test]
    fn from_value_defaults_missing_session_id_to_empty() {
        let value = json!({"event_type": "session.started"});

        let event = Event::from_value(&value).unwrap();
        assert_eq!(event.session_id, "");
        assert!(event.data.is_empty());
    }

    #[test]
    fn from_value_parses_rfc3339_timestamp() {
        let value = json!({
            "event_type": "session.started",
            "session_id": "s1",
            "timestamp": "2025-12-01T10:30:00+00:00",
        });

        let event = Event::from_value(&value).unwrap();
        assert_eq!(event.timestamp.to_rfc3339(), "2025-12-01T10:30:00+00:00");
    }

    #[test]
    fn from_value_rejects_non_object() {
        assert!(Event::from_value(&json!([1, 2, 3])).is_err());
        assert!(Event::from_value(&json!({"session_id": "s1"})).is_err());
    }

    #[test]
    fn from_value_keeps_unknown_event_type() {
        let value = json!({"event_type": "vendor.special", "session_id": "s1"});
        let event = Event::from_value(&value).unwrap();
        assert_eq!(event.event_type.as_str(), "vendor.special");
    }
}
