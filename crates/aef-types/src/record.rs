use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::event::{Event, EventType};

/// Outcome of a security evaluation over a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityDecision {
    Allow,
    Block,
    Warn,
}

impl SecurityDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityDecision::Allow => "allow",
            SecurityDecision::Block => "block",
            SecurityDecision::Warn => "warn",
        }
    }
}

/// Parameters for recording a tool call.
///
/// `tool_use_id` is auto-generated when absent so a later result event can
/// still be correlated with the call.
#[derive(Debug, Clone, Default)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub tool_input: Value,
    pub tool_use_id: Option<String>,
    pub tool_output: Option<String>,
    pub duration_ms: Option<u64>,
    pub blocked: bool,
    pub block_reason: Option<String>,
    pub hook_decision: Option<String>,
}

impl ToolCallRecord {
    pub fn new(tool_name: impl Into<String>, tool_input: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_input,
            ..Default::default()
        }
    }
}

impl Event {
    /// `session.started` with model and provider recorded in the payload
    pub fn session_started(
        session_id: impl Into<String>,
        model: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Event::new(EventType::SessionStarted, session_id)
            .with_entry("model", json!(model.into()))
            .with_entry("provider", json!(provider.into()))
    }

    /// `session.ended` with the exit reason and total duration
    pub fn session_ended(
        session_id: impl Into<String>,
        exit_reason: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Event::new(EventType::SessionEnded, session_id)
            .with_entry("exit_reason", json!(exit_reason.into()))
            .with_entry("duration_ms", json!(duration_ms))
    }

    /// `tokens.used` for one prompt/response interaction
    pub fn tokens_used(
        session_id: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
        duration_ms: u64,
    ) -> Self {
        Event::new(EventType::TokensUsed, session_id)
            .with_entry("input_tokens", json!(input_tokens))
            .with_entry("output_tokens", json!(output_tokens))
            .with_entry("total_tokens", json!(input_tokens + output_tokens))
            .with_entry("duration_ms", json!(duration_ms))
    }

    /// `tool.called` built from an explicit parameters struct
    pub fn tool_called(session_id: impl Into<String>, record: ToolCallRecord) -> Self {
        let tool_use_id = record
            .tool_use_id
            .unwrap_or_else(|| format!("toolu_{}", Uuid::new_v4().simple()));

        let mut data = Map::new();
        data.insert("tool_name".to_string(), json!(record.tool_name));
        data.insert("tool_input".to_string(), record.tool_input);
        if let Some(output) = record.tool_output {
            data.insert("tool_output".to_string(), json!(output));
        }
        if let Some(duration_ms) = record.duration_ms {
            data.insert("duration_ms".to_string(), json!(duration_ms));
        }
        data.insert("blocked".to_string(), json!(record.blocked));
        if let Some(reason) = record.block_reason {
            data.insert("block_reason".to_string(), json!(reason));
        }
        if let Some(decision) = record.hook_decision {
            data.insert("hook_decision".to_string(), json!(decision));
        }

        Event::new(EventType::ToolCalled, session_id)
            .with_tool_use_id(tool_use_id)
            .with_data(data)
    }

    /// `security_decision` with the validators that were run
    pub fn security_decision(
        session_id: impl Into<String>,
        tool_name: impl Into<String>,
        decision: SecurityDecision,
        reason: impl Into<String>,
        validators: &[&str],
    ) -> Self {
        let mut event = Event::new(EventType::SecurityDecision, session_id)
            .with_entry("tool_name", json!(tool_name.into()))
            .with_entry("decision", json!(decision.as_str()));
        let reason = reason.into();
        if !reason.is_empty() {
            event = event.with_entry("reason", json!(reason));
        }
        if !validators.is_empty() {
            event = event.with_entry("validators", json!(validators));
        }
        event
    }

    /// `git.commit` with message preview, sha and branch
    pub fn git_commit(
        session_id: impl Into<String>,
        message: &str,
        sha: &str,
        branch: &str,
    ) -> Self {
        let mut event = Event::new(EventType::GitCommit, session_id)
            .with_entry("operation", json!("commit"));
        if !message.is_empty() {
            let preview: String = message.chars().take(200).collect();
            event = event.with_entry("message", json!(preview));
        }
        if !sha.is_empty() {
            event = event.with_entry("sha", json!(sha));
        }
        if !branch.is_empty() {
            event = event.with_entry("branch", json!(branch));
        }
        event
    }

    /// `git.push` to a remote/branch
    pub fn git_push(session_id: impl Into<String>, remote: &str, branch: &str) -> Self {
        Event::new(EventType::GitPush, session_id)
            .with_entry("operation", json!("push"))
            .with_entry("remote", json!(remote))
            .with_entry("branch", json!(branch))
    }

    /// `git.branch_changed` between two branches
    pub fn git_branch_changed(
        session_id: impl Into<String>,
        from_branch: &str,
        to_branch: &str,
    ) -> Self {
        Event::new(EventType::GitBranchChanged, session_id)
            .with_entry("operation", json!("branch_change"))
            .with_entry("from_branch", json!(from_branch))
            .with_entry("to_branch", json!(to_branch))
    }

    /// `git.operation` for subcommands without a dedicated constructor
    /// (pull, merge, stash, rebase, ...)
    pub fn git_operation(session_id: impl Into<String>, operation: &str, details: &str) -> Self {
        let mut event = Event::new(EventType::GitOperation, session_id)
            .with_entry("operation", json!(operation));
        if !details.is_empty() {
            let preview: String = details.chars().take(500).collect();
            event = event.with_entry("details", json!(preview));
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_called_generates_tool_use_id_when_absent() {
        let event = Event::tool_called(
            "s1",
            ToolCallRecord::new("Write", json!({"file_path": "app.py"})),
        );

        let id = event.tool_use_id.as_deref().unwrap();
        assert!(id.starts_with("toolu_"));
        assert_eq!(event.data["tool_name"], json!("Write"));
        assert_eq!(event.data["blocked"], json!(false));
        assert!(!event.data.contains_key("block_reason"));
    }

    #[test]
    fn tool_called_keeps_supplied_tool_use_id() {
        let record = ToolCallRecord {
            tool_use_id: Some("toolu_fixed".to_string()),
            blocked: true,
            block_reason: Some("dangerous path".to_string()),
            ..ToolCallRecord::new("Bash", json!({"command": "rm -rf /"}))
        };
        let event = Event::tool_called("s1", record);

        assert_eq!(event.tool_use_id.as_deref(), Some("toolu_fixed"));
        assert_eq!(event.data["blocked"], json!(true));
        assert_eq!(event.data["block_reason"], json!("dangerous path"));
    }

    #[test]
    fn security_decision_omits_empty_reason() {
        let event = Event::security_decision(
            "s1",
            "Bash",
            SecurityDecision::Allow,
            "",
            &["pii", "secrets"],
        );

        assert_eq!(event.data["decision"], json!("allow"));
        assert!(!event.data.contains_key("reason"));
        assert_eq!(event.data["validators"], json!(["pii", "secrets"]));
    }

    #[test]
    fn git_commit_truncates_long_messages() {
        let long = "x".repeat(500);
        let event = Event::git_commit("s1", &long, "abc123", "main");
        assert_eq!(event.data["message"].as_str().unwrap().len(), 200);
        assert_eq!(event.data["operation"], json!("commit"));
    }
}
