use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde_json::{Value, json};

/// Schema version written by the current [`crate::Recorder`]
pub const CURRENT_EVENT_SCHEMA_VERSION: u32 = 1;

/// Pure function mapping a version-N event to version N+1
pub type Migration = fn(Value) -> Value;

/// Catalog of event schema migrations, keyed by source version.
///
/// The player chains registered migrations in ascending version order until
/// the current schema is reached; versions with no registered migration
/// pass events through unchanged.
pub struct MigrationRegistry {
    migrations: BTreeMap<u32, Migration>,
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(0, migrate_v0_to_v1);
        registry
    }
}

impl MigrationRegistry {
    pub fn empty() -> Self {
        Self {
            migrations: BTreeMap::new(),
        }
    }

    /// Register the migration from `from_version` to `from_version + 1`
    pub fn register(&mut self, from_version: u32, migration: Migration) {
        self.migrations.insert(from_version, migration);
    }

    /// Migrate one event from `from_version` up to the current schema
    pub fn migrate(&self, mut event: Value, from_version: u32) -> Value {
        for version in from_version..CURRENT_EVENT_SCHEMA_VERSION {
            if let Some(migration) = self.migrations.get(&version) {
                event = migration(event);
            }
        }
        event
    }
}

/// Process-wide registry with the standard migrations installed
pub fn registry() -> &'static MigrationRegistry {
    static REGISTRY: OnceLock<MigrationRegistry> = OnceLock::new();
    REGISTRY.get_or_init(MigrationRegistry::default)
}

/// v0 recordings were captured from the stdout emitter era: payloads lived
/// under `context` and event types used flat snake_case names.
fn migrate_v0_to_v1(mut event: Value) -> Value {
    let Some(object) = event.as_object_mut() else {
        return event;
    };

    if !object.contains_key("data")
        && let Some(context) = object.remove("context")
    {
        object.insert("data".to_string(), context);
    }

    if let Some(legacy) = object.get("event_type").and_then(Value::as_str)
        && let Some(current) = legacy_event_type(legacy)
    {
        object.insert("event_type".to_string(), json!(current));
    }

    event
}

fn legacy_event_type(name: &str) -> Option<&'static str> {
    Some(match name {
        "session_started" => "session.started",
        "session_ended" => "session.ended",
        "session_completed" => "session.completed",
        "tokens_used" => "tokens.used",
        "tool_called" => "tool.called",
        "tool_execution_started" => "tool.execution_started",
        "tool_execution_completed" => "tool.execution_completed",
        "tool_blocked" => "tool.blocked",
        "tool_execution_failed" => "tool.execution_failed",
        "user_prompt_submitted" => "user.prompt_submitted",
        "permission_requested" => "permission.requested",
        "system_notification" => "notification",
        "git_commit" => "git.commit",
        "git_push" => "git.push",
        "git_merge" => "git.merge",
        "git_rewrite" => "git.rewrite",
        "git_branch_changed" => "git.branch_changed",
        "git_operation" => "git.operation",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v0_context_becomes_data() {
        let legacy = json!({
            "event_type": "tool_execution_started",
            "session_id": "s1",
            "context": {"tool_name": "Bash", "tool_use_id": "toolu_1"},
        });

        let current = registry().migrate(legacy, 0);

        assert_eq!(current["event_type"], "tool.execution_started");
        assert_eq!(current["data"]["tool_name"], "Bash");
        assert!(current.get("context").is_none());
    }

    #[test]
    fn current_events_pass_through_unchanged() {
        let event = json!({
            "event_type": "session.started",
            "session_id": "s1",
            "data": {"model": "claude"},
        });

        let migrated = registry().migrate(event.clone(), CURRENT_EVENT_SCHEMA_VERSION);
        assert_eq!(migrated, event);
    }

    #[test]
    fn unknown_legacy_types_are_kept_verbatim() {
        let event = json!({"event_type": "vendor_special", "context": {}});
        let migrated = registry().migrate(event, 0);
        assert_eq!(migrated["event_type"], "vendor_special");
    }

    #[test]
    fn empty_registry_is_identity() {
        let registry = MigrationRegistry::empty();
        let event = json!({"event_type": "session_started", "context": {}});
        assert_eq!(registry.migrate(event.clone(), 0), event);
    }

    #[test]
    fn existing_data_wins_over_context() {
        let event = json!({
            "event_type": "notification",
            "data": {"keep": true},
            "context": {"discard": true},
        });

        let migrated = registry().migrate(event, 0);
        assert_eq!(migrated["data"]["keep"], true);
    }
}
