use std::collections::{HashMap, VecDeque};

use aef_types::{Event, EventType};
use serde_json::{Value, json};

const DEFAULT_CAPACITY: usize = 1024;

/// Bounded LRU map from `tool_use_id` to tool name.
///
/// Some providers emit tool results carrying only a `tool_use_id`. The
/// cache is populated from tool-start events and consulted on results to
/// restore the missing name. One cache per session; eviction keeps the
/// most recently touched entries.
#[derive(Debug)]
pub struct ToolNameCache {
    capacity: usize,
    names: HashMap<String, String>,
    order: VecDeque<String>,
}

impl Default for ToolNameCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ToolNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            names: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn insert(&mut self, tool_use_id: impl Into<String>, tool_name: impl Into<String>) {
        let tool_use_id = tool_use_id.into();

        if self.names.insert(tool_use_id.clone(), tool_name.into()).is_some() {
            self.touch(&tool_use_id);
            return;
        }

        self.order.push_back(tool_use_id);
        if self.names.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.names.remove(&oldest);
        }
    }

    pub fn get(&mut self, tool_use_id: &str) -> Option<&str> {
        if self.names.contains_key(tool_use_id) {
            self.touch(tool_use_id);
        }
        self.names.get(tool_use_id).map(String::as_str)
    }

    fn touch(&mut self, tool_use_id: &str) {
        if let Some(position) = self.order.iter().position(|id| id == tool_use_id) {
            self.order.remove(position);
            self.order.push_back(tool_use_id.to_string());
        }
    }

    /// Record the tool name of a tool-start event
    pub fn observe(&mut self, event: &Event) {
        let is_start = matches!(
            event.event_type,
            EventType::ToolCalled | EventType::ToolExecutionStarted
        );
        if !is_start {
            return;
        }

        if let (Some(tool_use_id), Some(tool_name)) = (
            event.tool_use_id.as_deref(),
            event.data.get("tool_name").and_then(Value::as_str),
        ) {
            self.insert(tool_use_id, tool_name);
        }
    }

    /// Fill in a missing `tool_name` on a tool-result event
    pub fn enrich(&mut self, event: &mut Event) {
        let is_result = matches!(
            event.event_type,
            EventType::ToolExecutionCompleted | EventType::ToolExecutionFailed
        );
        if !is_result || event.data.contains_key("tool_name") {
            return;
        }

        let Some(tool_use_id) = event.tool_use_id.clone() else {
            return;
        };
        if let Some(name) = self.get(&tool_use_id) {
            let name = name.to_string();
            event.data.insert("tool_name".to_string(), json!(name));
        }
    }
}
