use aef_types::{Event, EventType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Per-million-token pricing used for cost estimation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input_per_1m_tokens: f64,
    pub output_per_1m_tokens: f64,
}

impl ModelRates {
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1e6) * self.input_per_1m_tokens
            + (output_tokens as f64 / 1e6) * self.output_per_1m_tokens
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialised,
    Active,
    Ended,
}

/// Aggregate metrics for one agent session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    pub cost_estimate: f64,
    pub interaction_count: u64,
    pub tool_call_count: u64,
    pub tool_calls_blocked: u64,
    pub total_duration_ms: u64,
    pub avg_tokens_per_interaction: f64,
    pub tokens_per_second: f64,
    pub exit_reason: Option<String>,
}

/// Counter bundle scoped to a single session, driven by its event stream.
///
/// State machine: Uninitialised → Active (`session.started`) → Ended
/// (`session.ended` / `session.completed`). Re-entering a terminal state is
/// an error; all totals are monotonically non-decreasing while the session
/// is live.
#[derive(Debug)]
pub struct SessionAggregator {
    session_id: String,
    state: SessionState,
    rates: ModelRates,
    model: Option<String>,
    provider: Option<String>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    input_tokens: u64,
    output_tokens: u64,
    interaction_count: u64,
    tool_call_count: u64,
    tool_calls_blocked: u64,
    total_duration_ms: u64,
    cost_estimate: f64,
    exit_reason: Option<String>,
}

impl SessionAggregator {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: SessionState::Uninitialised,
            rates: ModelRates::default(),
            model: None,
            provider: None,
            started_at: None,
            ended_at: None,
            input_tokens: 0,
            output_tokens: 0,
            interaction_count: 0,
            tool_call_count: 0,
            tool_calls_blocked: 0,
            total_duration_ms: 0,
            cost_estimate: 0.0,
            exit_reason: None,
        }
    }

    /// Fallback pricing when the `session.started` payload carries none
    pub fn with_rates(mut self, rates: ModelRates) -> Self {
        self.rates = rates;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Fold one event into the aggregate
    pub fn apply(&mut self, event: &Event) -> Result<()> {
        if event.session_id != self.session_id {
            return Err(Error::SessionMismatch {
                expected: self.session_id.clone(),
                actual: event.session_id.clone(),
            });
        }

        match &event.event_type {
            EventType::SessionStarted => self.on_started(event),
            EventType::TokensUsed => self.on_tokens(event),
            EventType::ToolCalled => self.on_tool_called(event),
            EventType::SessionEnded | EventType::SessionCompleted => self.on_ended(event),
            _ => Ok(()),
        }
    }

    fn ensure_not_ended(&self, what: &str) -> Result<()> {
        if self.state == SessionState::Ended {
            return Err(Error::InvalidTransition(format!(
                "{} after session ended",
                what
            )));
        }
        Ok(())
    }

    fn on_started(&mut self, event: &Event) -> Result<()> {
        match self.state {
            SessionState::Uninitialised => {}
            SessionState::Active => {
                return Err(Error::InvalidTransition(
                    "session.started for an already active session".to_string(),
                ));
            }
            SessionState::Ended => {
                return Err(Error::InvalidTransition(
                    "session.started after session ended".to_string(),
                ));
            }
        }

        self.state = SessionState::Active;
        self.started_at = Some(event.timestamp);
        self.model = data_string(event, "model");
        self.provider = data_string(event, "provider");

        if let Some(pricing) = event.data.get("pricing") {
            if let Some(input) = pricing.get("input_per_1m_tokens").and_then(Value::as_f64) {
                self.rates.input_per_1m_tokens = input;
            }
            if let Some(output) = pricing.get("output_per_1m_tokens").and_then(Value::as_f64) {
                self.rates.output_per_1m_tokens = output;
            }
        }
        Ok(())
    }

    fn on_tokens(&mut self, event: &Event) -> Result<()> {
        self.ensure_not_ended("tokens.used")?;

        self.input_tokens += data_u64(event, "input_tokens");
        self.output_tokens += data_u64(event, "output_tokens");
        self.total_duration_ms += data_u64(event, "duration_ms");
        self.interaction_count += 1;
        Ok(())
    }

    fn on_tool_called(&mut self, event: &Event) -> Result<()> {
        self.ensure_not_ended("tool.called")?;

        self.tool_call_count += 1;
        if event.data.get("blocked").and_then(Value::as_bool) == Some(true) {
            self.tool_calls_blocked += 1;
        }
        Ok(())
    }

    fn on_ended(&mut self, event: &Event) -> Result<()> {
        if self.state == SessionState::Ended {
            return Err(Error::InvalidTransition(
                "session ended twice".to_string(),
            ));
        }

        self.state = SessionState::Ended;
        self.ended_at = Some(event.timestamp);
        self.exit_reason = data_string(event, "exit_reason");
        if let Some(duration) = event.data.get("duration_ms").and_then(Value::as_u64) {
            self.total_duration_ms = self.total_duration_ms.max(duration);
        }
        self.cost_estimate = self.rates.cost(self.input_tokens, self.output_tokens);
        Ok(())
    }

    pub fn summary(&self) -> SessionSummary {
        let total_tokens = self.input_tokens + self.output_tokens;

        let avg_tokens_per_interaction = if self.interaction_count == 0 {
            0.0
        } else {
            total_tokens as f64 / self.interaction_count as f64
        };

        let tokens_per_second = if self.total_duration_ms == 0 {
            0.0
        } else {
            total_tokens as f64 / (self.total_duration_ms as f64 / 1000.0)
        };

        SessionSummary {
            session_id: self.session_id.clone(),
            model: self.model.clone(),
            provider: self.provider.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            total_input_tokens: self.input_tokens,
            total_output_tokens: self.output_tokens,
            total_tokens,
            cost_estimate: self.cost_estimate,
            interaction_count: self.interaction_count,
            tool_call_count: self.tool_call_count,
            tool_calls_blocked: self.tool_calls_blocked,
            total_duration_ms: self.total_duration_ms,
            avg_tokens_per_interaction,
            tokens_per_second,
            exit_reason: self.exit_reason.clone(),
        }
    }

    /// Rebuild a summary from an already-recorded event slice
    pub fn from_events(session_id: impl Into<String>, events: &[Event]) -> Result<SessionSummary> {
        let mut aggregator = Self::new(session_id);
        for event in events {
            aggregator.apply(event)?;
        }
        Ok(aggregator.summary())
    }
}

fn data_string(event: &Event, key: &str) -> Option<String> {
    event.data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn data_u64(event: &Event, key: &str) -> u64 {
    event.data.get(key).and_then(Value::as_u64).unwrap_or(0)
}
