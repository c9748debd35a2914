use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{PromptabError, PromptabResult};

pub type Metadata = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }

    /// Allowed moves are active -> completed and active -> aborted.
    /// Staying in the current status is always allowed.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        *self == next
            || matches!(
                (self, next),
                (SessionStatus::Active, SessionStatus::Completed)
                    | (SessionStatus::Active, SessionStatus::Aborted)
            )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = PromptabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(SessionStatus::Active),
            "completed" | "complete" => Ok(SessionStatus::Completed),
            "aborted" | "abort" => Ok(SessionStatus::Aborted),
            other => Err(PromptabError::ValidationError(format!(
                "unknown session status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Metadata,
    pub turns: u64,
    pub status: SessionStatus,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub traces: Vec<String>,
}

impl Session {
    pub fn new(metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            metadata,
            turns: 0,
            status: SessionStatus::Active,
            total_tokens: 0,
            total_cost: 0.0,
            traces: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn record_usage(&mut self, tokens: u64, cost: f64, trace_id: Option<&str>) {
        self.total_tokens = self.total_tokens.saturating_add(tokens);
        self.total_cost += cost;

        if let Some(trace_id) = trace_id {
            if !self.traces.iter().any(|t| t == trace_id) {
                self.traces.push(trace_id.to_string());
            }
        }

        self.touch();
    }

    pub fn increment_turn(&mut self) {
        self.turns = self.turns.saturating_add(1);
        self.touch();
    }

    pub fn transition_to(&mut self, next: SessionStatus) -> PromptabResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(PromptabError::InvalidSessionStatusTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        self.status = next;
        Ok(())
    }

    /// Applies an update atomically: nothing changes if the status move is
    /// rejected.
    pub fn apply_update(&mut self, update: SessionUpdate) -> PromptabResult<()> {
        if let Some(status) = update.status {
            self.transition_to(status)?;
        }

        if let Some(metadata) = update.metadata {
            for (key, value) in metadata {
                self.metadata.insert(key, value);
            }
        }

        self.touch();
        Ok(())
    }

    pub fn matches_metadata(&self, criteria: &Metadata) -> bool {
        criteria
            .iter()
            .all(|(key, expected)| self.metadata.get(key) == Some(expected))
    }

    pub fn age_since_update(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.updated_at)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> SessionSummary {
        let end = if self.status.is_terminal() {
            self.updated_at
        } else {
            now
        };
        let duration_ms = end
            .signed_duration_since(self.created_at)
            .num_milliseconds()
            .max(0);

        let (avg_tokens_per_turn, avg_cost_per_turn) = if self.turns > 0 {
            (
                self.total_tokens as f64 / self.turns as f64,
                self.total_cost / self.turns as f64,
            )
        } else {
            (0.0, 0.0)
        };

        SessionSummary {
            id: self.id,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            duration_ms,
            turns: self.turns,
            total_tokens: self.total_tokens,
            total_cost: self.total_cost,
            avg_tokens_per_turn,
            avg_cost_per_turn,
            trace_count: self.traces.len(),
        }
    }
}

/// Caller-updatable subset of a session. Identity, creation time, counters
/// and traces are deliberately absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionUpdate {
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
}

impl SessionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub turns: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub avg_tokens_per_turn: f64,
    pub avg_cost_per_turn: f64,
    pub trace_count: usize,
}
