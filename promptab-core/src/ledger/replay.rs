use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::SessionLedger;
use crate::error::{PromptabError, PromptabResult};
use crate::models::{Metadata, SessionStatus, SessionUpdate};

/// One line of a usage log. `session` is a caller-chosen alias; the ledger
/// assigns the real id when the `create` event is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UsageEvent {
    Create {
        session: String,
        #[serde(default)]
        metadata: Metadata,
    },
    Usage {
        session: String,
        tokens: u64,
        cost: f64,
        #[serde(default)]
        trace_id: Option<String>,
    },
    Turn {
        session: String,
    },
    Update {
        session: String,
        #[serde(default)]
        metadata: Option<Metadata>,
        #[serde(default)]
        status: Option<SessionStatus>,
    },
    Complete {
        session: String,
    },
    Abort {
        session: String,
    },
    Delete {
        session: String,
    },
}

impl UsageEvent {
    pub fn session(&self) -> &str {
        match self {
            UsageEvent::Create { session, .. }
            | UsageEvent::Usage { session, .. }
            | UsageEvent::Turn { session }
            | UsageEvent::Update { session, .. }
            | UsageEvent::Complete { session }
            | UsageEvent::Abort { session }
            | UsageEvent::Delete { session } => session,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UsageEvent::Create { .. } => "create",
            UsageEvent::Usage { .. } => "usage",
            UsageEvent::Turn { .. } => "turn",
            UsageEvent::Update { .. } => "update",
            UsageEvent::Complete { .. } => "complete",
            UsageEvent::Abort { .. } => "abort",
            UsageEvent::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFailure {
    pub index: usize,
    pub event: String,
    pub session: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub applied: usize,
    pub failures: Vec<ReplayFailure>,
    /// Alias to ledger id, in creation order.
    pub sessions: Vec<(String, Uuid)>,
}

impl ReplayOutcome {
    /// Latest ledger id created under `alias`.
    pub fn session_id(&self, alias: &str) -> Option<Uuid> {
        self.sessions
            .iter()
            .rfind(|(name, _)| name == alias)
            .map(|(_, id)| *id)
    }
}

/// Parses a JSON Lines usage log. Blank lines are skipped.
pub fn parse_usage_log(input: &str) -> PromptabResult<Vec<UsageEvent>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| {
                PromptabError::SerializationError(format!("line {}: {}", idx + 1, e))
            })
        })
        .collect()
}

/// Applies events in order. A failing event is recorded and skipped.
pub async fn replay_events(ledger: &SessionLedger, events: Vec<UsageEvent>) -> ReplayOutcome {
    let mut outcome = ReplayOutcome::default();
    let mut aliases: HashMap<String, Uuid> = HashMap::new();

    for (index, event) in events.into_iter().enumerate() {
        let kind = event.kind();
        let alias = event.session().to_string();

        match apply_event(ledger, &mut aliases, event).await {
            Ok(Some(id)) => {
                outcome.applied += 1;
                outcome.sessions.push((alias, id));
            }
            Ok(None) => outcome.applied += 1,
            Err(e) => {
                debug!(index, event = kind, session = %alias, "Skipping usage event");
                e.log();
                outcome.failures.push(ReplayFailure {
                    index,
                    event: kind.to_string(),
                    session: alias,
                    error: e.to_string(),
                });
            }
        }
    }

    debug!(
        applied = outcome.applied,
        failed = outcome.failures.len(),
        "Usage log replayed"
    );

    outcome
}

async fn apply_event(
    ledger: &SessionLedger,
    aliases: &mut HashMap<String, Uuid>,
    event: UsageEvent,
) -> PromptabResult<Option<Uuid>> {
    let lookup = |aliases: &HashMap<String, Uuid>, alias: &str| {
        aliases
            .get(alias)
            .copied()
            .ok_or_else(|| PromptabError::SessionNotFound(alias.to_string()))
    };

    match event {
        UsageEvent::Create { session, metadata } => {
            if aliases.contains_key(&session) {
                return Err(PromptabError::ValidationError(format!(
                    "session alias '{}' is already in use",
                    session
                )));
            }
            let created = ledger.create_session(metadata).await;
            aliases.insert(session, created.id);
            return Ok(Some(created.id));
        }
        UsageEvent::Usage {
            session,
            tokens,
            cost,
            trace_id,
        } => {
            let id = lookup(aliases, &session)?;
            ledger
                .add_usage(id, tokens, cost, trace_id.as_deref())
                .await?;
        }
        UsageEvent::Turn { session } => {
            let id = lookup(aliases, &session)?;
            ledger.increment_turn(id).await?;
        }
        UsageEvent::Update {
            session,
            metadata,
            status,
        } => {
            let id = lookup(aliases, &session)?;
            ledger
                .update_session(id, SessionUpdate { metadata, status })
                .await?;
        }
        UsageEvent::Complete { session } => {
            let id = lookup(aliases, &session)?;
            ledger.complete_session(id).await?;
        }
        UsageEvent::Abort { session } => {
            let id = lookup(aliases, &session)?;
            ledger.abort_session(id).await?;
        }
        UsageEvent::Delete { session } => {
            let id = lookup(aliases, &session)?;
            ledger.delete_session(id).await;
            aliases.remove(&session);
        }
    }

    Ok(None)
}
