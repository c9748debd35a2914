//! In-process session ledger.
//!
//! The ledger owns every live [`Session`] and is the only place usage gets
//! attributed. It is an explicit object: construct one at startup, wrap it in
//! an `Arc` and hand it to whatever needs it. Each operation takes the lock
//! once, so a mutation or a cleanup sweep is never observed half-done.

mod replay;
mod stats;
mod sweeper;

pub use replay::{parse_usage_log, replay_events, ReplayFailure, ReplayOutcome, UsageEvent};
pub use stats::LedgerStats;
pub use sweeper::SessionSweeper;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::error::{PromptabError, PromptabResult};
use crate::models::{Metadata, Session, SessionStatus, SessionSummary, SessionUpdate};

#[derive(Debug, Default)]
struct LedgerState {
    sessions: HashMap<Uuid, Session>,
    // insertion order of live ids
    order: Vec<Uuid>,
}

impl LedgerState {
    fn insert(&mut self, session: Session) {
        self.order.push(session.id);
        self.sessions.insert(session.id, session);
    }

    fn remove(&mut self, id: &Uuid) -> Option<Session> {
        let removed = self.sessions.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    fn ordered(&self) -> impl Iterator<Item = &Session> {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }

    fn get_mut(&mut self, id: Uuid) -> PromptabResult<&mut Session> {
        self.sessions
            .get_mut(&id)
            .ok_or_else(|| PromptabError::session_not_found(id))
    }

    fn least_recently_updated(&self) -> Option<Uuid> {
        self.ordered()
            .min_by_key(|session| session.updated_at)
            .map(|session| session.id)
    }
}

pub struct SessionLedger {
    state: RwLock<LedgerState>,
    config: LedgerConfig,
}

impl SessionLedger {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn default_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(
            "user_agent".to_string(),
            Value::String(self.config.default_user_agent.clone()),
        );
        metadata.insert(
            "source".to_string(),
            Value::String(self.config.default_source.clone()),
        );
        metadata
    }

    pub async fn create_session(&self, metadata: Metadata) -> Session {
        let mut merged = self.default_metadata();
        merged.extend(metadata);

        let session = Session::new(merged);
        let mut state = self.state.write().await;

        if let Some(max) = self.config.max_sessions {
            while state.sessions.len() >= max {
                let Some(oldest) = state.least_recently_updated() else {
                    break;
                };
                state.remove(&oldest);
                warn!(
                    session_id = %oldest,
                    max_sessions = max,
                    "Ledger at capacity, evicted least recently updated session"
                );
            }
        }

        state.insert(session.clone());
        debug!(session_id = %session.id, "Session created");

        session
    }

    pub async fn get_session(&self, id: Uuid) -> Option<Session> {
        self.state.read().await.sessions.get(&id).cloned()
    }

    pub async fn update_session(&self, id: Uuid, update: SessionUpdate) -> PromptabResult<Session> {
        let mut state = self.state.write().await;
        let session = state.get_mut(id)?;

        session.apply_update(update)?;
        debug!(session_id = %id, status = %session.status, "Session updated");

        Ok(session.clone())
    }

    pub async fn add_usage(
        &self,
        id: Uuid,
        tokens: u64,
        cost: f64,
        trace_id: Option<&str>,
    ) -> PromptabResult<Session> {
        if !cost.is_finite() || cost < 0.0 {
            return Err(PromptabError::ValidationError(format!(
                "cost must be a non-negative number, got {}",
                cost
            )));
        }

        let mut state = self.state.write().await;
        let session = state.get_mut(id)?;

        session.record_usage(tokens, cost, trace_id);
        debug!(
            session_id = %id,
            tokens,
            cost,
            total_tokens = session.total_tokens,
            "Usage attributed to session"
        );

        Ok(session.clone())
    }

    pub async fn increment_turn(&self, id: Uuid) -> PromptabResult<Session> {
        let mut state = self.state.write().await;
        let session = state.get_mut(id)?;

        session.increment_turn();

        Ok(session.clone())
    }

    pub async fn complete_session(&self, id: Uuid) -> PromptabResult<Session> {
        self.update_session(id, SessionUpdate::new().with_status(SessionStatus::Completed))
            .await
    }

    pub async fn abort_session(&self, id: Uuid) -> PromptabResult<Session> {
        self.update_session(id, SessionUpdate::new().with_status(SessionStatus::Aborted))
            .await
    }

    pub async fn delete_session(&self, id: Uuid) -> bool {
        let removed = self.state.write().await.remove(&id).is_some();
        if removed {
            debug!(session_id = %id, "Session deleted");
        }
        removed
    }

    pub async fn list_sessions(&self) -> Vec<Session> {
        self.state.read().await.ordered().cloned().collect()
    }

    pub async fn get_active_sessions(&self) -> Vec<Session> {
        self.state
            .read()
            .await
            .ordered()
            .filter(|s| s.is_active())
            .cloned()
            .collect()
    }

    pub async fn get_stats(&self) -> LedgerStats {
        let state = self.state.read().await;
        LedgerStats::from_sessions(state.ordered())
    }

    /// Removes every session not updated within `max_age`.
    pub async fn cleanup_sessions(&self, max_age: Duration) -> usize {
        self.cleanup_sessions_at(max_age, Utc::now()).await
    }

    /// Same as [`cleanup_sessions`](Self::cleanup_sessions) with an explicit
    /// reference time.
    pub async fn cleanup_sessions_at(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);

        let mut state = self.state.write().await;
        let expired: Vec<Uuid> = state
            .ordered()
            .filter(|session| session.age_since_update(now) > max_age)
            .map(|session| session.id)
            .collect();

        for id in &expired {
            state.remove(id);
        }

        if !expired.is_empty() {
            info!(
                removed = expired.len(),
                remaining = state.sessions.len(),
                "Swept expired sessions"
            );
        }

        expired.len()
    }

    pub async fn find_sessions(&self, criteria: &Metadata) -> Vec<Session> {
        self.state
            .read()
            .await
            .ordered()
            .filter(|s| s.matches_metadata(criteria))
            .cloned()
            .collect()
    }

    pub async fn get_session_summary(&self, id: Uuid) -> Option<SessionSummary> {
        self.state
            .read()
            .await
            .sessions
            .get(&id)
            .map(|s| s.summary(Utc::now()))
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.sessions.is_empty()
    }
}

impl Default for SessionLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: Value) -> Metadata {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_create_session_merges_default_metadata() {
        let ledger = SessionLedger::new();

        let session = ledger
            .create_session(metadata(json!({"source": "dashboard", "experiment": "x"})))
            .await;

        assert_eq!(session.metadata["user_agent"], json!("unknown"));
        assert_eq!(session.metadata["source"], json!("dashboard"));
        assert_eq!(session.metadata["experiment"], json!("x"));
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_worked_example() {
        let ledger = SessionLedger::new();
        let s1 = ledger.create_session(Metadata::new()).await.id;

        ledger.add_usage(s1, 100, 0.002, None).await.unwrap();
        ledger.add_usage(s1, 50, 0.001, None).await.unwrap();
        ledger.increment_turn(s1).await.unwrap();
        let session = ledger.increment_turn(s1).await.unwrap();

        assert_eq!(session.total_tokens, 150);
        assert!((session.total_cost - 0.003).abs() < 1e-12);
        assert_eq!(session.turns, 2);

        let summary = ledger.get_session_summary(s1).await.unwrap();
        assert_eq!(summary.avg_tokens_per_turn, 75.0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let ledger = SessionLedger::new();
        let id = Uuid::new_v4();

        assert!(matches!(
            ledger.add_usage(id, 1, 0.1, None).await,
            Err(PromptabError::SessionNotFound(_))
        ));
        assert!(matches!(
            ledger.increment_turn(id).await,
            Err(PromptabError::SessionNotFound(_))
        ));
        assert!(matches!(
            ledger.update_session(id, SessionUpdate::new()).await,
            Err(PromptabError::SessionNotFound(_))
        ));
        assert!(ledger.get_session(id).await.is_none());
        assert!(ledger.get_session_summary(id).await.is_none());
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_deleted_session_cannot_be_mutated() {
        let ledger = SessionLedger::new();
        let id = ledger.create_session(Metadata::new()).await.id;

        assert!(ledger.delete_session(id).await);
        assert!(!ledger.delete_session(id).await);
        assert!(matches!(
            ledger.increment_turn(id).await,
            Err(PromptabError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_usage_rejects_negative_cost() {
        let ledger = SessionLedger::new();
        let id = ledger.create_session(Metadata::new()).await.id;

        let err = ledger.add_usage(id, 10, -0.5, None).await.unwrap_err();
        assert!(matches!(err, PromptabError::ValidationError(_)));
        assert!(ledger.add_usage(id, 10, f64::NAN, None).await.is_err());

        let session = ledger.get_session(id).await.unwrap();
        assert_eq!(session.total_tokens, 0);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let ledger = SessionLedger::new();
        let id = ledger.create_session(Metadata::new()).await.id;

        let session = ledger.abort_session(id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Aborted);

        let err = ledger.complete_session(id).await.unwrap_err();
        assert!(matches!(
            err,
            PromptabError::InvalidSessionStatusTransition { .. }
        ));

        // Re-applying the current status is a no-op rather than an error
        assert!(ledger.abort_session(id).await.is_ok());
        assert_eq!(
            ledger.get_session(id).await.unwrap().status,
            SessionStatus::Aborted
        );
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let ledger = SessionLedger::new();
        let a = ledger.create_session(Metadata::new()).await.id;
        let b = ledger.create_session(Metadata::new()).await.id;
        let c = ledger.create_session(Metadata::new()).await.id;
        ledger.complete_session(b).await.unwrap();

        let ids: Vec<Uuid> = ledger.list_sessions().await.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a, b, c]);

        let active: Vec<Uuid> = ledger
            .get_active_sessions()
            .await
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(active, vec![a, c]);
    }

    #[tokio::test]
    async fn test_cleanup_uses_updated_at() {
        let ledger = SessionLedger::new();
        let stale = ledger.create_session(Metadata::new()).await.id;
        let fresh = ledger.create_session(Metadata::new()).await.id;

        let later = Utc::now() + chrono::Duration::seconds(120);
        {
            let mut state = ledger.state.write().await;
            state.sessions.get_mut(&fresh).unwrap().updated_at = later;
        }

        let removed = ledger
            .cleanup_sessions_at(Duration::from_secs(60), later)
            .await;

        assert_eq!(removed, 1);
        assert!(ledger.get_session(stale).await.is_none());
        assert!(ledger.get_session(fresh).await.is_some());
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_updated() {
        let ledger = SessionLedger::with_config(LedgerConfig::default().with_max_sessions(2));
        let first = ledger.create_session(Metadata::new()).await.id;
        let second = ledger.create_session(Metadata::new()).await.id;

        {
            let mut state = ledger.state.write().await;
            let session = state.sessions.get_mut(&first).unwrap();
            session.updated_at = session.updated_at + chrono::Duration::seconds(10);
        }

        let third = ledger.create_session(Metadata::new()).await.id;

        assert_eq!(ledger.len().await, 2);
        assert!(ledger.get_session(second).await.is_none());
        assert!(ledger.get_session(first).await.is_some());
        assert!(ledger.get_session(third).await.is_some());
    }

    #[tokio::test]
    async fn test_find_sessions_exact_match() {
        let ledger = SessionLedger::new();
        let a = ledger
            .create_session(metadata(json!({"variant": "a", "tier": 1})))
            .await
            .id;
        ledger
            .create_session(metadata(json!({"variant": "b", "tier": 1})))
            .await;

        let found = ledger.find_sessions(&metadata(json!({"variant": "a"}))).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a);

        assert_eq!(
            ledger.find_sessions(&metadata(json!({"tier": 1}))).await.len(),
            2
        );
        assert!(ledger
            .find_sessions(&metadata(json!({"variant": "A"})))
            .await
            .is_empty());
    }
}
