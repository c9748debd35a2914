use serde::{Deserialize, Serialize};

use crate::models::{Session, SessionStatus};

/// Aggregate view over every session in a ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub completed_sessions: usize,
    pub aborted_sessions: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub total_turns: u64,
    pub total_traces: usize,
    pub average_tokens_per_session: f64,
    pub average_cost_per_session: f64,
    pub average_turns_per_session: f64,
}

impl Default for LedgerStats {
    fn default() -> Self {
        Self {
            total_sessions: 0,
            active_sessions: 0,
            completed_sessions: 0,
            aborted_sessions: 0,
            total_tokens: 0,
            total_cost: 0.0,
            total_turns: 0,
            total_traces: 0,
            average_tokens_per_session: 0.0,
            average_cost_per_session: 0.0,
            average_turns_per_session: 0.0,
        }
    }
}

impl LedgerStats {
    pub fn from_sessions<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> Self {
        let mut stats = Self::default();
        for session in sessions {
            stats.add_session(session);
        }
        stats.recalculate_averages();
        stats
    }

    fn add_session(&mut self, session: &Session) {
        self.total_sessions += 1;

        match session.status {
            SessionStatus::Active => self.active_sessions += 1,
            SessionStatus::Completed => self.completed_sessions += 1,
            SessionStatus::Aborted => self.aborted_sessions += 1,
        }

        self.total_tokens = self.total_tokens.saturating_add(session.total_tokens);
        self.total_cost += session.total_cost;
        self.total_turns = self.total_turns.saturating_add(session.turns);
        self.total_traces += session.traces.len();
    }

    fn recalculate_averages(&mut self) {
        if self.total_sessions > 0 {
            let n = self.total_sessions as f64;
            self.average_tokens_per_session = self.total_tokens as f64 / n;
            self.average_cost_per_session = self.total_cost / n;
            self.average_turns_per_session = self.total_turns as f64 / n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    #[test]
    fn test_stats_empty() {
        let stats = LedgerStats::from_sessions(std::iter::empty());
        assert_eq!(stats, LedgerStats::default());
        assert_eq!(stats.average_cost_per_session, 0.0);
    }

    #[test]
    fn test_stats_counts_by_status() {
        let mut a = Session::new(Metadata::new());
        a.record_usage(100, 0.2, Some("t1"));
        a.increment_turn();

        let mut b = Session::new(Metadata::new());
        b.record_usage(300, 0.4, None);
        b.transition_to(SessionStatus::Completed).unwrap();

        let mut c = Session::new(Metadata::new());
        c.transition_to(SessionStatus::Aborted).unwrap();

        let stats = LedgerStats::from_sessions([&a, &b, &c]);

        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.completed_sessions, 1);
        assert_eq!(stats.aborted_sessions, 1);
        assert_eq!(stats.total_tokens, 400);
        assert_eq!(stats.total_turns, 1);
        assert_eq!(stats.total_traces, 1);
        assert!((stats.total_cost - 0.6).abs() < 1e-9);
        assert!((stats.average_tokens_per_session - 400.0 / 3.0).abs() < 1e-9);
        assert!((stats.average_cost_per_session - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_stats_totals_saturate() {
        let mut a = Session::new(Metadata::new());
        a.record_usage(u64::MAX, 0.1, None);
        let mut b = Session::new(Metadata::new());
        b.record_usage(10, 0.1, None);

        let stats = LedgerStats::from_sessions([&a, &b]);

        assert_eq!(stats.total_tokens, u64::MAX);
        assert_eq!(stats.total_sessions, 2);
    }
}
