//! Promptab core: per-session usage accounting and prompt variant comparison
//! for LLM A/B tests.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;

pub use aggregator::{
    calculate_variant_metrics, determine_winner, variant_ids_in_order, VariantAggregator,
};
pub use config::{get_config_dir, AggregatorConfig, LedgerConfig, LoggingConfig, PromptabConfig};
pub use error::{CliErrorDisplay, PromptabError, PromptabResult};
pub use ledger::{
    parse_usage_log, replay_events, LedgerStats, ReplayFailure, ReplayOutcome, SessionLedger,
    SessionSweeper, UsageEvent,
};
pub use models::{
    Metadata, PrimaryMetric, Session, SessionStatus, SessionSummary, SessionUpdate,
    VariantMetrics, VariantResult, VariantScore, WinnerReport,
};
