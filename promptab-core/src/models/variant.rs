use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One evaluated call against a prompt variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResult {
    pub variant_id: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl VariantResult {
    pub fn success(
        variant_id: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
        latency_ms: u64,
    ) -> Self {
        Self {
            variant_id: variant_id.into(),
            input_tokens,
            output_tokens,
            cost_usd,
            latency_ms,
            error: None,
            recorded_at: Some(Utc::now()),
        }
    }

    pub fn failure(variant_id: impl Into<String>, latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            variant_id: variant_id.into(),
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: 0.0,
            latency_ms,
            error: Some(error.into()),
            recorded_at: Some(Utc::now()),
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The dimension variants are ranked on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryMetric {
    Latency,
    Cost,
    Tokens,
    /// Unrecognised name; scored the same way as [`PrimaryMetric::Cost`].
    Custom(String),
}

impl PrimaryMetric {
    /// Never fails: unknown names become [`PrimaryMetric::Custom`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "latency" | "latency_ms" => PrimaryMetric::Latency,
            "cost" | "cost_usd" => PrimaryMetric::Cost,
            "tokens" | "total_tokens" => PrimaryMetric::Tokens,
            _ => PrimaryMetric::Custom(name.trim().to_string()),
        }
    }

    /// The metric actually used for scoring.
    pub fn effective(&self) -> PrimaryMetric {
        match self {
            PrimaryMetric::Custom(_) => PrimaryMetric::Cost,
            other => other.clone(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PrimaryMetric::Custom(_))
    }

    pub fn name(&self) -> &str {
        match self {
            PrimaryMetric::Latency => "latency",
            PrimaryMetric::Cost => "cost",
            PrimaryMetric::Tokens => "tokens",
            PrimaryMetric::Custom(name) => name,
        }
    }
}

impl Default for PrimaryMetric {
    fn default() -> Self {
        PrimaryMetric::Cost
    }
}

impl std::fmt::Display for PrimaryMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Aggregate of every result recorded for one variant.
///
/// Token, cost and latency figures cover successful runs only; failed runs
/// count towards `total_runs` and `error_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantMetrics {
    pub variant_id: String,
    pub has_data: bool,
    pub total_runs: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub success_rate: f64,
    pub total_tokens: u64,
    pub avg_tokens: f64,
    pub total_cost: f64,
    pub avg_cost: f64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
}

impl VariantMetrics {
    pub fn empty(variant_id: impl Into<String>) -> Self {
        Self {
            variant_id: variant_id.into(),
            has_data: false,
            total_runs: 0,
            success_count: 0,
            error_count: 0,
            success_rate: 0.0,
            total_tokens: 0,
            avg_tokens: 0.0,
            total_cost: 0.0,
            avg_cost: 0.0,
            avg_latency_ms: 0.0,
            min_latency_ms: 0,
            max_latency_ms: 0,
            p50_latency_ms: 0,
            p95_latency_ms: 0,
        }
    }

    /// Score on the given metric; `None` when there is nothing to rank.
    pub fn score(&self, metric: &PrimaryMetric) -> Option<f64> {
        if !self.has_data {
            return None;
        }

        match metric.effective() {
            PrimaryMetric::Latency => Some(self.avg_latency_ms),
            PrimaryMetric::Tokens => Some(self.avg_tokens),
            _ => Some(self.avg_cost),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantScore {
    pub variant_id: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerReport {
    pub requested_metric: PrimaryMetric,
    pub metric: PrimaryMetric,
    pub metric_fallback: bool,
    pub winner: Option<String>,
    pub winner_score: Option<f64>,
    pub runner_up: Option<String>,
    /// Relative improvement of the winner over the runner-up, in percent.
    pub improvement_pct: Option<f64>,
    pub no_data: bool,
    pub scores: Vec<VariantScore>,
    pub metrics: Vec<VariantMetrics>,
}

impl WinnerReport {
    pub fn metrics_for(&self, variant_id: &str) -> Option<&VariantMetrics> {
        self.metrics.iter().find(|m| m.variant_id == variant_id)
    }
}
