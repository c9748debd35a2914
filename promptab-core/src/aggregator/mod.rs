//! Prompt variant comparison.
//!
//! Results are consumed as an immutable slice per request; nothing here keeps
//! state between calls.

mod metrics;

pub use metrics::{calculate_variant_metrics, variant_ids_in_order};

use tracing::{debug, warn};

use crate::config::AggregatorConfig;
use crate::error::{PromptabError, PromptabResult};
use crate::models::{PrimaryMetric, VariantResult, VariantScore, WinnerReport};

/// Ranks `variants` on `metric` and picks the lowest score.
///
/// Variants without successful results are listed but never win. Ties keep
/// the variant that comes first in `variants`.
pub fn determine_winner<S: AsRef<str>>(
    variants: &[S],
    results: &[VariantResult],
    metric: PrimaryMetric,
) -> WinnerReport {
    let effective = metric.effective();
    if metric.is_fallback() {
        warn!(
            requested = %metric,
            using = %effective,
            "Unknown primary metric, falling back"
        );
    }

    let metrics: Vec<_> = variants
        .iter()
        .map(|v| calculate_variant_metrics(results, v.as_ref()))
        .collect();

    let scores: Vec<VariantScore> = metrics
        .iter()
        .map(|m| VariantScore {
            variant_id: m.variant_id.clone(),
            score: m.score(&effective),
        })
        .collect();

    let mut ranked: Vec<(usize, f64)> = scores
        .iter()
        .enumerate()
        .filter_map(|(idx, s)| s.score.map(|score| (idx, score)))
        .collect();
    // stable sort keeps input order among equal scores
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let winner = ranked.first().copied();
    let runner_up = ranked.get(1).copied();

    let improvement_pct = match (winner, runner_up) {
        (Some((_, best)), Some((_, next))) if next > 0.0 => Some((next - best) / next * 100.0),
        _ => None,
    };

    let report = WinnerReport {
        requested_metric: metric.clone(),
        metric: effective,
        metric_fallback: metric.is_fallback(),
        winner: winner.map(|(idx, _)| scores[idx].variant_id.clone()),
        winner_score: winner.map(|(_, score)| score),
        runner_up: runner_up.map(|(idx, _)| scores[idx].variant_id.clone()),
        improvement_pct,
        no_data: winner.is_none(),
        scores,
        metrics,
    };

    debug!(
        metric = %report.metric,
        winner = report.winner.as_deref().unwrap_or("-"),
        variants = variants.len(),
        "Variant comparison finished"
    );

    report
}

/// Config-aware front door to the comparison functions.
#[derive(Debug, Clone, Default)]
pub struct VariantAggregator {
    config: AggregatorConfig,
}

impl VariantAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Resolves a metric name; `None` means the configured default.
    pub fn resolve_metric(&self, name: Option<&str>) -> PromptabResult<PrimaryMetric> {
        let metric = match name {
            Some(name) => PrimaryMetric::parse(name),
            None => self.config.default_metric(),
        };

        if self.config.strict_metrics && metric.is_fallback() {
            return Err(PromptabError::UnknownMetric(metric.name().to_string()));
        }

        Ok(metric)
    }

    /// Compares the named variants, or every variant present in `results`
    /// (first-seen order) when `variants` is empty.
    pub fn compare(
        &self,
        variants: &[String],
        results: &[VariantResult],
        metric: Option<&str>,
    ) -> PromptabResult<WinnerReport> {
        let metric = self.resolve_metric(metric)?;

        let variants = if variants.is_empty() {
            variant_ids_in_order(results)
        } else {
            variants.to_vec()
        };

        Ok(determine_winner(&variants, results, metric))
    }

    /// Metrics for a single variant that must appear in `results`.
    pub fn variant_metrics(
        &self,
        results: &[VariantResult],
        variant_id: &str,
    ) -> PromptabResult<crate::models::VariantMetrics> {
        if !results.iter().any(|r| r.variant_id == variant_id) {
            return Err(PromptabError::VariantNotFound(variant_id.to_string()));
        }
        Ok(calculate_variant_metrics(results, variant_id))
    }
}
