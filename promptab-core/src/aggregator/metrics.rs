use crate::models::{VariantMetrics, VariantResult};

/// Aggregates every result belonging to `variant_id`.
///
/// Never fails: a variant with no results gets [`VariantMetrics::empty`].
pub fn calculate_variant_metrics(results: &[VariantResult], variant_id: &str) -> VariantMetrics {
    let matching: Vec<&VariantResult> = results
        .iter()
        .filter(|r| r.variant_id == variant_id)
        .collect();

    if matching.is_empty() {
        return VariantMetrics::empty(variant_id);
    }

    let successes: Vec<&VariantResult> = matching.iter().copied().filter(|r| r.is_success()).collect();

    let mut metrics = VariantMetrics::empty(variant_id);
    metrics.total_runs = matching.len();
    metrics.success_count = successes.len();
    metrics.error_count = matching.len() - successes.len();
    metrics.success_rate = successes.len() as f64 / matching.len() as f64;

    if successes.is_empty() {
        return metrics;
    }

    let n = successes.len() as f64;
    metrics.has_data = true;
    metrics.total_tokens = successes
        .iter()
        .map(|r| r.total_tokens())
        .fold(0u64, u64::saturating_add);
    metrics.total_cost = successes.iter().map(|r| r.cost_usd).sum();
    metrics.avg_tokens = metrics.total_tokens as f64 / n;
    metrics.avg_cost = metrics.total_cost / n;

    let mut latencies: Vec<u64> = successes.iter().map(|r| r.latency_ms).collect();
    latencies.sort_unstable();

    let latency_sum = latencies.iter().copied().fold(0u64, u64::saturating_add);
    metrics.avg_latency_ms = latency_sum as f64 / n;
    metrics.min_latency_ms = latencies[0];
    metrics.max_latency_ms = latencies[latencies.len() - 1];
    metrics.p50_latency_ms = percentile(&latencies, 50.0);
    metrics.p95_latency_ms = percentile(&latencies, 95.0);

    metrics
}

/// Nearest-rank percentile over an ascending slice.
fn percentile(sorted: &[u64], pct: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Distinct variant ids in first-seen order.
pub fn variant_ids_in_order(results: &[VariantResult]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for result in results {
        if !ids.iter().any(|id| id == &result.variant_id) {
            ids.push(result.variant_id.clone());
        }
    }
    ids
}
