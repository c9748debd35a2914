use std::path::Path;

use colored::Colorize;
use comfy_table::Cell;
use promptab_core::{
    PromptabConfig, PromptabResult, VariantAggregator, VariantResult, WinnerReport,
};
use tracing::debug;

use crate::output::{format_cost, format_tokens, new_table};

pub fn cmd_compare(
    config: &PromptabConfig,
    input: &str,
    metric: Option<&str>,
    variants: &[String],
    format: &str,
) -> anyhow::Result<()> {
    let results = load_results(Path::new(input))?;
    debug!("Loaded {} variant results from {}", results.len(), input);
    let aggregator = VariantAggregator::new(config.aggregator.clone());
    let report = aggregator.compare(variants, &results, metric)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report, results.len());
    Ok(())
}

pub fn load_results(path: &Path) -> PromptabResult<Vec<VariantResult>> {
    let content = std::fs::read_to_string(path)?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    parse_results(&content, is_yaml)
}

pub fn parse_results(content: &str, is_yaml: bool) -> PromptabResult<Vec<VariantResult>> {
    if is_yaml {
        Ok(serde_yaml::from_str(content)?)
    } else {
        Ok(serde_json::from_str(content)?)
    }
}

fn print_report(report: &WinnerReport, result_count: usize) {
    println!("{}", "Variant Comparison".cyan().bold());
    let metric_line = if report.metric_fallback {
        format!(
            "Primary metric: {} (unknown '{}', using {})",
            report.metric, report.requested_metric, report.metric
        )
    } else {
        format!("Primary metric: {} (lower is better)", report.metric)
    };
    println!("{}", metric_line.dimmed());
    println!();

    let mut table = new_table(&[
        "Variant",
        "Runs",
        "Errors",
        "Success",
        "Avg Tokens",
        "Avg Cost",
        "Avg Latency",
        "p95 Latency",
    ]);

    for metrics in &report.metrics {
        let name = if report.winner.as_deref() == Some(metrics.variant_id.as_str()) {
            format!("★ {}", metrics.variant_id)
        } else {
            metrics.variant_id.clone()
        };

        if !metrics.has_data {
            table.add_row(vec![
                Cell::new(name),
                Cell::new(metrics.total_runs),
                Cell::new(metrics.error_count),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
            ]);
            continue;
        }

        table.add_row(vec![
            Cell::new(name),
            Cell::new(metrics.total_runs),
            Cell::new(metrics.error_count),
            Cell::new(format!("{:.1}%", metrics.success_rate * 100.0)),
            Cell::new(format_tokens(metrics.avg_tokens.round() as u64)),
            Cell::new(format_cost(metrics.avg_cost)),
            Cell::new(format!("{:.0}ms", metrics.avg_latency_ms)),
            Cell::new(format!("{}ms", metrics.p95_latency_ms)),
        ]);
    }

    println!("{table}");
    println!();

    match &report.winner {
        Some(winner) => {
            let mut line = format!("  {} {}", "Winner:".bold(), winner.green().bold());
            if let (Some(runner_up), Some(pct)) = (&report.runner_up, report.improvement_pct) {
                line.push_str(&format!(" ({:.1}% better than {})", pct, runner_up));
            }
            println!("{}", line);
        }
        None => {
            println!("{}", "No data: no variant has a successful result.".yellow());
        }
    }
    println!("  Results analysed: {}", result_count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_results() {
        let content = r#"[
            {"variant_id": "a", "input_tokens": 10, "output_tokens": 5, "cost_usd": 0.001, "latency_ms": 300},
            {"variant_id": "b", "latency_ms": 30000, "error": "timeout"}
        ]"#;

        let results = parse_results(content, false).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].total_tokens(), 15);
        assert!(!results[1].is_success());
    }

    #[test]
    fn test_parse_yaml_results() {
        let content = "- variant_id: a\n  cost_usd: 0.002\n  latency_ms: 120\n";

        let results = parse_results(content, true).unwrap();
        assert_eq!(results[0].variant_id, "a");
        assert_eq!(results[0].latency_ms, 120);
    }

    #[test]
    fn test_huge_token_counts_aggregate_without_overflow() {
        let content = r#"[
            {"variant_id": "a", "input_tokens": 18446744073709551615, "output_tokens": 1, "latency_ms": 10},
            {"variant_id": "a", "input_tokens": 5, "output_tokens": 5, "latency_ms": 20}
        ]"#;

        let results = parse_results(content, false).unwrap();
        let metrics = promptab_core::calculate_variant_metrics(&results, "a");

        assert_eq!(results[0].total_tokens(), u64::MAX);
        assert_eq!(metrics.total_tokens, u64::MAX);
        assert_eq!(metrics.success_count, 2);
    }

    #[test]
    fn test_load_results_missing_file() {
        let err = load_results(Path::new("/nonexistent/results.json")).unwrap_err();
        assert_eq!(err.error_code(), "E9003");
    }

    #[test]
    fn test_load_results_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.yml");
        std::fs::write(&path, "- variant_id: only\n  cost_usd: 0.5\n").unwrap();

        let results = load_results(&path).unwrap();
        assert_eq!(results.len(), 1);
    }
}
