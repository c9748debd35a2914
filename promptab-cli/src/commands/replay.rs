use colored::Colorize;
use comfy_table::Cell;
use promptab_core::{
    parse_usage_log, replay_events, LedgerStats, PromptabConfig, SessionLedger, SessionSummary,
};
use serde_json::json;
use tracing::debug;

use crate::output::{format_cost, format_duration_ms, format_tokens, new_table, truncate_uuid};

pub async fn cmd_replay(
    config: &PromptabConfig,
    input: &str,
    show_sessions: bool,
    format: &str,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(input)?;
    let events = parse_usage_log(&content)?;
    debug!("Replaying {} usage events from {}", events.len(), input);

    let ledger = SessionLedger::with_config(config.ledger.clone());
    let outcome = replay_events(&ledger, events).await;
    let stats = ledger.get_stats().await;

    let mut summaries = Vec::new();
    for session in ledger.list_sessions().await {
        if let Some(summary) = ledger.get_session_summary(session.id).await {
            summaries.push(summary);
        }
    }

    if format == "json" {
        let output = json!({
            "applied": outcome.applied,
            "failures": outcome.failures,
            "stats": stats,
            "sessions": summaries,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Usage Replay".cyan().bold());
    println!(
        "{}",
        format!(
            "{} event(s) applied, {} skipped",
            outcome.applied,
            outcome.failures.len()
        )
        .dimmed()
    );
    println!();

    print_stats(&stats);

    if show_sessions && !summaries.is_empty() {
        println!();
        print_sessions(&summaries);
    }

    if !outcome.failures.is_empty() {
        println!();
        println!("  {}", "Skipped events".yellow().bold());
        for failure in &outcome.failures {
            println!(
                "    #{} {} '{}': {}",
                failure.index + 1,
                failure.event,
                failure.session,
                failure.error.dimmed()
            );
        }
    }

    Ok(())
}

fn print_stats(stats: &LedgerStats) {
    println!("  {}", "Sessions".yellow().bold());
    println!("    Total:        {}", stats.total_sessions);
    println!("    Active:       {}", stats.active_sessions.to_string().green());
    println!("    Completed:    {}", stats.completed_sessions);
    println!("    Aborted:      {}", stats.aborted_sessions);
    println!();
    println!("  {}", "Usage".yellow().bold());
    println!("    Tokens:       {}", format_tokens(stats.total_tokens));
    println!("    Cost:         {}", format_cost(stats.total_cost));
    println!("    Turns:        {}", stats.total_turns);
    println!(
        "    Avg/session:  {} tokens, {}",
        format_tokens(stats.average_tokens_per_session.round() as u64),
        format_cost(stats.average_cost_per_session)
    );
}

fn print_sessions(summaries: &[SessionSummary]) {
    let mut table = new_table(&[
        "Session ID",
        "Status",
        "Turns",
        "Tokens",
        "Cost",
        "Tokens/Turn",
        "Duration",
        "Traces",
    ]);

    for summary in summaries {
        table.add_row(vec![
            Cell::new(truncate_uuid(&summary.id.to_string())),
            Cell::new(summary.status),
            Cell::new(summary.turns),
            Cell::new(format_tokens(summary.total_tokens)),
            Cell::new(format_cost(summary.total_cost)),
            Cell::new(format!("{:.1}", summary.avg_tokens_per_turn)),
            Cell::new(format_duration_ms(summary.duration_ms)),
            Cell::new(summary.trace_count),
        ]);
    }

    println!("{table}");
}
