use colored::Colorize;
use promptab_core::{get_config_dir, PromptabConfig};

pub fn cmd_config(config: &PromptabConfig, format: &str) -> anyhow::Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(config)?);
            return Ok(());
        }
        "yaml" => {
            print!("{}", serde_yaml::to_string(config)?);
            return Ok(());
        }
        _ => {}
    }

    println!("{}", "Promptab Configuration".cyan().bold());
    println!("{}", "═".repeat(40).dimmed());
    println!();

    println!("  {}", "Ledger".yellow().bold());
    println!(
        "    Max session age:   {}s",
        config.ledger.max_session_age_secs
    );
    println!(
        "    Cleanup interval:  {}s",
        config.ledger.cleanup_interval_secs
    );
    println!(
        "    Max sessions:      {}",
        config
            .ledger
            .max_sessions
            .map(|m| m.to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    );
    println!("    Default source:    {}", config.ledger.default_source);
    println!("    Default UA:        {}", config.ledger.default_user_agent);
    println!();

    println!("  {}", "Aggregator".yellow().bold());
    println!("    Default metric:    {}", config.aggregator.default_metric);
    println!("    Strict metrics:    {}", config.aggregator.strict_metrics);
    println!();

    println!("  {}", "Logging".yellow().bold());
    println!("    Level:             {}", config.logging.level);
    println!("    JSON:              {}", config.logging.json_format);
    println!();

    if let Some(dir) = get_config_dir() {
        println!(
            "{}",
            format!("User config: {}", dir.join("config.toml").display()).dimmed()
        );
    }

    Ok(())
}
