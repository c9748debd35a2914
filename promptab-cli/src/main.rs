use clap::{Parser, Subcommand};
use colored::Colorize;
use promptab_core::{CliErrorDisplay, PromptabConfig, PromptabError};
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

use commands::{cmd_compare, cmd_config, cmd_replay};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Parser)]
#[command(name = "promptab")]
#[command(version = VERSION)]
#[command(about = "Promptab - prompt A/B test accounting and variant comparison")]
#[command(long_about = r#"
Promptab tracks per-session token and cost usage for LLM calls and compares
prompt variants on cost, latency or token count.

Use 'promptab compare' on a file of recorded results to pick a winner, or
'promptab replay' to rebuild session accounting from a usage log.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Compare prompt variants from a JSON or YAML results file")]
    Compare {
        #[arg(short, long, help = "Results file (array of variant results)")]
        input: String,

        #[arg(short, long, help = "Primary metric (cost, latency, tokens)")]
        metric: Option<String>,

        #[arg(long, value_delimiter = ',', help = "Variants to compare, in priority order")]
        variants: Vec<String>,

        #[arg(
            short,
            long,
            default_value = "text",
            help = "Output format (text, json)"
        )]
        format: String,
    },

    #[command(about = "Replay a JSON Lines usage log into a fresh ledger")]
    Replay {
        #[arg(short, long, help = "Usage log file (one event per line)")]
        input: String,

        #[arg(long, help = "Print a summary row for every session")]
        show_sessions: bool,

        #[arg(
            short,
            long,
            default_value = "text",
            help = "Output format (text, json)"
        )]
        format: String,
    },

    #[command(about = "Show the effective configuration")]
    Config {
        #[arg(
            short,
            long,
            default_value = "text",
            help = "Output format (text, json, yaml)"
        )]
        format: String,
    },

    #[command(about = "Show version information")]
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match PromptabConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), CliErrorDisplay::new(&e));
            return ExitCode::FAILURE;
        }
    };

    init_logging(cli.verbose, &config);

    match run(cli, config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<PromptabError>() {
                Some(err) => eprintln!("{}: {}", "Error".red().bold(), CliErrorDisplay::new(err)),
                None => eprintln!("{}: {}", "Error".red().bold(), e),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, config: &PromptabConfig) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level()))
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.json_format {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli, config: PromptabConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Compare {
            input,
            metric,
            variants,
            format,
        } => cmd_compare(&config, &input, metric.as_deref(), &variants, &format),
        Commands::Replay {
            input,
            show_sessions,
            format,
        } => cmd_replay(&config, &input, show_sessions, &format).await,
        Commands::Config { format } => cmd_config(&config, &format),
        Commands::Version => {
            println!("{} {}", NAME.cyan().bold(), VERSION);
            Ok(())
        }
    }
}
