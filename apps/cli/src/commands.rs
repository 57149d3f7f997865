//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use tracing::info;
use url::Url;

use stargazer_acquisition::{Acquirer, DocSource};
use stargazer_core::scheduler::{self, Deps, SchedulerConfig};
use stargazer_discovery::StarFeed;
use stargazer_notify::Notifier;
use stargazer_refiner::Refinery;
use stargazer_shared::{
    AppConfig, EntryStatus, config_file_path, expand_home, init_config, load_config,
    load_config_from, validate_credentials,
};
use stargazer_storage::Ledger;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Stargazer — starred-repository documentation pipeline.
#[derive(Parser)]
#[command(
    name = "stargazer",
    version,
    about = "Watch starred GitHub repositories and turn each new star into a refined document.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file path (defaults to ~/.stargazer/stargazer.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the poll loop until interrupted.
    Run,

    /// Run exactly one poll cycle and exit.
    Once,

    /// Show the processing ledger.
    Status,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "stargazer=info",
        1 => "stargazer=debug",
        _ => "stargazer=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Run => cmd_run(&config, true).await,
        Command::Once => cmd_run(&config, false).await,
        Command::Status => cmd_status(&config).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig, forever: bool) -> Result<()> {
    validate_credentials(config)?;

    let github_token = std::env::var(&config.github.token_env)?;
    let openrouter_key = std::env::var(&config.openrouter.api_key_env)?;
    let webhook = match std::env::var(&config.feishu.webhook_env) {
        Ok(value) if !value.is_empty() => Some(
            Url::parse(&value).map_err(|e| eyre!("invalid webhook URL: {e}"))?,
        ),
        _ => None,
    };

    let api_url = parse_url("github.api_url", &config.github.api_url)?;
    let raw_url = parse_url("github.raw_url", &config.github.raw_url)?;
    let deepwiki_url = parse_url("deepwiki.base_url", &config.deepwiki.base_url)?;
    let openrouter_url = parse_url("openrouter.base_url", &config.openrouter.base_url)?;

    let workspace_root = if config.defaults.workspace_dir.is_empty() {
        None
    } else {
        Some(expand_home(&config.defaults.workspace_dir))
    };

    let stars = StarFeed::new(api_url.clone(), raw_url.clone(), github_token.clone())?;
    let deps = Deps {
        stars,
        workspaces: Acquirer::new(
            DocSource::new(deepwiki_url)?,
            StarFeed::new(api_url, raw_url, github_token)?,
            workspace_root,
        ),
        refiner: Refinery::new(
            openrouter_url,
            openrouter_key,
            config.openrouter.model.clone(),
            config.openrouter.context_budget,
        )?,
        notifier: Notifier::new(webhook)?,
    };

    let scheduler_config = SchedulerConfig {
        poll_interval: Duration::from_secs(config.defaults.poll_interval_secs),
        star_limit: config.defaults.star_limit,
        ledger_path: expand_home(&config.defaults.ledger_path),
        output_dir: expand_home(&config.defaults.output_dir),
    };

    info!(
        model = %config.openrouter.model,
        output_dir = %scheduler_config.output_dir.display(),
        "stargazer starting"
    );

    if forever {
        scheduler::run_loop(&deps, &scheduler_config).await?;
    } else {
        let report = scheduler::run_once(&deps, &scheduler_config).await?;
        println!(
            "discovered: {}  skipped: {}  succeeded: {}  failed: {}",
            report.discovered, report.skipped, report.succeeded, report.failed
        );
    }

    Ok(())
}

async fn cmd_status(config: &AppConfig) -> Result<()> {
    let ledger_path = expand_home(&config.defaults.ledger_path);
    let ledger = Ledger::load(&ledger_path)?;

    if ledger.is_empty() {
        println!("ledger is empty ({})", ledger_path.display());
        return Ok(());
    }

    let mut success = 0usize;
    let mut failed = 0usize;
    let mut pending = 0usize;

    println!("{:<12} {:<40} {}", "STATUS", "REPOSITORY", "DETAIL");
    for entry in ledger.entries() {
        let (label, detail) = match entry.status {
            EntryStatus::Success => {
                success += 1;
                let path = entry
                    .output_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                ("success", path)
            }
            EntryStatus::Failed => {
                failed += 1;
                ("failed", entry.error_message.clone().unwrap_or_default())
            }
            EntryStatus::Pending => {
                pending += 1;
                ("pending", String::new())
            }
        };
        println!("{:<12} {:<40} {}", label, entry.repo_name, detail);
    }

    println!();
    println!(
        "{} entries: {success} success, {failed} failed, {pending} pending",
        ledger.len()
    );
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    println!("# {}", config_file_path()?.display());
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| eyre!("invalid {field} '{value}': {e}"))
}
