//! `SmsLedger` - SMS spam filter
//!
//! Ingests the inbox and live messages, classifies each one exactly once, and
//! keeps the verdicts in a local `SQLite` ledger.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod commands;
mod format;
mod settings;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use smsledger_core::Classification;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use commands::{cmd_config_init, cmd_config_show, cmd_list, cmd_reclassify, cmd_run, cmd_show};
use settings::{Settings, default_settings_path};

#[derive(Parser)]
#[command(name = "smsledger")]
#[command(about = "SMS spam filter with a local message ledger")]
#[command(version)]
#[command(after_help = "\
QUICK START:
  smsledger config init                      # Write default settings
  smsledger run --backfill inbox.json < live.jsonl
  smsledger list --classification spam       # Review spam by sender")]
struct Cli {
    /// Settings file (default: <config dir>/smsledger/settings.json)
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the inbox backfill and live messages from stdin (JSON lines)
    Run {
        /// JSON array of inbox messages to backfill
        #[arg(long, value_name = "FILE")]
        backfill: Option<PathBuf>,
    },
    /// List conversations grouped by sender
    List {
        /// Only messages with this verdict
        #[arg(long, value_enum)]
        classification: Option<Verdict>,
        /// Case-insensitive match on sender or message text
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one conversation
    Show {
        /// Sender address
        address: String,
        /// Mark the conversation's messages as read
        #[arg(long)]
        mark_read: bool,
    },
    /// Override the verdict of a stored message
    Reclassify {
        /// Message id
        id: String,
        /// New verdict
        #[arg(value_enum)]
        classification: Verdict,
    },
    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Subcommands for `smsledger config`
#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective settings
    Show,
    /// Write the default settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Verdict accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Verdict {
    /// Unwanted message
    Spam,
    /// Legitimate message
    Ham,
}

impl From<Verdict> for Classification {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Spam => Self::Spam,
            Verdict::Ham => Self::Ham,
        }
    }
}

/// How long shutdown waits for blocking work, such as a pending stdin read.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    block_on(dispatch(cli))
}

/// Run `future` to completion, then shut the runtime down without waiting on
/// blocking reads that cannot be cancelled (stdin after Ctrl-C).
fn block_on(future: impl Future<Output = Result<()>>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn dispatch(cli: Cli) -> Result<()> {
    let settings_path = cli.settings.unwrap_or_else(default_settings_path);
    debug!(path = %settings_path.display(), "Using settings file");

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommand::Show => cmd_config_show(&settings_path).await,
            ConfigCommand::Init { force } => cmd_config_init(&settings_path, force).await,
        },
        Commands::Run { backfill } => {
            let settings = Settings::load(&settings_path).await?;
            cmd_run(&settings, backfill).await
        }
        Commands::List {
            classification,
            search,
            json,
        } => {
            let settings = Settings::load(&settings_path).await?;
            cmd_list(&settings, classification.map(Into::into), search.as_deref(), json).await
        }
        Commands::Show { address, mark_read } => {
            let settings = Settings::load(&settings_path).await?;
            cmd_show(&settings, &address, mark_read).await
        }
        Commands::Reclassify { id, classification } => {
            let settings = Settings::load(&settings_path).await?;
            cmd_reclassify(&settings, &id, classification.into()).await
        }
    }
}

/// Logs go to stderr so command output on stdout stays clean.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "smsledger=debug,smsledger_core=debug"
    } else {
        "smsledger=info,smsledger_core=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_does_not_wait_for_blocking_reads() {
        let started = std::time::Instant::now();
        let result = block_on(async {
            tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(30)));
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(())
        });

        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_reclassify() {
        let cli = Cli::parse_from(["smsledger", "reclassify", "981", "spam"]);
        match cli.command {
            Commands::Reclassify { id, classification } => {
                assert_eq!(id, "981");
                assert_eq!(Classification::from(classification), Classification::Spam);
            }
            _ => panic!("expected reclassify"),
        }
    }

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::parse_from([
            "smsledger",
            "list",
            "--classification",
            "ham",
            "--search",
            "otp",
            "-v",
        ]);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::List {
                classification: Some(Verdict::Ham),
                json: false,
                ..
            }
        ));
    }
}
