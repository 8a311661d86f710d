//! Quickdraw CLI - ask several AI backends at once, print whichever answers first.
//!
//! # Usage
//!
//! ```bash
//! # Race every configured responder
//! quickdraw "What comes after 3?"
//!
//! # Only the local model
//! quickdraw --only ollama "What comes after 3?"
//!
//! # Stream from a single OpenAI-compatible responder
//! quickdraw --only openai --stream "Write a short poem"
//!
//! # Extract tables from a scanned document
//! quickdraw extract ~/scans/invoice.png --pages 1
//!
//! # View configuration
//! quickdraw config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

mod cli;
mod logging;

/// Quickdraw - race interchangeable AI responders, first success wins.
#[derive(Parser, Debug)]
#[command(name = "quickdraw")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH", env = "QUICKDRAW_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    ask: cli::ask::AskArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract tables from a document image or PDF
    Extract(cli::extract::ExtractArgs),

    /// Show table-extraction API credits
    Usage(cli::usage::UsageArgs),

    /// Check which responders are reachable
    Probe(cli::probe::ProbeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(quickdraw_core::Config::default_path);
    let config = cli::load_config(cli.config.as_deref())?;
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Quickdraw v{}", quickdraw_core::VERSION);

    // Ctrl-C cancels whatever race is in flight
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling in-flight responders");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Some(Commands::Extract(args)) => cli::extract::execute(args, &config, cancel).await,
        Some(Commands::Usage(args)) => cli::usage::execute(args, &config).await,
        Some(Commands::Probe(args)) => cli::probe::execute(args, &config).await,
        Some(Commands::Config(args)) => cli::config::execute(args, &config, &config_path).await,
        None => cli::ask::execute(cli.ask, &config, cancel).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_query_races() {
        let cli = Cli::try_parse_from(["quickdraw", "What comes after 3?"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.ask.query.as_deref(), Some("What comes after 3?"));
        assert!(cli.ask.only.is_empty());
    }

    #[test]
    fn only_is_repeatable() {
        let cli = Cli::try_parse_from([
            "quickdraw", "--only", "ollama", "--only", "groq", "--timeout", "500", "hi",
        ])
        .unwrap();
        assert_eq!(cli.ask.only, vec!["ollama", "groq"]);
        assert_eq!(cli.ask.timeout, Some(500));
    }

    #[test]
    fn format_json() {
        let cli = Cli::try_parse_from(["quickdraw", "--format", "json", "hi"]).unwrap();
        assert!(matches!(cli.ask.format, cli::OutputFormatArg::Json));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["quickdraw", "probe", "-v", "--config", "/tmp/q.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/q.toml")));
        assert!(matches!(cli.command, Some(Commands::Probe(_))));
    }

    #[test]
    fn extract_with_pages() {
        let cli = Cli::try_parse_from(["quickdraw", "extract", "scan.png", "--pages", "1,2"])
            .unwrap();
        match cli.command {
            Some(Commands::Extract(args)) => {
                assert_eq!(args.file, PathBuf::from("scan.png"));
                assert_eq!(args.pages.as_deref(), Some("1,2"));
            }
            other => panic!("Expected extract, got {other:?}"),
        }
    }

    #[test]
    fn config_init_force() {
        let cli = Cli::try_parse_from(["quickdraw", "config", "init", "--force"]).unwrap();
        match cli.command {
            Some(Commands::Config(args)) => {
                assert!(matches!(
                    args.command,
                    cli::config::ConfigCommand::Init { force: true }
                ));
            }
            other => panic!("Expected config, got {other:?}"),
        }
    }

    #[test]
    fn stream_conflicts_with_format() {
        assert!(Cli::try_parse_from(["quickdraw", "--stream", "--format", "json", "hi"]).is_err());
    }
}
