//! The `quickdraw extract` command: tables from a document, as Markdown.

use super::OutputFormatArg;
use clap::Args;
use quickdraw_core::{
    Config, OutputFormat, Query, RaceDispatcher, RaceError, RaceOptions, RaceReport, Responder,
    ResponderFactory,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Arguments for the `extract` command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Image or PDF to extract tables from
    pub file: PathBuf,

    /// Pages to process, e.g. "1", "1,3" or "all" (overrides extract_table.pages)
    #[arg(long, value_name = "SPEC")]
    pub pages: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormatArg,
}

/// Execute the extract command.
pub async fn execute(
    args: ExtractArgs,
    config: &Config,
    cancel: CancellationToken,
) -> anyhow::Result<ExitCode> {
    let mut responder = ResponderFactory::extract_table(config)?;
    if let Some(pages) = &args.pages {
        responder = responder.with_pages(pages);
    }
    let responders: Vec<Arc<dyn Responder>> = vec![Arc::new(responder)];

    let race = RaceDispatcher::new(responders, extract_options(config)).with_cancel_token(cancel);
    let path = args.file.to_string_lossy();
    tracing::info!("Extracting tables from {path}");

    let format = OutputFormat::from(args.format);
    match race.dispatch(Query::new(path.as_ref())).await {
        Ok(win) => {
            match format {
                // Bare Markdown so the output can be piped into a file
                OutputFormat::Text => println!("{}", win.response.text),
                OutputFormat::Json => {
                    let report = RaceReport::from_win(&path, &win, &[]);
                    println!("{}", report.to_json(true)?);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(RaceError::NoResponders) => anyhow::bail!("No extraction responder configured"),
        Err(err) => {
            let report = RaceReport::from_error(&path, &err);
            super::ask::print_failure(&report, format)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Extraction jobs poll for a while, so the job timeout bounds both the
/// race and the single call.
fn extract_options(config: &Config) -> RaceOptions {
    RaceOptions {
        timeout_ms: config.extract_table.timeout_ms,
        responder_timeout_ms: config.extract_table.timeout_ms,
        ..RaceOptions::from(&config.race)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_extract_timeout() {
        let mut config = Config::default();
        config.extract_table.timeout_ms = 5_000;
        config.race.retry_attempts = 3;
        let options = extract_options(&config);
        assert_eq!(options.timeout_ms, 5_000);
        assert_eq!(options.responder_timeout_ms, 5_000);
        assert_eq!(options.retry_attempts, 3);
    }

    #[tokio::test]
    async fn missing_api_key_is_error() {
        let mut config = Config::default();
        config.extract_table.api_key = "${QUICKDRAW_TEST_UNSET_EXTRACT_KEY}".to_string();
        let args = ExtractArgs {
            file: PathBuf::from("scan.png"),
            pages: None,
            format: OutputFormatArg::Text,
        };
        let err = execute(args, &config, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("QUICKDRAW_TEST_UNSET_EXTRACT_KEY"));
    }
}
