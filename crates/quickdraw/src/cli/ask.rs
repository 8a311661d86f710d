//! The default command: race a query across the configured responders.

use super::OutputFormatArg;
use anyhow::Context;
use clap::Args;
use console::style;
use quickdraw_core::{
    Config, OutputFormat, Query, RaceDispatcher, RaceError, RaceReport,
    ResponderFactory,
};
use std::cell::RefCell;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Arguments for racing a query.
#[derive(Args, Debug, Default)]
pub struct AskArgs {
    /// Query sent to every responder
    pub query: Option<String>,

    /// Race only this responder (repeatable)
    #[arg(long, value_name = "NAME")]
    pub only: Vec<String>,

    /// Overall race timeout in milliseconds (overrides race.timeout_ms)
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormatArg,

    /// Stream the reply as it arrives (single OpenAI-compatible responder)
    #[arg(long, conflicts_with = "format")]
    pub stream: bool,
}

/// Execute the race.
pub async fn execute(
    args: AskArgs,
    config: &Config,
    cancel: CancellationToken,
) -> anyhow::Result<ExitCode> {
    let Some(text) = args.query.as_deref() else {
        anyhow::bail!("No query given. Usage: quickdraw [OPTIONS] <QUERY>");
    };
    let query = Query::new(text);
    let options = super::race_options(config, args.timeout)?;

    if args.stream {
        return stream(&args, config, &query, options.timeout_ms, cancel).await;
    }

    let responders = ResponderFactory::from_config(config, &args.only)?;
    let race = RaceDispatcher::new(responders, options).with_cancel_token(cancel);

    let outcomes = RefCell::new(Vec::new());
    let result = race
        .dispatch_with(query.clone(), |outcome| {
            outcomes.borrow_mut().push(outcome.clone())
        })
        .await;

    let format = OutputFormat::from(args.format);
    match result {
        Ok(win) => {
            let report = RaceReport::from_win(text, &win, &outcomes.borrow());
            println!("{}", report.render(format)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(RaceError::NoResponders) => anyhow::bail!(
            "No responders available. Enable one in the config file or set its API key \
             (see `quickdraw config show`)."
        ),
        Err(err) => {
            let report = RaceReport::from_error(text, &err);
            print_failure(&report, format)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Print a race without a winner to stdout.
pub(crate) fn print_failure(report: &RaceReport, format: OutputFormat) -> anyhow::Result<()> {
    write_failure(&mut std::io::stdout().lock(), report, format)
}

fn write_failure<W: Write>(
    out: &mut W,
    report: &RaceReport,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => writeln!(out, "{}", report.to_json(true)?)?,
        OutputFormat::Text => {
            let text = report.render_text();
            let (headline, rest) = text.split_once('\n').unwrap_or((text.as_str(), ""));
            writeln!(out, "{}", style(headline).red().bold())?;
            if !rest.is_empty() {
                writeln!(out, "{rest}")?;
            }
        }
    }
    Ok(())
}

/// Stream deltas from the single selected OpenAI-compatible responder.
async fn stream(
    args: &AskArgs,
    config: &Config,
    query: &Query,
    timeout_ms: u64,
    cancel: CancellationToken,
) -> anyhow::Result<ExitCode> {
    let name = stream_target(config, &args.only)?;
    let entry = config
        .responder(&name)
        .with_context(|| format!("Unknown responder: {name}"))?;
    let responder = ResponderFactory::chat_completions(entry)?;

    tracing::info!("Streaming from {name}");
    let mut stdout = std::io::stdout();
    let call = responder.stream_chat(query, |delta| {
        // A closed stdout shouldn't abort the stream
        let _ = write!(stdout, "{delta}");
        let _ = stdout.flush();
    });

    let result = tokio::select! {
        _ = cancel.cancelled() => anyhow::bail!("Interrupted"),
        result = tokio::time::timeout(Duration::from_millis(timeout_ms), call) => result,
    };
    println!();

    match result {
        Ok(Ok(response)) => {
            tracing::debug!(
                "{name} streamed {} chars in {}ms",
                response.text.len(),
                response.latency_ms
            );
            Ok(ExitCode::SUCCESS)
        }
        Ok(Err(e)) => {
            println!("{} [{name}] {e}", style("stream failed:").red().bold());
            Ok(ExitCode::FAILURE)
        }
        Err(_) => {
            println!(
                "{} [{name}] timed out after {timeout_ms}ms",
                style("stream failed:").red().bold()
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Pick the one responder `--stream` talks to.
fn stream_target(config: &Config, only: &[String]) -> anyhow::Result<String> {
    let candidates: Vec<&str> = if only.is_empty() {
        config
            .responders
            .iter()
            .filter(|r| r.enabled)
            .map(|r| r.name.as_str())
            .collect()
    } else {
        only.iter().map(String::as_str).collect()
    };

    match candidates.as_slice() {
        [name] => Ok((*name).to_string()),
        [] => anyhow::bail!("--stream needs a responder; none are enabled"),
        many => anyhow::bail!(
            "--stream needs exactly one responder, {} selected ({}). Pick one with --only.",
            many.len(),
            many.join(", ")
        ),
    }
}
