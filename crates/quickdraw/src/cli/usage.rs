//! The `quickdraw usage` command: table-extraction API credits.

use super::OutputFormatArg;
use clap::Args;
use quickdraw_core::responder::Usage;
use quickdraw_core::{Config, ResponderFactory};
use std::process::ExitCode;

/// Arguments for the `usage` command.
#[derive(Args, Debug)]
pub struct UsageArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormatArg,
}

/// Execute the usage command.
pub async fn execute(args: UsageArgs, config: &Config) -> anyhow::Result<ExitCode> {
    let responder = ResponderFactory::extract_table(config)?;
    let usage = responder.check_usage().await?;

    match args.format {
        OutputFormatArg::Text => println!("{}", render(&usage)),
        OutputFormatArg::Json => println!("{}", serde_json::to_string_pretty(&usage)?),
    }
    Ok(ExitCode::SUCCESS)
}

fn render(usage: &Usage) -> String {
    format!(
        "Credits:   {}\nUsed:      {}\nRemaining: {}\nQueued:    {}",
        usage.credits,
        usage.used,
        usage.remaining(),
        usage.queued
    )
}
