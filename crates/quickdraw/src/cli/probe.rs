//! The `quickdraw probe` command: which responders are reachable right now.

use clap::Args;
use console::style;
use quickdraw_core::{Config, RaceDispatcher, RaceOptions, ResponderFactory};
use std::process::ExitCode;

/// Arguments for the `probe` command.
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Probe only this responder (repeatable)
    #[arg(long, value_name = "NAME")]
    pub only: Vec<String>,
}

/// Execute the probe command.
///
/// Exits with failure when no probed responder is available.
pub async fn execute(args: ProbeArgs, config: &Config) -> anyhow::Result<ExitCode> {
    let responders = ResponderFactory::from_config(config, &args.only)?;
    if responders.is_empty() {
        anyhow::bail!("No responders configured");
    }

    let results = RaceDispatcher::new(responders, RaceOptions::from(&config.race))
        .probe()
        .await;

    for (name, available) in &results {
        println!("{}", render_line(name, *available));
    }

    if results.iter().any(|(_, available)| *available) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn render_line(name: &str, available: bool) -> String {
    if available {
        format!("{name}: {}", style("available").green())
    } else {
        format!("{name}: {}", style("unavailable").red())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_line_plain() {
        console::set_colors_enabled(false);
        assert_eq!(render_line("ollama", true), "ollama: available");
        assert_eq!(render_line("openai", false), "openai: unavailable");
    }
}
