//! Quickdraw Core - race interchangeable AI responders, first success wins.
//!
//! Quickdraw sends one query to several backends at once (a local model,
//! OpenAI-compatible gateways, Anthropic, a table-extraction API) and keeps
//! whichever answers successfully first. Slower responders are cancelled.
//!
//! # Architecture
//!
//! ```text
//! Config → ResponderFactory → [Responder; N] → RaceDispatcher → RaceWin | AllFailed
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use quickdraw_core::{Config, Query, RaceDispatcher, RaceOptions, ResponderFactory};
//!
//! #[tokio::main]
//! async fn main() -> quickdraw_core::Result<()> {
//!     let config = Config::load()?;
//!     let responders = ResponderFactory::from_config(&config, &[])?;
//!     let race = RaceDispatcher::new(responders, RaceOptions::from(&config.race));
//!
//!     let win = race.dispatch(Query::new("What comes after 3?")).await?;
//!     println!("[{}] {}", win.responder, win.response.text);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod race;
pub mod report;
pub mod responder;
pub mod retry;

pub use config::Config;
pub use error::{ConfigError, QuickdrawError, RaceError, ResponderError, ResponderFailure, Result};
pub use race::{RaceDispatcher, RaceOptions, RaceWin};
pub use report::{OutputFormat, RaceReport};
pub use responder::{Outcome, Query, Responder, ResponderFactory, Response};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
