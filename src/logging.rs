//! Tracing subscriber setup for the command-line tool.
//!
//! Everything is written to stderr so stdout stays free for the report.
//! The filter comes from `DEXPORT_LOG`, else `RUST_LOG`, else `info`
//! (`debug` with `--verbose`), using the usual `EnvFilter` directive syntax:
//!
//! ```bash
//! DEXPORT_LOG="info,dexport_lib::browser=debug" dexport https://host/workspace/1 svg
//! ```

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{
    fmt::{self as layer_fmt, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::{ExportError, Result};

pub const ENV_LOG: &str = "DEXPORT_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single line per event.
    #[default]
    Compact,
    /// Multi-line, with source locations.
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {s}")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        })
    }
}

/// Picks the filter directives: explicit env vars win over `--verbose`.
fn filter_directives(verbose: bool, lookup: impl Fn(&str) -> Option<String>) -> String {
    let set = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    set(ENV_LOG)
        .or_else(|| set("RUST_LOG"))
        .unwrap_or_else(|| if verbose { "debug" } else { "info" }.to_string())
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(verbose: bool, format: LogFormat) -> Result<()> {
    let directives = filter_directives(verbose, |name| std::env::var(name).ok());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match format {
        LogFormat::Compact => Registry::default()
            .with(filter)
            .with(
                layer_fmt::Layer::default()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_level(true)
                    .with_span_events(FmtSpan::NONE)
                    .compact(),
            )
            .try_init(),
        LogFormat::Pretty => Registry::default()
            .with(filter)
            .with(
                layer_fmt::Layer::default()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .pretty(),
            )
            .try_init(),
        LogFormat::Json => Registry::default()
            .with(filter)
            .with(
                layer_fmt::Layer::default()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .json(),
            )
            .try_init(),
    };
    installed.map_err(|e| ExportError::Config(format!("Failed to initialize logging: {e}")))
}
