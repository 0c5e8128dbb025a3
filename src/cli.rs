use clap::{Parser, ValueEnum};
use dexport_lib::{ImageFormat, LogFormat, Viewport};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dexport")]
#[command(
    version,
    about = "Diagram Exporter - export every view of a Structurizr workspace to PNG or SVG",
    long_about = "Diagram Exporter (dexport)\n\nOpens the workspace's diagram viewer in headless Chromium (via Playwright), \
signs in when credentials are given, and exports each view through the viewer's scripting API.\n\
Diagram views produce {key}.{ext} and {key}-key.{ext}; image views produce {key}.{ext}.\n\n\
Requires Node.js and the playwright npm package (npx playwright install chromium)."
)]
pub struct Cli {
    #[arg(help = "Workspace URL, e.g. https://structurizr.example.com/workspace/1")]
    pub target_url: String,

    #[arg(value_enum, help = "Output format")]
    pub format: FormatArg,

    #[arg(env = "STRUCTURIZR_USERNAME", help = "Username for sign-in")]
    pub username: Option<String>,

    #[arg(
        env = "STRUCTURIZR_PASSWORD",
        hide_env_values = true,
        help = "Password for sign-in"
    )]
    pub password: Option<String>,

    #[arg(long, value_name = "PATH", help = "Directory for exported files [default: .]")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, help = "Do not write diagram-manifest.json")]
    pub no_manifest: bool,

    #[arg(
        long,
        value_name = "PATH",
        help = "Config file (TOML); defaults to ~/.config/dexport/config.toml when present. CLI flags override config"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Viewport dimensions (WIDTHxHEIGHT) [default: 1920x1080]")]
    pub viewport: Option<Viewport>,

    #[arg(long, value_name = "FACTOR", help = "Device scale factor for PNG exports [default: 2]")]
    pub device_scale: Option<f64>,

    #[arg(long, help = "Show the browser window")]
    pub headed: bool,

    #[arg(long, help = "Reject invalid TLS certificates")]
    pub strict_https: bool,

    #[arg(long, value_name = "SECS", help = "Navigation timeout in seconds [default: 30]")]
    pub nav_timeout: Option<u64>,

    #[arg(long, value_name = "SECS", help = "Sign-in confirmation timeout in seconds [default: 20]")]
    pub login_timeout: Option<u64>,

    #[arg(
        long,
        value_name = "SECS",
        help = "Time allowed to find the scripting API in seconds [default: 60]"
    )]
    pub discovery_timeout: Option<u64>,

    #[arg(long, value_name = "SECS", help = "Per-view render timeout in seconds [default: 30]")]
    pub render_timeout: Option<u64>,

    #[arg(long, value_name = "SECS", help = "Per-call scripting timeout in seconds [default: 30]")]
    pub script_timeout: Option<u64>,

    #[arg(long, value_name = "SECS", help = "Whole-job timeout in seconds [default: 300]")]
    pub job_timeout: Option<u64>,

    #[arg(long, value_enum, default_value = "text", help = "Report format on stdout")]
    pub report: ReportFormat,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, value_enum, default_value = "compact", help = "Log format on stderr")]
    pub log_format: LogFormatArg,
}

impl Cli {
    pub fn log_format(&self) -> LogFormat {
        self.log_format.into()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Png,
    Svg,
}

impl From<FormatArg> for ImageFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Svg => ImageFormat::Svg,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum LogFormatArg {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::{Cli, FormatArg, LogFormatArg, ReportFormat};
    use clap::Parser;
    use dexport_lib::LogFormat;

    #[test]
    fn positional_arguments_parse() {
        let cli = Cli::try_parse_from([
            "dexport",
            "https://structurizr.example.com/workspace/1",
            "svg",
            "alice",
            "secret",
        ])
        .unwrap();

        assert_eq!(cli.target_url, "https://structurizr.example.com/workspace/1");
        assert_eq!(cli.format, FormatArg::Svg);
        assert_eq!(cli.username.as_deref(), Some("alice"));
        assert_eq!(cli.password.as_deref(), Some("secret"));
        assert_eq!(cli.report, ReportFormat::Text);
        assert_eq!(cli.log_format(), LogFormat::Compact);
        assert!(!cli.verbose);
        assert!(!cli.no_manifest);
        assert!(cli.viewport.is_none());
        assert!(cli.nav_timeout.is_none());
    }

    #[test]
    fn format_must_be_exact_lowercase() {
        for bad in ["PNG", "Svg", "jpg"] {
            assert!(
                Cli::try_parse_from(["dexport", "https://h/workspace/1", bad]).is_err(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn missing_format_is_an_error() {
        assert!(Cli::try_parse_from(["dexport", "https://h/workspace/1"]).is_err());
        assert!(Cli::try_parse_from(["dexport"]).is_err());
    }

    #[test]
    fn options_override_defaults() {
        let cli = Cli::try_parse_from([
            "dexport",
            "https://h/workspace/1",
            "png",
            "--output-dir",
            "out",
            "--viewport",
            "1280x720",
            "--device-scale",
            "1.5",
            "--render-timeout",
            "45",
            "--report",
            "json",
            "--log-format",
            "json",
            "--headed",
            "--no-manifest",
        ])
        .unwrap();

        assert_eq!(cli.format, FormatArg::Png);
        assert_eq!(cli.output_dir.as_deref().and_then(|p| p.to_str()), Some("out"));
        let viewport = cli.viewport.unwrap();
        assert_eq!((viewport.width, viewport.height), (1280, 720));
        assert_eq!(cli.device_scale, Some(1.5));
        assert_eq!(cli.render_timeout, Some(45));
        assert_eq!(cli.report, ReportFormat::Json);
        assert_eq!(cli.log_format, LogFormatArg::Json);
        assert_eq!(cli.log_format(), LogFormat::Json);
        assert!(cli.headed);
        assert!(cli.no_manifest);
    }

    #[test]
    fn invalid_viewport_is_rejected() {
        assert!(Cli::try_parse_from([
            "dexport",
            "https://h/workspace/1",
            "svg",
            "--viewport",
            "wide"
        ])
        .is_err());
    }
}
