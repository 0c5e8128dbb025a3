use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{ExportError, Result, Viewport};

/// Environment variable overriding the viewport (`WIDTHxHEIGHT`).
pub const ENV_VIEWPORT: &str = "DEXPORT_VIEWPORT";
/// Environment variable overriding the device scale factor.
pub const ENV_DEVICE_SCALE: &str = "DEXPORT_DEVICE_SCALE";
/// Environment variable overriding the job timeout, in seconds.
pub const ENV_MAX_DURATION_SECS: &str = "DEXPORT_MAX_DURATION_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub output_dir: PathBuf,
    pub manifest: bool,
    pub headless: bool,
    pub ignore_https_errors: bool,
    pub viewport: Viewport,
    pub device_scale_factor: f64,
    pub node_command: String,
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            manifest: true,
            headless: true,
            ignore_https_errors: true,
            viewport: Viewport::default(),
            device_scale_factor: 2.0,
            node_command: "node".to_string(),
            timeouts: Timeouts::default(),
        }
    }
}

/// Bounds for every wait in an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub navigation: Duration,
    #[serde(with = "humantime_serde")]
    pub login: Duration,
    #[serde(with = "humantime_serde")]
    pub discovery: Duration,
    #[serde(with = "humantime_serde")]
    pub readiness: Duration,
    #[serde(with = "humantime_serde")]
    pub render: Duration,
    #[serde(with = "humantime_serde")]
    pub script: Duration,
    #[serde(with = "humantime_serde")]
    pub job: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            login: Duration::from_secs(20),
            discovery: Duration::from_secs(60),
            readiness: Duration::from_secs(60),
            render: Duration::from_secs(30),
            script: Duration::from_secs(30),
            job: Duration::from_secs(300),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl Config {
    /// Load config from an explicit path, else the central config file if it
    /// exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::central_config_path().filter(|p| p.is_file()) {
                Some(central) => central,
                None => return Ok(Config::default()),
            },
        };
        debug!(path = %path.display(), "loading config file");
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            ExportError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
            .map_err(|e| ExportError::Config(format!("Invalid config ({}): {}", path.display(), e)))
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Config, toml::de::Error> {
        toml::from_str(raw)
    }

    /// `$XDG_CONFIG_HOME/dexport/config.toml`, falling back to `~/.config`.
    pub fn central_config_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .filter(|v| !v.is_empty())
                    .map(|home| PathBuf::from(home).join(".config"))
            })?;
        Some(base.join("dexport").join("config.toml"))
    }

    /// Apply `DEXPORT_*` environment overrides. Unparseable values are logged
    /// and ignored.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_VIEWPORT).filter(|v| !v.trim().is_empty()) {
            match raw.parse::<Viewport>() {
                Ok(viewport) => self.viewport = viewport,
                Err(e) => warn!("Ignoring {ENV_VIEWPORT}={raw:?}: {e}"),
            }
        }
        if let Some(raw) = lookup(ENV_DEVICE_SCALE).filter(|v| !v.trim().is_empty()) {
            match raw.trim().parse::<f64>() {
                Ok(scale) => self.device_scale_factor = scale,
                Err(_) => warn!("Ignoring {ENV_DEVICE_SCALE}={raw:?}: not a number"),
            }
        }
        if let Some(raw) = lookup(ENV_MAX_DURATION_SECS).filter(|v| !v.trim().is_empty()) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.timeouts.job = Duration::from_secs(secs),
                Err(_) => warn!("Ignoring {ENV_MAX_DURATION_SECS}={raw:?}: not an integer"),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.timeouts;
        let named = [
            ("navigation", t.navigation),
            ("login", t.login),
            ("discovery", t.discovery),
            ("readiness", t.readiness),
            ("render", t.render),
            ("script", t.script),
            ("job", t.job),
            ("poll_interval", t.poll_interval),
        ];
        if let Some((name, _)) = named.iter().find(|(_, d)| d.is_zero()) {
            return Err(ExportError::Config(format!(
                "timeouts.{name} must be greater than zero"
            )));
        }
        if t.poll_interval >= t.discovery {
            return Err(ExportError::Config(format!(
                "timeouts.poll_interval ({:?}) must be shorter than timeouts.discovery ({:?})",
                t.poll_interval, t.discovery
            )));
        }
        if !(self.device_scale_factor.is_finite() && self.device_scale_factor > 0.0) {
            return Err(ExportError::Config(format!(
                "device_scale_factor must be positive, got {}",
                self.device_scale_factor
            )));
        }
        if self.node_command.trim().is_empty() {
            return Err(ExportError::Config(
                "node_command must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
