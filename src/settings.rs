use std::path::Path;
use std::time::Duration;

use dexport_lib::{Config, Credentials, ExportError};

use crate::cli::Cli;

/// Load config from a TOML file, central config, or return defaults, then
/// apply `DEXPORT_*` environment overrides.
/// Priority: explicit path > ~/.config/dexport/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, ExportError> {
    let mut cfg = Config::load(path)?;
    cfg.apply_env();
    Ok(cfg)
}

/// Overlay flags that were given on the command line, then validate.
pub fn resolve_config(mut config: Config, cli: &Cli) -> Result<Config, ExportError> {
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if cli.no_manifest {
        config.manifest = false;
    }
    if let Some(viewport) = cli.viewport {
        config.viewport = viewport;
    }
    if let Some(scale) = cli.device_scale {
        config.device_scale_factor = scale;
    }
    if cli.headed {
        config.headless = false;
    }
    if cli.strict_https {
        config.ignore_https_errors = false;
    }

    let secs = Duration::from_secs;
    let t = &mut config.timeouts;
    if let Some(v) = cli.nav_timeout {
        t.navigation = secs(v);
    }
    if let Some(v) = cli.login_timeout {
        t.login = secs(v);
    }
    if let Some(v) = cli.discovery_timeout {
        t.discovery = secs(v);
    }
    if let Some(v) = cli.render_timeout {
        t.render = secs(v);
    }
    if let Some(v) = cli.script_timeout {
        t.script = secs(v);
    }
    if let Some(v) = cli.job_timeout {
        t.job = secs(v);
    }

    config.validate()?;
    Ok(config)
}

pub fn credentials(cli: &Cli) -> Option<Credentials> {
    Credentials::from_parts(cli.username.clone(), cli.password.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn cli(extra: &[&str]) -> Cli {
        let mut args = vec!["dexport", "https://h/workspace/1", "svg"];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn absent_flags_keep_config_values() {
        let mut config = Config::default();
        config.timeouts.render = Duration::from_secs(90);
        config.output_dir = PathBuf::from("from-config");

        let resolved = resolve_config(config, &cli(&[])).unwrap();
        assert_eq!(resolved.timeouts.render, Duration::from_secs(90));
        assert_eq!(resolved.output_dir, PathBuf::from("from-config"));
        assert!(resolved.manifest);
        assert!(resolved.headless);
    }

    #[test]
    fn flags_override_config() {
        let resolved = resolve_config(
            Config::default(),
            &cli(&[
                "--render-timeout",
                "5",
                "--job-timeout",
                "10",
                "--output-dir",
                "out",
                "--headed",
                "--strict-https",
                "--no-manifest",
            ]),
        )
        .unwrap();
        assert_eq!(resolved.timeouts.render, Duration::from_secs(5));
        assert_eq!(resolved.timeouts.job, Duration::from_secs(10));
        assert_eq!(resolved.output_dir, PathBuf::from("out"));
        assert!(!resolved.headless);
        assert!(!resolved.ignore_https_errors);
        assert!(!resolved.manifest);
    }

    #[test]
    fn zero_timeout_flag_is_a_config_error() {
        let err = resolve_config(Config::default(), &cli(&["--discovery-timeout", "0"]))
            .unwrap_err();
        assert!(matches!(err, ExportError::Config(_)));
    }

    #[test]
    fn credentials_require_both_arguments() {
        assert!(credentials(&cli(&["alice", "secret"])).is_some());
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/dexport.toml"))).unwrap_err();
        assert!(err.to_string().contains("config"));
    }
}
