//! Command-line and logging setup shared by the binaries.

use crate::config::LoggingConfig;

use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "seigniorage-watch.toml";

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("missing instance name\nusage: {0} [--config <path>] <instance>")]
    MissingInstance(String),
    #[error("{0} expects a value")]
    MissingValue(String),
    #[error("unexpected argument {0:?}")]
    Unexpected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub instance: String,
}

impl CliArgs {
    /// Parse `[--config <path>] <instance>`. The first item is the program name.
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let program = args.next().unwrap_or_else(|| "seigniorage-watch".into());

        let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        let mut instance = None;

        while let Some(arg) = args.next() {
            if arg == "--config" || arg == "-c" {
                let path = args.next().ok_or_else(|| CliError::MissingValue(arg.clone()))?;
                config_path = PathBuf::from(path);
            } else if let Some(path) = arg.strip_prefix("--config=") {
                config_path = PathBuf::from(path);
            } else if arg.starts_with('-') || instance.is_some() {
                return Err(CliError::Unexpected(arg));
            } else {
                instance = Some(arg);
            }
        }

        Ok(Self {
            config_path,
            instance: instance.ok_or(CliError::MissingInstance(program))?,
        })
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the config level.
pub fn init_logging(logging: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, CliError> {
        CliArgs::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_instance_with_default_config() {
        let args = parse(&["seigniorage-watch", "soup"]).unwrap();
        assert_eq!(args.instance, "soup");
        assert_eq!(args.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_config_flag_forms() {
        let a = parse(&["bin", "--config", "/etc/w.toml", "soup"]).unwrap();
        let b = parse(&["bin", "soup", "--config=/etc/w.toml"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.config_path, PathBuf::from("/etc/w.toml"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse(&["bin"]), Err(CliError::MissingInstance(_))));
        assert_eq!(parse(&["bin", "soup", "--config"]), Err(CliError::MissingValue("--config".into())));
        assert_eq!(parse(&["bin", "soup", "bdo"]), Err(CliError::Unexpected("bdo".into())));
        assert_eq!(parse(&["bin", "--live", "soup"]), Err(CliError::Unexpected("--live".into())));
    }
}
