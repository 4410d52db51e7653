use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter (trace, debug, info, warn, error, or a full directive).
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for log files. If None, no file logging.
    pub log_dir: Option<PathBuf>,

    /// Prefix for log file names.
    #[serde(default = "default_prefix")]
    pub file_prefix: String,

    /// Log rotation: "hourly", "daily", "never".
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Whether to output JSON format.
    #[serde(default)]
    pub json_format: bool,

    /// Whether to also output to console (stderr).
    #[serde(default = "default_true")]
    pub console_output: bool,
}

fn default_level() -> String {
    "info".into()
}

fn default_prefix() -> String {
    "fdfs".into()
}

fn default_rotation() -> String {
    "hourly".into()
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_level(),
            log_dir: None,
            file_prefix: default_prefix(),
            rotation: default_rotation(),
            json_format: false,
            console_output: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("cannot create log file appender: {0}")]
    Appender(#[from] rolling::InitError),

    #[error("global logger already installed")]
    AlreadyInstalled(#[from] tracing::dispatcher::SetGlobalDefaultError),
}

type Base = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync>;

/// A dispatcher that discards everything. This is what a client logs to
/// unless it is handed a real one.
pub fn noop_dispatch() -> Dispatch {
    Dispatch::none()
}

/// Build a dispatcher from `config` without installing it anywhere.
///
/// `RUST_LOG` takes precedence over `config.level` when set. The returned
/// guard (present when file logging is on) must be kept alive for as long
/// as the dispatcher is in use.
pub fn build_dispatch(config: &LogConfig) -> Result<(Dispatch, Option<WorkerGuard>), LogError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.console_output {
        let console = fmt::layer().with_writer(std::io::stderr);
        if config.json_format {
            layers.push(Box::new(console.json()));
        } else {
            layers.push(Box::new(console));
        }
    }

    let guard = match config.log_dir {
        Some(ref log_dir) => {
            let rotation = match config.rotation.as_str() {
                "daily" => rolling::Rotation::DAILY,
                "never" => rolling::Rotation::NEVER,
                // default to hourly
                _ => rolling::Rotation::HOURLY,
            };

            let file_appender = rolling::RollingFileAppender::builder()
                .rotation(rotation)
                .filename_prefix(&config.file_prefix)
                .filename_suffix("log")
                .build(log_dir)?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file = fmt::layer().with_ansi(false).with_writer(non_blocking);
            if config.json_format {
                layers.push(Box::new(file.json()));
            } else {
                layers.push(Box::new(file));
            }
            Some(guard)
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry().with(env_filter).with(layers);
    Ok((Dispatch::new(subscriber), guard))
}

/// Initialize the logging system. Should be called once at program startup.
///
/// Returns the dispatcher that was installed, so it can also be handed to
/// components that take an explicit logger, and a guard that must be held
/// alive for the duration of the program (for the non-blocking file writer).
pub fn init_logging(config: &LogConfig) -> Result<(Dispatch, Option<WorkerGuard>), LogError> {
    let (dispatch, guard) = build_dispatch(config)?;
    tracing::dispatcher::set_global_default(dispatch.clone())?;
    Ok((dispatch, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = LogConfig::default();
        assert_eq!(cfg.level, "info");
        assert_eq!(cfg.file_prefix, "fdfs");
        assert_eq!(cfg.rotation, "hourly");
        assert!(cfg.console_output);
        assert!(!cfg.json_format);
        assert!(cfg.log_dir.is_none());
    }

    #[test]
    fn test_serde_defaults() {
        let cfg: LogConfig = serde_json::from_str(r#"{"level": "debug", "log_dir": null}"#).unwrap();
        assert_eq!(cfg.level, "debug");
        assert_eq!(cfg.file_prefix, "fdfs");
        assert!(cfg.console_output);
    }

    #[test]
    fn test_noop_dispatch_is_disabled() {
        let dispatch = noop_dispatch();
        tracing::dispatcher::with_default(&dispatch, || {
            assert!(!tracing::enabled!(tracing::Level::ERROR));
        });
    }

    #[test]
    fn test_file_logging() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LogConfig {
            level: "debug".into(),
            log_dir: Some(dir.path().to_path_buf()),
            rotation: "never".into(),
            console_output: false,
            ..LogConfig::default()
        };
        let (dispatch, guard) = build_dispatch(&cfg).unwrap();
        assert!(guard.is_some());
        tracing::dispatcher::with_default(&dispatch, || {
            info!(answer = 42, "written to file");
        });
        drop(guard);

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("fdfs"));
        let text = std::fs::read_to_string(&entries[0]).unwrap();
        assert!(text.contains("written to file"));
    }
}
