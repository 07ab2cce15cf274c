//! Process-wide `tracing` setup.
//!
//! Events always go to stderr. When a log directory is configured they are
//! also appended to a daily rolling `a3s-scrape.log` through a non-blocking
//! writer whose guard lives for the rest of the process.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE: &str = "a3s-scrape.log";

/// Output encoding for log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Options for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory for the rolling log file; stderr only when `None`.
    pub log_dir: Option<PathBuf>,
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            format: LogFormat::Text,
            default_filter: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Raises the default filter to `debug`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.default_filter = "debug".to_string();
        }
        self
    }
}

/// Installs the global subscriber.
///
/// Returns the directory of the log file, if one is written. Calling it a
/// second time fails because the global subscriber is already set.
pub fn init_logging(config: LogConfig) -> anyhow::Result<Option<PathBuf>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let stderr = match config.format {
        LogFormat::Text => fmt::layer().with_writer(std::io::stderr).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    let (file, dir) = match config.log_dir.as_deref() {
        Some(dir) => {
            let dir = expand_home(dir);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create log directory: {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(rolling::daily(&dir, LOG_FILE));
            let _ = LOG_GUARD.set(guard);
            let layer = match config.format {
                LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
                LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
            };
            (Some(layer), Some(dir))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr)
        .with(file)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    Ok(dir)
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
