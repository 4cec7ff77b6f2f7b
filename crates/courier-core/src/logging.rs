//! Logging bootstrap.
//!
//! Library code only emits `tracing` events. The host calls [`init_logging`]
//! once: debug mode prints to the console, otherwise events go to a
//! daily-rolling file so failed messages can be replayed by hand.

use std::str::FromStr;

use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level `{0}`")]
    InvalidLevel(String),

    #[error(transparent)]
    Filter(#[from] tracing_subscriber::filter::FromEnvError),

    #[error("cannot create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
pub fn init_logging(
    debug: bool,
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, LoggingError> {
    let level =
        Level::from_str(&config.level).map_err(|_| LoggingError::InvalidLevel(config.level.clone()))?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env()?;

    if debug {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
        return Ok(None);
    }

    std::fs::create_dir_all(&config.dir)?;
    let appender = tracing_appender::rolling::daily(&config.dir, &config.file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .try_init()?;
    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_level() {
        let config = LoggingConfig {
            level: "loud".to_string(),
            ..LoggingConfig::default()
        };
        let err = init_logging(true, &config).unwrap_err();
        assert!(matches!(err, LoggingError::InvalidLevel(level) if level == "loud"));
    }
}
