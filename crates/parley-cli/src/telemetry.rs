//! File logging for the `parley` binary. The terminal belongs to the TUI, so
//! log output always goes to `parley.log` in the user data directory.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "PARLEY_LOG";

const OUR_CRATES: &[&str] = &[
    "parley",
    "parley_api",
    "parley_app",
    "parley_auth",
    "parley_core",
    "parley_db",
    "parley_realtime",
];

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to configure logger: {0}")]
    Configure(String),
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// life of the process or buffered lines are lost.
pub fn init(level: &str, file: &Path) -> Result<WorkerGuard, InitError> {
    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::WARN);
    let filter = match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(default_filter_for(level)),
    };

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .map_err(|source| InitError::Io {
            path: file.to_path_buf(),
            source,
        })?;
    let (writer, guard) = tracing_appender::non_blocking(log_file);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_level(true)
        .with_target(level >= LevelFilter::DEBUG)
        .with_ansi(false)
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| InitError::Configure(err.to_string()))?;
    Ok(guard)
}

/// Verbose levels apply to our crates only; dependencies stay at `info`.
fn default_filter_for(level: LevelFilter) -> String {
    if level <= LevelFilter::INFO {
        return level.to_string().to_lowercase();
    }

    let level = level.to_string().to_lowercase();
    let mut filter = "info".to_string();
    for target in OUR_CRATES {
        filter.push_str(&format!(",{target}={level}"));
    }
    filter
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::default_filter_for;

    #[test]
    fn quiet_levels_apply_globally() {
        assert_eq!(default_filter_for(LevelFilter::WARN), "warn");
        assert_eq!(default_filter_for(LevelFilter::INFO), "info");
        assert_eq!(default_filter_for(LevelFilter::OFF), "off");
    }

    #[test]
    fn verbose_levels_are_scoped_to_our_crates() {
        let filter = default_filter_for(LevelFilter::DEBUG);
        assert!(filter.starts_with("info,"));
        assert!(filter.contains("parley_core=debug"));
        assert!(filter.contains("parley_realtime=debug"));
        assert!(!filter.contains("reqwest"));
    }
}
