use std::path::PathBuf;

use directories::ProjectDirs;

pub mod config;

pub use config::{Config, NotificationPreference};

const APP_QUALIFIER: &str = "dev";
const APP_ORGANIZATION: &str = "parley";
const APP_NAME: &str = "parley";
const STORE_DB_FILENAME: &str = "parley.sqlite3";
const CONFIG_FILENAME: &str = "config.toml";
const LOG_FILENAME: &str = "parley.log";

/// Keyring service under which the credential encryption key lives.
pub const KEYRING_SERVICE: &str = "parley";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not resolve user data directory")]
    MissingUserDataDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).ok_or(Error::MissingUserDataDir)
}

/// App-local user data directory (for durable application state).
pub fn user_data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_local_dir().to_path_buf())
}

pub fn ensure_user_data_dir() -> Result<PathBuf> {
    let dir = user_data_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn store_db_path() -> Result<PathBuf> {
    Ok(ensure_user_data_dir()?.join(STORE_DB_FILENAME))
}

pub fn log_file_path() -> Result<PathBuf> {
    Ok(ensure_user_data_dir()?.join(LOG_FILENAME))
}

pub fn config_file_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILENAME))
}
