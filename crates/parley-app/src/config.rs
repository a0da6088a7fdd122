use std::path::Path;

use parley_core::Permission;
use serde::Deserialize;

use crate::{Error, Result, config_file_path};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_LOG_LEVEL: &str = "warn";
pub const SERVER_ENV: &str = "PARLEY_SERVER";

/// Whether mention notifications are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPreference {
    #[default]
    Ask,
    Allow,
    Deny,
}

impl From<NotificationPreference> for Permission {
    fn from(preference: NotificationPreference) -> Self {
        match preference {
            NotificationPreference::Ask => Permission::Undetermined,
            NotificationPreference::Allow => Permission::Granted,
            NotificationPreference::Deny => Permission::Denied,
        }
    }
}

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub notifications: NotificationPreference,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            notifications: NotificationPreference::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Loads the user's config file, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        toml::from_str(&contents).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Server to talk to: command line flag, then `PARLEY_SERVER`, then the
    /// config file.
    pub fn server_url(&self, flag: Option<&str>) -> String {
        let env = std::env::var(SERVER_ENV).ok();
        pick_server_url(flag, env.as_deref(), &self.server_url)
    }
}

fn pick_server_url(flag: Option<&str>, env: Option<&str>, configured: &str) -> String {
    [flag, env]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(configured)
        .to_string()
}

#[cfg(test)]
mod tests {
    use parley_core::Permission;
    use proptest::prelude::*;

    use super::{Config, DEFAULT_SERVER_URL, NotificationPreference, pick_server_url};

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn parses_all_fields() {
        let config: Config = toml::from_str(
            r#"
server_url = "https://chat.example.com"
notifications = "deny"
log_level = "debug"
"#,
        )
        .unwrap();
        assert_eq!(config.server_url, "https://chat.example.com");
        assert_eq!(config.notifications, NotificationPreference::Deny);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn unknown_notification_value_is_rejected() {
        assert!(toml::from_str::<Config>(r#"notifications = "sometimes""#).is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let path = std::env::temp_dir().join("parley-no-such-config.toml");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn preference_maps_to_permission() {
        assert_eq!(
            Permission::from(NotificationPreference::Ask),
            Permission::Undetermined
        );
        assert_eq!(
            Permission::from(NotificationPreference::Allow),
            Permission::Granted
        );
        assert_eq!(
            Permission::from(NotificationPreference::Deny),
            Permission::Denied
        );
    }

    #[test]
    fn flag_beats_env_beats_config() {
        assert_eq!(pick_server_url(Some("http://a"), Some("http://b"), "http://c"), "http://a");
        assert_eq!(pick_server_url(None, Some("http://b"), "http://c"), "http://b");
        assert_eq!(pick_server_url(None, Some("  "), "http://c"), "http://c");
        assert_eq!(pick_server_url(None, None, "http://c"), "http://c");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_preference_parsing(value in prop::sample::select(vec!["ask", "allow", "deny"])) {
            let config: Config = toml::from_str(&format!("notifications = \"{value}\"")).unwrap();
            let expected = match value {
                "ask" => NotificationPreference::Ask,
                "allow" => NotificationPreference::Allow,
                _ => NotificationPreference::Deny,
            };
            prop_assert_eq!(config.notifications, expected);
        }
    }
}
