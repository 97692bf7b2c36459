//! User configuration for the `cmr` binary.
//!
//! Values come from `~/.config/cmr/config.json` (or `CMR_CONFIG_PATH`), then
//! `CMR_ENVIRONMENT`, `CMR_TOKEN` and `CMR_BEARER_TOKEN`, then command line
//! flags, each layer overriding the previous one.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use cmr_api::ClientConfig;
use cmr_types::Environment;
use dirs_next::{config_dir, home_dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value '{value}' in {variable}: {reason}")]
    InvalidVariable {
        variable: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub environment: Option<Environment>,
    pub token: Option<String>,
    pub bearer_token: Option<String>,
    /// Page size used by `--stream` when no flag is given.
    pub page_size: Option<u64>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl CliConfig {
    /// Load the file at the default path and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_path(&default_config_path())?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = non_empty_var("CMR_ENVIRONMENT") {
            let environment = value.parse::<Environment>().map_err(|error| ConfigError::InvalidVariable {
                variable: "CMR_ENVIRONMENT",
                value: value.clone(),
                reason: error.to_string(),
            })?;
            self.environment = Some(environment);
        }
        if let Some(token) = non_empty_var("CMR_TOKEN") {
            self.token = Some(token);
        }
        if let Some(token) = non_empty_var("CMR_BEARER_TOKEN") {
            self.bearer_token = Some(token);
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::default();
        if let Some(user_agent) = self.user_agent.as_ref().filter(|agent| !agent.trim().is_empty()) {
            client.user_agent = user_agent.clone();
        }
        if let Some(seconds) = self.timeout_secs {
            client.timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
        }
        client
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// `CMR_CONFIG_PATH` when set, otherwise `<config dir>/cmr/config.json`.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var("CMR_CONFIG_PATH")
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cmr")
        .join("config.json")
}

fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if trimmed == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = trimmed.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG_VARS: [&str; 4] = ["CMR_CONFIG_PATH", "CMR_ENVIRONMENT", "CMR_TOKEN", "CMR_BEARER_TOKEN"];

    fn cleared<R>(overrides: &[(&str, Option<&str>)], run: impl FnOnce() -> R) -> R {
        let mut vars: Vec<(&str, Option<&str>)> = CONFIG_VARS.iter().map(|name| (*name, None)).collect();
        for (name, value) in overrides {
            vars.retain(|(existing, _)| existing != name);
            vars.push((*name, *value));
        }
        temp_env::with_vars(vars, run)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.json");
        assert_eq!(CliConfig::from_path(&path).expect("load"), CliConfig::default());
    }

    #[test]
    fn reads_file_and_applies_env_overrides() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"environment":"uat","token":"file-token","page_size":50,"timeout_secs":0}}"#
        )
        .expect("write config");
        let path = file.path().to_string_lossy().to_string();

        let config = cleared(
            &[("CMR_CONFIG_PATH", Some(path.as_str())), ("CMR_TOKEN", Some("env-token"))],
            CliConfig::load,
        )
        .expect("load config");

        assert_eq!(config.environment, Some(Environment::Uat));
        assert_eq!(config.token.as_deref(), Some("env-token"));
        assert_eq!(config.page_size, Some(50));
        assert_eq!(config.client_config().timeout, None);
    }

    #[test]
    fn environment_variable_overrides_file_environment() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"environment":"uat"}}"#).expect("write config");
        let path = file.path().to_string_lossy().to_string();

        let config = cleared(
            &[("CMR_CONFIG_PATH", Some(path.as_str())), ("CMR_ENVIRONMENT", Some("sit"))],
            CliConfig::load,
        )
        .expect("load config");
        assert_eq!(config.environment, Some(Environment::Sit));

        let invalid = cleared(
            &[("CMR_CONFIG_PATH", Some(path.as_str())), ("CMR_ENVIRONMENT", Some("staging"))],
            CliConfig::load,
        );
        assert!(matches!(invalid, Err(ConfigError::InvalidVariable { .. })));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{ not json").expect("write config");
        assert!(matches!(CliConfig::from_path(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn config_path_honours_override() {
        let path = cleared(&[("CMR_CONFIG_PATH", Some("/tmp/cmr-test/config.json"))], default_config_path);
        assert_eq!(path, PathBuf::from("/tmp/cmr-test/config.json"));

        let default = cleared(&[], default_config_path);
        assert!(default.ends_with("cmr/config.json"));
    }

    #[test]
    fn client_config_uses_user_agent_and_timeout() {
        let config = CliConfig {
            user_agent: Some("my-agent/1.0".into()),
            timeout_secs: Some(5),
            ..CliConfig::default()
        };
        let client = config.client_config();
        assert_eq!(client.user_agent, "my-agent/1.0");
        assert_eq!(client.timeout, Some(Duration::from_secs(5)));
    }
}
