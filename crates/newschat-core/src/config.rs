//! Configuration management for newschat.
//!
//! Loads configuration from ${NEWSCHAT_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Listener and session lifecycle settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds to wait for sessions and the refresher on shutdown.
    pub shutdown_grace_secs: u64,
    /// Optional text file shown above the news list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub welcome_art: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 23234,
            shutdown_grace_secs: 30,
            welcome_art: None,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Reads the welcome art file, if one is configured and readable.
    pub fn load_welcome_art(&self) -> Option<String> {
        let path = self.welcome_art.as_ref()?;
        match fs::read_to_string(path) {
            Ok(art) => Some(art),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to load welcome art");
                None
            }
        }
    }
}

/// Content source and refresh cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    /// API key for the news source. Falls back to `NEWS_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub region: String,
    pub base_url: String,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            region: "us".to_string(),
            base_url: "https://newsapi.org".to_string(),
            refresh_interval_secs: 15 * 60,
            request_timeout_secs: 10,
        }
    }
}

impl NewsConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Returns the configured API key, or `NEWS_API_KEY` from the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| {
                std::env::var("NEWS_API_KEY")
                    .ok()
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
            })
    }
}

/// A challenge question and where its expected answer comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeQuestion {
    pub prompt: String,
    /// Literal expected answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Environment variable holding the expected answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_env: Option<String>,
}

/// Authentication settings consulted by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JSON allow-list of `{username, publicKey}` entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_keys: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub challenge: Vec<ChallengeQuestion>,
    /// Accept any user without a challenge. Local development only.
    pub allow_unauthenticated: bool,
}

/// Log output settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for a daily rolling log file, in addition to stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub news: NewsConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
}

pub mod paths {
    //! Path resolution for newschat configuration.
    //!
    //! NEWSCHAT_HOME resolution order:
    //! 1. NEWSCHAT_HOME environment variable (if set)
    //! 2. ~/.config/newschat (default)
    //! 3. ./.newschat when no home directory is known

    use std::path::PathBuf;

    pub fn newschat_home() -> PathBuf {
        if let Ok(home) = std::env::var("NEWSCHAT_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".newschat"),
            |h| h.join(".config").join("newschat"),
        )
    }

    pub fn config_path() -> PathBuf {
        newschat_home().join("config.toml")
    }
}

impl Config {
    /// Loads configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Renders the default configuration as TOML.
    pub fn generate() -> Result<String> {
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")
    }

    /// Writes the default configuration to `path`. Fails if the file exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, Self::generate()?)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.address(), "localhost:23234");
        assert_eq!(config.news.refresh_interval(), Duration::from_secs(900));
        assert_eq!(config.news.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.server.shutdown_grace(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 2222

[news]
region = "gb"
refresh_interval_secs = 60

[[auth.challenge]]
prompt = "Which editor is best? "
answer_env = "QUESTION_1"

[[auth.challenge]]
prompt = "Who wrote this app? "
answer = "someone"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 2222);
        assert_eq!(config.news.region, "gb");
        assert_eq!(config.news.base_url, "https://newsapi.org");
        assert_eq!(config.news.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.auth.challenge.len(), 2);
        assert_eq!(
            config.auth.challenge[0].answer_env.as_deref(),
            Some("QUESTION_1")
        );
        assert_eq!(config.auth.challenge[1].answer.as_deref(), Some("someone"));
        assert!(!config.auth.allow_unauthenticated);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn test_configured_api_key_wins_over_environment() {
        let config = NewsConfig {
            api_key: Some("  from-config ".to_string()),
            ..NewsConfig::default()
        };
        assert_eq!(config.resolved_api_key().as_deref(), Some("from-config"));
    }

    #[test]
    fn test_welcome_art_missing_file_is_none() {
        let config = ServerConfig {
            welcome_art: Some(PathBuf::from("/definitely/not/here.txt")),
            ..ServerConfig::default()
        };
        assert!(config.load_welcome_art().is_none());
    }

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::init(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let err = Config::init(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
