//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::errors::ConfigError;
use crate::infrastructure::adapters::slack::rtm::ReconnectPolicy;
use crate::infrastructure::adapters::slack::verify::{RetryPolicy, DEFAULT_VERIFY_HOST};

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub slack: SlackConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    pub mention_name: String,
}

/// Slack adapter settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SlackConfig {
    pub token: String,
    pub proxy: Option<String>,
    /// Passed through to `chat.postMessage`
    pub parse: Option<String>,
    pub link_names: Option<bool>,
    pub unfurl_links: Option<bool>,
    pub unfurl_media: Option<bool>,
    /// Message subtypes dispatched in addition to `me_message`
    pub supported_message_subtypes: Vec<String>,
    /// When false, a TLS probe must succeed before the RTM stream is opened
    pub rtm_connection_verify_peer: bool,
    pub verify_host: String,
    pub verify_max_attempts: u32,
    pub verify_delay_secs: u64,
    pub auto_reconnect: bool,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "Slack Bridge".to_string(),
            mention_name: "bridge".to_string(),
        }
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            proxy: None,
            parse: None,
            link_names: None,
            unfurl_links: None,
            unfurl_media: None,
            supported_message_subtypes: Vec::new(),
            rtm_connection_verify_peer: true,
            verify_host: DEFAULT_VERIFY_HOST.to_string(),
            verify_max_attempts: 10,
            verify_delay_secs: 5,
            auto_reconnect: true,
            reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 60_000,
            max_reconnect_attempts: 10,
        }
    }
}

impl SlackConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn verify_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.verify_max_attempts,
            delay: Duration::from_secs(self.verify_delay_secs),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.auto_reconnect,
            initial_delay: Duration::from_millis(self.reconnect_delay_ms),
            max_delay: Duration::from_millis(self.max_reconnect_delay_ms),
            max_attempts: self.max_reconnect_attempts,
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();

        if let Ok(token) = std::env::var("SLACK_TOKEN") {
            config.slack.token = token;
        }

        if let Ok(proxy) = std::env::var("SLACK_PROXY") {
            config.slack.proxy = Some(proxy).filter(|p| !p.is_empty());
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slack.token.trim().is_empty() {
            return Err(ConfigError::MissingField("slack.token".to_string()));
        }
        if self.bot.mention_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "bot.mention-name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))
    }
}
