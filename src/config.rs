use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
///
/// A missing config file is not an error; every section has defaults.
/// Credentials never live here — see [`Credentials::from_env`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Polling interval in seconds for trade detection.
    pub poll_interval_secs: u64,
    /// Interval in seconds between liveness log lines from the monitor task.
    pub heartbeat_secs: u64,
    /// Local-time hour/minute at which the daily summary is flushed.
    pub summary_hour: u32,
    pub summary_minute: u32,
    /// Path of the persisted session state file.
    pub state_path: String,
    /// Path of the persisted daily rollup file.
    pub daily_path: String,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            heartbeat_secs: 3600,
            summary_hour: 23,
            summary_minute: 58,
            state_path: "state.json".to_string(),
            daily_path: "daily_summary.json".to_string(),
        }
    }
}

/// Telegram settings (the bot token itself comes from the environment).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Chat to notify when resuming a session persisted before chat ids
    /// were recorded. Normal sessions carry their own chat id.
    pub default_chat_id: Option<String>,
}

impl AppConfig {
    /// Load config from the given TOML file path. A missing file yields the
    /// defaults; an unparseable file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }
}

/// API credentials, read from the environment (`.env` supported via dotenvy).
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Telegram bot token from @BotFather.
    pub bot_token: String,
    /// opinion.trade open-API key.
    pub venue_api_key: String,
    /// Moralis API key; optional, smart-wallet discovery degrades without it.
    pub moralis_api_key: Option<String>,
}

impl Credentials {
    /// Read credentials, failing fast on anything required. This is the only
    /// fatal startup check.
    pub fn from_env() -> Result<Self> {
        let bot_token = require_env("TELEGRAM_BOT_TOKEN")?;
        let venue_api_key = require_env("OPINION_API_KEY")?;
        let moralis_api_key = std::env::var("MORALIS_API_KEY")
            .ok()
            .filter(|v| !v.is_empty());
        Ok(Self {
            bot_token,
            venue_api_key,
            moralis_api_key,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => bail!("missing required environment variable: {name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let config = AppConfig::load(Path::new("/nonexistent/config.toml")).expect("defaults");
        assert_eq!(config.settings.poll_interval_secs, 5);
        assert_eq!(config.settings.summary_hour, 23);
        assert_eq!(config.settings.summary_minute, 58);
        assert!(config.telegram.default_chat_id.is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [settings]
            poll_interval_secs = 30
            "#,
        )
        .expect("parse");
        assert_eq!(config.settings.poll_interval_secs, 30);
        assert_eq!(config.settings.heartbeat_secs, 3600);
        assert_eq!(config.settings.state_path, "state.json");
    }
}
