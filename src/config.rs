use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";

pub const ENV_API_BASE_URL: &str = "CHAT_API_BASE_URL";
pub const ENV_WS_BASE_URL: &str = "CHAT_WS_BASE_URL";
pub const ENV_API_TOKEN: &str = "CHAT_API_TOKEN";

/// Which REST endpoint backs the history loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySource {
    /// `GET /chat-sessions/{id}/messages`
    ChatSessions,
    /// `GET /match-relations/{id}/realtime-messages`
    MatchRelations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub ws_base_url: String,
    /// Opaque bearer credential. Usually supplied through the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    pub reconnect_delay_ms: u64,
    pub typing_debounce_ms: u64,
    /// Local expiry for the peer's typing indicator. `None` trusts the
    /// peer's explicit stop frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typing_expiry_ms: Option<u64>,
    pub history_page_size: u32,
    pub history_source: HistorySource,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            ws_base_url: "ws://localhost:8000".to_string(),
            api_token: None,
            reconnect_delay_ms: 3_000,
            typing_debounce_ms: 500,
            typing_expiry_ms: None,
            history_page_size: 50,
            history_source: HistorySource::MatchRelations,
        }
    }
}

impl AppConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn typing_debounce(&self) -> Duration {
        Duration::from_millis(self.typing_debounce_ms)
    }

    pub fn typing_expiry(&self) -> Option<Duration> {
        self.typing_expiry_ms.map(Duration::from_millis)
    }

    /// Applies environment overrides on top of the file values.
    pub fn apply_env(mut self) -> Self {
        self.apply_overrides(|key| env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(url) = non_empty(ENV_WS_BASE_URL) {
            self.ws_base_url = url;
        }
        if let Some(token) = non_empty(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
    }
}

/// Loads the config file, falling back to defaults when it is missing or
/// unreadable. Never fails: a broken config should not keep the chat closed.
pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let config: AppConfig =
            serde_json::from_str(r#"{"reconnect_delay_ms": 1000}"#).expect("parse");
        assert_eq!(config.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(config.typing_debounce(), Duration::from_millis(500));
        assert_eq!(config.history_page_size, 50);
        assert_eq!(config.typing_expiry(), None);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config("does/not/exist.json");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn env_overrides_replace_urls_and_token() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_API_BASE_URL, "https://api.example.com/api/v1"),
            (ENV_API_TOKEN, "secret"),
            (ENV_WS_BASE_URL, "  "),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_base_url, "https://api.example.com/api/v1");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.ws_base_url, "ws://localhost:8000");
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = env::temp_dir().join(format!("persona-chat-{}", uuid::Uuid::new_v4()));
        let path = dir.join("chat.json");
        let path = path.to_str().expect("utf8 path");

        let config = AppConfig {
            typing_expiry_ms: Some(5_000),
            history_source: HistorySource::ChatSessions,
            ..AppConfig::default()
        };
        save_config(path, &config).expect("save");
        assert_eq!(load_config(path), config);

        let _ = fs::remove_dir_all(dir);
    }
}
