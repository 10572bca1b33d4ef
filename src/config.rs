use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

fn default_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub reveal: RevealConfig,
    #[serde(default)]
    pub hotkey: HotkeyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeminiConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// 0 disables the timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub collapsed_height: u32,
    pub expanded_height: u32,
}

/// Where code blocks land relative to the progressively revealed prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodePlacement {
    /// Code blocks appear when the reveal cursor reaches them.
    #[default]
    Inline,
    /// Code blocks appear as soon as the reply arrives.
    Immediate,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RevealConfig {
    pub interval_ms: u64,
    pub copy_ack_ms: u64,
    pub scroll_delay_ms: u64,
    pub code_placement: CodePlacement,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub combo: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            model: default_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 700,
            collapsed_height: 80,
            expanded_height: 600,
        }
    }
}

impl Default for RevealConfig {
    fn default() -> Self {
        RevealConfig {
            interval_ms: 350,
            copy_ack_ms: 1200,
            scroll_delay_ms: 100,
            code_placement: CodePlacement::Inline,
        }
    }
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        HotkeyConfig {
            combo: "ctrl+shift+a".to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

impl RevealConfig {
    /// Never zero; the reveal timer cannot tick at a zero period.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    fn validate(&mut self) {
        if self.interval_ms == 0 {
            let fallback = RevealConfig::default().interval_ms;
            tracing::warn!("reveal.interval_ms must be positive. Using {} ms.", fallback);
            self.interval_ms = fallback;
        }
    }

    pub fn copy_ack(&self) -> Duration {
        Duration::from_millis(self.copy_ack_ms)
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::from_toml_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Error parsing config.toml: {}. Using defaults.", e),
                },
                Err(e) => tracing::warn!("Error reading config.toml: {}. Using defaults.", e),
            }
        } else if let Some(parent) = config_path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        Config::default()
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(contents)?;
        config.reveal.validate();
        Ok(config)
    }

    /// Reads the API key from the configured variable, after loading `.env`.
    pub fn api_key(&self) -> anyhow::Result<String> {
        let _ = dotenvy::dotenv();
        let var = &self.gemini.api_key_env;
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(anyhow::anyhow!(
                "missing API key: set {} in the environment or in a .env file",
                var
            )),
        }
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/command-bar")
        } else {
            PathBuf::from(".")
        }
    }
}
