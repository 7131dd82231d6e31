use crate::history::DEFAULT_HISTORY_CAP;
use crate::utils::{Result, ScamWatchError};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_COMPLETION_URL: &str = "https://genai.hkbu.edu.hk/general/rest";
pub const DEFAULT_MODEL: &str = "gpt-4-o-mini";
pub const DEFAULT_API_VERSION: &str = "2024-05-01-preview";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_token: Option<String>,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    /// Where the store lives; defaults to `~/.scamwatch/data`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Optional file receiving only activity (audit) events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_log: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model_name: String,
    pub api_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COMPLETION_URL.to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            access_token: None,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is expired
    pub inactivity_timeout_secs: u64,
    /// How often the sweeper runs. A session can stay active for up to one
    /// interval past the timeout.
    pub sweep_interval_secs: u64,
    /// Refuse a second login of the same user from another chat
    pub single_session_per_user: bool,
    /// Log everybody out when the bot starts
    pub logout_on_restart: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 60,
            sweep_interval_secs: 60,
            single_session_per_user: false,
            logout_on_restart: true,
        }
    }
}

impl SessionConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_entries_per_user: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries_per_user: DEFAULT_HISTORY_CAP,
        }
    }
}

/// Loggable view of the configuration; secrets reduced to flags
#[derive(Debug, Clone)]
pub struct ConfigSummary {
    pub telegram_configured: bool,
    pub completion_token_configured: bool,
    pub completion_url: String,
    pub model: String,
    pub inactivity_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub history_cap: usize,
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Resolved data directory
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".scamwatch").join("data")))
    }

    /// The per-user history cap; `validate` guarantees it is positive
    pub fn history_cap(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.history.max_entries_per_user).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.inactivity_timeout_secs == 0 {
            return Err(ScamWatchError::config(
                "session.inactivity_timeout_secs must be greater than zero",
            ));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(ScamWatchError::config(
                "session.sweep_interval_secs must be greater than zero",
            ));
        }
        if self.history.max_entries_per_user == 0 {
            return Err(ScamWatchError::config(
                "history.max_entries_per_user must be greater than zero",
            ));
        }
        if self.completion.timeout_seconds == 0 {
            return Err(ScamWatchError::config(
                "completion.timeout_seconds must be greater than zero",
            ));
        }
        if self.completion.base_url.trim().is_empty() || self.completion.model_name.trim().is_empty()
        {
            return Err(ScamWatchError::config(
                "completion.base_url and completion.model_name must not be empty",
            ));
        }
        Ok(())
    }

    pub fn get_safe_summary(&self) -> ConfigSummary {
        ConfigSummary {
            telegram_configured: self.telegram_token.is_some(),
            completion_token_configured: self.completion.access_token.is_some(),
            completion_url: self.completion.base_url.clone(),
            model: self.completion.model_name.clone(),
            inactivity_timeout_secs: self.session.inactivity_timeout_secs,
            sweep_interval_secs: self.session.sweep_interval_secs,
            history_cap: self.history.max_entries_per_user,
            data_dir: self.data_dir(),
        }
    }
}
