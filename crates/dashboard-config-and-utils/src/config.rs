//! Configuration management for the dashboard tools.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://random.supabase.co",
};

/// Default Supabase publishable key. Set `SUPABASE_PUBLISHABLE_KEY` at build
/// time to override.
pub const DEFAULT_SUPABASE_PUBLISHABLE_KEY: &str = match option_env!("SUPABASE_PUBLISHABLE_KEY") {
    Some(key) => key,
    None => "random-key",
};

/// Default web app URL used for the federated sign-in handoff.
pub const DEFAULT_WEB_APP_URL: &str = match option_env!("DASHBOARD_WEB_APP_URL") {
    Some(url) => url,
    None => "https://folio.dev",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default UI locale tag.
pub const DEFAULT_LOCALE: &str = "en";

/// Default time allowed for a federated sign-in to complete.
pub const DEFAULT_FEDERATED_TIMEOUT_SECS: u64 = 180;

/// Main dashboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase publishable API key (public, safe to expose).
    #[serde(default = "default_supabase_publishable_key")]
    pub supabase_publishable_key: String,
    /// Web app hosting the social sign-in popup.
    #[serde(default = "default_web_app_url")]
    pub web_app_url: String,
    /// Locale tag for user-facing messages ("en", "he").
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Seconds to wait for a federated sign-in before giving up.
    #[serde(default = "default_federated_timeout_secs")]
    pub federated_timeout_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_publishable_key() -> String {
    DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string()
}

fn default_web_app_url() -> String {
    DEFAULT_WEB_APP_URL.to_string()
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

fn default_federated_timeout_secs() -> u64 {
    DEFAULT_FEDERATED_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_publishable_key: default_supabase_publishable_key(),
            web_app_url: default_web_app_url(),
            locale: default_locale(),
            federated_timeout_secs: DEFAULT_FEDERATED_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    ///
    /// Supabase URL and key are compile-time only and always use the
    /// built-in defaults regardless of the file contents.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.supabase_url = DEFAULT_SUPABASE_URL.to_string();
        config.supabase_publishable_key = DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string();

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override runtime settings from environment variables.
    fn load_from_env(&mut self) {
        if let Some(level) = env_non_empty("DASHBOARD_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(locale) = env_non_empty("DASHBOARD_LOCALE") {
            self.locale = locale;
        }
        if let Some(url) = env_non_empty("DASHBOARD_WEB_APP_URL") {
            self.web_app_url = url;
        }
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }

    /// Web app base URL without a trailing slash.
    pub fn web_app_base(&self) -> CoreResult<String> {
        let parsed = Url::parse(&self.web_app_url)?;
        if parsed.cannot_be_a_base() {
            return Err(CoreError::Config(format!(
                "web_app_url is not a base URL: {}",
                self.web_app_url
            )));
        }
        Ok(self.web_app_url.trim_end_matches('/').to_string())
    }

    /// Federated sign-in timeout as a Duration.
    pub fn federated_timeout(&self) -> Duration {
        Duration::from_secs(self.federated_timeout_secs.max(1))
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
