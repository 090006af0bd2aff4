//! Connection settings for the Data Plane API

use serde::{Deserialize, Serialize};

use hapsync_core::strategy::ApiVersion;

/// Environment variable overriding the API URL
pub const URL_ENV: &str = "HAPSYNC_URL";
/// Environment variable overriding the API password
pub const PASSWORD_ENV: &str = "HAPSYNC_PASSWORD";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Data Plane API connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPlaneConfig {
    /// Base URL without the version prefix (e.g., "http://127.0.0.1:5555")
    pub url: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub api_version: ApiVersion,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl DataPlaneConfig {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        api_version: ApiVersion,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            api_version,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Apply `HAPSYNC_URL` / `HAPSYNC_PASSWORD` from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(URL_ENV) {
            self.url = url;
        }
        if let Some(password) = lookup(PASSWORD_ENV) {
            self.password = password;
        }
    }

    /// Check the settings before any request is made
    pub fn validate(&self) -> Result<(), String> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(format!(
                "dataplane url '{}' must start with http:// or https://",
                self.url
            ));
        }
        if self.username.is_empty() {
            return Err("dataplane username must not be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("dataplane timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}
