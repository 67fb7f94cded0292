use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::RetryConfig;
use crate::error::{HarnessError, Result};
use crate::poll::PollConfig;

pub const HOST_VAR: &str = "DP_IDENTITY_HOST";
pub const PATH_VAR: &str = "DP_IDENTITY_PATH";
pub const USERNAME_VAR: &str = "DP_IDENTITY_USERNAME";
pub const PASSWORD_VAR: &str = "DP_IDENTITY_PASSWORD";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub identity: IdentityConfig,
    pub credentials: CredentialSettings,
    pub polling: PollingSettings,
}

/// Token endpoint and the values sent to it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub host: String,
    pub path: String,
    pub form_params: FormParams,
    pub authentication: BasicAuth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormParams {
    pub grant_type: String,
    pub scope: String,
    pub expires_in: String,
}

impl Default for FormParams {
    fn default() -> Self {
        Self {
            grant_type: "client_credentials".to_string(),
            scope: String::new(),
            expires_in: "3600".to_string(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Token cache and token request settings, all durations in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub ttl_ms: u64,
    pub max_attempts: u32,
    pub retry_interval_ms: u64,
    /// Upper bound on one token request, response body included
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            ttl_ms: 10 * 60 * 1000,
            max_attempts: 3,
            retry_interval_ms: 30_000,
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl CredentialSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::fixed(
            self.max_attempts,
            Duration::from_millis(self.retry_interval_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Overrides for the two poll presets; unset fields keep the preset value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub settle: PollOverrides,
    pub convergence: PollOverrides,
}

impl PollingSettings {
    pub fn settle(&self) -> PollConfig {
        self.settle.apply(PollConfig::settle())
    }

    pub fn convergence(&self) -> PollConfig {
        self.convergence.apply(PollConfig::convergence())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wait_ms: Option<u64>,
}

impl PollOverrides {
    pub fn apply(&self, mut base: PollConfig) -> PollConfig {
        if let Some(ms) = self.initial_delay_ms {
            base.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.poll_interval_ms {
            base.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_wait_ms {
            base.max_wait = Duration::from_millis(ms);
        }
        base
    }
}

impl IdentityConfig {
    /// Full URL of the token endpoint
    pub fn token_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let path = self.path.trim();
        if path.is_empty() {
            host.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", host, path)
        } else {
            format!("{}/{}", host, path)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(HarnessError::Config(format!(
                "identity host is not set (config file or {})",
                HOST_VAR
            )));
        }
        if self.authentication.username.trim().is_empty() {
            return Err(HarnessError::Config(format!(
                "identity username is not set (config file or {})",
                USERNAME_VAR
            )));
        }
        Ok(())
    }
}

impl HarnessConfig {
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::new()
    }

    /// `$XDG_CONFIG_HOME/dp-harness/config.toml` (or the platform equivalent)
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| HarnessError::Config("failed to get config directory".to_string()))?;
        Ok(config_dir.join("dp-harness").join("config.toml"))
    }

    /// Load the file (defaults if absent), then apply `.env` and environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        let mut config = Self::from_file_or_default(&path)?;

        if let Ok(env_file) = dotenvy::dotenv() {
            debug!("Loaded environment from {:?}", env_file);
        }
        config.apply_env_overrides(|key| std::env::var(key).ok());

        Ok(config)
    }

    pub fn from_file_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file {:?} doesn't exist, using defaults", path);
            return Ok(Self::default());
        }

        debug!("Loading config from: {:?}", path);
        let content = fs::read_to_string(path).map_err(|source| HarnessError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| HarnessError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override identity settings from variables resolved by `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let identity = &mut self.identity;
        let overrides: [(&str, &mut String); 4] = [
            (HOST_VAR, &mut identity.host),
            (PATH_VAR, &mut identity.path),
            (USERNAME_VAR, &mut identity.authentication.username),
            (PASSWORD_VAR, &mut identity.authentication.password),
        ];

        for (key, target) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                debug!("Using {} from environment", key);
                *target = value;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.identity.validate()?;
        let credentials = &self.credentials;
        if credentials.max_attempts == 0 {
            return Err(HarnessError::Config(
                "credentials.max_attempts must be at least 1".to_string(),
            ));
        }
        if credentials.request_timeout_ms == 0 || credentials.connect_timeout_ms == 0 {
            return Err(HarnessError::Config(
                "credentials request and connect timeouts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy safe to print: the password is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.identity.authentication.password.is_empty() {
            copy.identity.authentication.password = "********".to_string();
        }
        copy
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| HarnessError::Config(format!("failed to serialize config: {}", e)))
    }
}

/// Builder for HarnessConfig
#[derive(Debug, Default)]
pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token endpoint host and path
    pub fn issuer(mut self, host: impl Into<String>, path: impl Into<String>) -> Self {
        self.config.identity.host = host.into();
        self.config.identity.path = path.into();
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.identity.authentication = BasicAuth {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    pub fn form_params(mut self, form_params: FormParams) -> Self {
        self.config.identity.form_params = form_params;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.credentials.ttl_ms = to_millis(ttl);
        self
    }

    pub fn retry(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.config.credentials.max_attempts = max_attempts;
        self.config.credentials.retry_interval_ms = to_millis(interval);
        self
    }

    /// Request and connect timeouts for the token endpoint
    pub fn timeouts(mut self, request: Duration, connect: Duration) -> Self {
        self.config.credentials.request_timeout_ms = to_millis(request);
        self.config.credentials.connect_timeout_ms = to_millis(connect);
        self
    }

    pub fn build(self) -> HarnessConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();

        assert_eq!(config.credentials.ttl(), Duration::from_secs(600));
        assert_eq!(config.credentials.retry_config().attempts(), 3);
        assert_eq!(
            config.credentials.retry_config().delay,
            Duration::from_secs(30)
        );
        assert_eq!(config.credentials.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.credentials.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.identity.form_params.expires_in, "3600");
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: HarnessConfig = toml::from_str(
            r#"
            [identity]
            host = "https://identity.example.com/"
            path = "oauth2/token"

            [identity.form_params]
            grant_type = "password"
            scope = "documents"

            [identity.authentication]
            username = "svc"
            password = "pw"

            [credentials]
            ttl_ms = 300000

            [polling.convergence]
            max_wait_ms = 30000
            "#,
        )
        .unwrap();

        assert_eq!(
            config.identity.token_url(),
            "https://identity.example.com/oauth2/token"
        );
        assert_eq!(config.identity.form_params.grant_type, "password");
        assert_eq!(config.identity.form_params.expires_in, "3600");
        assert_eq!(config.credentials.ttl(), Duration::from_secs(300));
        assert_eq!(config.credentials.max_attempts, 3);

        let convergence = config.polling.convergence();
        assert_eq!(convergence.max_wait, Duration::from_secs(30));
        assert_eq!(convergence.poll_interval, PollConfig::convergence().poll_interval);
        assert_eq!(config.polling.settle().max_wait, PollConfig::settle().max_wait);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_replace_file_values() {
        let mut config = HarnessConfig::builder()
            .issuer("https://file.example.com", "/token")
            .basic_auth("file-user", "file-pass")
            .build();

        let vars: HashMap<&str, &str> = [
            (HOST_VAR, "https://env.example.com"),
            (PASSWORD_VAR, "env-pass"),
            (USERNAME_VAR, ""),
        ]
        .into_iter()
        .collect();

        config.apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.identity.host, "https://env.example.com");
        assert_eq!(config.identity.path, "/token");
        assert_eq!(config.identity.authentication.username, "file-user");
        assert_eq!(config.identity.authentication.password, "env-pass");
    }

    #[test]
    fn test_validate_rejects_missing_values() {
        let missing_host = HarnessConfig::default();
        assert!(matches!(
            missing_host.validate(),
            Err(HarnessError::Config(_))
        ));

        let zero_attempts = HarnessConfig::builder()
            .issuer("https://identity.example.com", "/token")
            .basic_auth("svc", "pw")
            .retry(0, Duration::from_secs(1))
            .build();
        assert!(zero_attempts.validate().is_err());

        let zero_timeout = HarnessConfig::builder()
            .issuer("https://identity.example.com", "/token")
            .basic_auth("svc", "pw")
            .timeouts(Duration::ZERO, Duration::from_secs(1))
            .build();
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_builder_keeps_sub_second_durations() {
        let config = HarnessConfig::builder()
            .retry(3, Duration::from_millis(1500))
            .ttl(Duration::from_millis(999))
            .timeouts(Duration::from_millis(250), Duration::from_millis(100))
            .build();

        assert_eq!(
            config.credentials.retry_config().delay,
            Duration::from_millis(1500)
        );
        assert_eq!(config.credentials.ttl(), Duration::from_millis(999));
        assert_eq!(config.credentials.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.credentials.connect_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_redacted_masks_password() {
        let config = HarnessConfig::builder()
            .issuer("https://identity.example.com", "/token")
            .basic_auth("svc", "hunter2")
            .build();

        let rendered = config.redacted().to_toml().unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("svc"));
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_from_file_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let config = HarnessConfig::from_file_or_default(&missing).unwrap();
        assert!(config.identity.host.is_empty());

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[identity\nhost = ").unwrap();
        assert!(matches!(
            HarnessConfig::from_file_or_default(&broken),
            Err(HarnessError::ConfigParse { .. })
        ));

        let valid = dir.path().join("config.toml");
        fs::write(&valid, "[credentials]\nmax_attempts = 5\n").unwrap();
        let config = HarnessConfig::from_file_or_default(&valid).unwrap();
        assert_eq!(config.credentials.max_attempts, 5);
    }
}
