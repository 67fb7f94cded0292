//! Per-context access token cache
//!
//! Each [`ExecutionContext`] owns at most one cached token. A token is reused until it
//! is older than the configured TTL, after which the next caller fetches a new one.
//! Fetching retries rejected responses on a fixed interval and gives up after a bounded
//! number of attempts.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::context::{CachedCredential, ExecutionContext};
use super::issuer::{HttpTokenIssuer, TokenIssuer, TokenReply};
use super::retry::RetryConfig;
use crate::clock::{Clock, TokioClock};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};

/// Shorter than the issuer's advertised hour; tokens have been seen expiring early.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

pub struct CredentialCache {
    issuer: Arc<dyn TokenIssuer>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    retry: RetryConfig,
    entries: RwLock<HashMap<ExecutionContext, CachedCredential>>,
}

impl CredentialCache {
    pub fn new(issuer: Arc<dyn TokenIssuer>) -> Self {
        Self {
            issuer,
            clock: Arc::new(TokioClock),
            ttl: DEFAULT_TTL,
            retry: RetryConfig::default(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache backed by the HTTP issuer described in `config`
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        let issuer = HttpTokenIssuer::from_config(config)?;

        Ok(Self::new(Arc::new(issuer))
            .with_ttl(config.credentials.ttl())
            .with_retry(config.credentials.retry_config()))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Access token for `context`, fetched only when nothing fresh is cached
    pub async fn get_credential(&self, context: &ExecutionContext) -> Result<String> {
        let now = self.clock.now();

        if let Some(cached) = self.entries.read().await.get(context) {
            if cached.is_fresh(now, self.ttl) {
                debug!("Using cached access token for context {}", context);
                return Ok(cached.value.clone());
            }
            debug!("Cached access token for context {} has expired", context);
        }

        let token = self.fetch_with_retry().await?;
        let issued_at = self.clock.now();

        self.entries
            .write()
            .await
            .insert(context.clone(), CachedCredential::new(token.clone(), issued_at));

        info!("Issued new access token for context {}", context);
        Ok(token)
    }

    /// `Authorization` header value for `context`
    pub async fn bearer_token(&self, context: &ExecutionContext) -> Result<String> {
        let token = self.get_credential(context).await?;
        Ok(format!("Bearer {}", token))
    }

    /// Drop the cached token for `context`, if any
    pub async fn invalidate(&self, context: &ExecutionContext) {
        if self.entries.write().await.remove(context).is_some() {
            debug!("Invalidated access token for context {}", context);
        }
    }

    /// Drop every cached token (suite teardown)
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        debug!("Clearing {} cached access tokens", entries.len());
        entries.clear();
    }

    pub async fn cached_contexts(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn fetch_with_retry(&self) -> Result<String> {
        let attempts = self.retry.attempts();
        let mut last_status = None;
        let mut last_body = String::new();

        for attempt in 1..=attempts {
            match self.issuer.request_token().await {
                Ok(response) => match response.classify() {
                    TokenReply::Issued(token) => {
                        if attempt > 1 {
                            info!("Access token request succeeded on attempt {}", attempt);
                        }
                        return Ok(token);
                    }
                    TokenReply::Malformed => {
                        return Err(HarnessError::MalformedCredentialResponse {
                            status: response.status,
                            body: response.body,
                        });
                    }
                    TokenReply::Rejected => {
                        warn!(
                            "Access token request was not successful, status code is {} (attempt {}/{})",
                            response.status, attempt, attempts
                        );
                        last_status = Some(response.status);
                        last_body = response.body;
                    }
                },
                Err(error) => {
                    warn!(
                        "Access token request failed (attempt {}/{}): {:#}",
                        attempt, attempts, error
                    );
                    last_status = None;
                    last_body = format!("{:#}", error);
                }
            }

            if attempt < attempts {
                let delay = self.retry.delay;
                debug!("Waiting {:?} before next access token request", delay);
                self.clock.sleep(delay).await;
            }
        }

        Err(HarnessError::AuthExhausted {
            attempts,
            status: last_status,
            body: last_body,
        })
    }
}
