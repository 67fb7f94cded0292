use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use crate::config::{BasicAuth, FormParams, HarnessConfig, IdentityConfig};
use crate::error::{HarnessError, Result};

const ACCESS_TOKEN_FIELD: &str = "access_token";
const USER_AGENT: &str = concat!("dp-harness/", env!("CARGO_PKG_VERSION"));

/// Raw answer from the credential issuer
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// How a single token response should be treated
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenReply {
    Issued(String),
    /// Wrong status or content type; worth another attempt
    Rejected,
    /// 200 without a usable token; retrying will not help
    Malformed,
}

impl TokenResponse {
    /// 200 response with a JSON body
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.into(),
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("text/plain".to_string()),
            body: body.into(),
        }
    }

    pub fn is_json(&self) -> bool {
        let Some(content_type) = self.content_type.as_deref() else {
            return false;
        };
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        matches!(
            essence.as_str(),
            "application/json" | "application/javascript" | "text/javascript" | "text/json"
        ) || essence.ends_with("+json")
    }

    pub(crate) fn classify(&self) -> TokenReply {
        if self.status != 200 || !self.is_json() {
            return TokenReply::Rejected;
        }

        let token = serde_json::from_str::<Value>(&self.body)
            .ok()
            .and_then(|data| {
                data.get(ACCESS_TOKEN_FIELD)
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });

        match token {
            Some(token) if !token.trim().is_empty() => TokenReply::Issued(token),
            _ => TokenReply::Malformed,
        }
    }
}

/// Source of access tokens
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Perform one credential exchange. Transport failures are `Err`,
    /// any HTTP answer (including error statuses) is `Ok`.
    async fn request_token(&self) -> anyhow::Result<TokenResponse>;
}

/// OAuth token endpoint called with form parameters and HTTP basic auth
#[derive(Debug, Clone)]
pub struct HttpTokenIssuer {
    client: Client,
    token_url: String,
    form_params: FormParams,
    authentication: BasicAuth,
}

impl HttpTokenIssuer {
    /// Issuer with request and connect timeouts taken from `[credentials]`.
    ///
    /// An issuer that accepts the connection but never answers fails the attempt once
    /// the request timeout elapses, and the attempt is retried like any transport error.
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.credentials.request_timeout())
            .connect_timeout(config.credentials.connect_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build HTTP client: {}", e)))?;

        Self::with_client(client, &config.identity)
    }

    pub fn with_client(client: Client, identity: &IdentityConfig) -> Result<Self> {
        identity.validate()?;

        Ok(Self {
            client,
            token_url: identity.token_url(),
            form_params: identity.form_params.clone(),
            authentication: identity.authentication.clone(),
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn request_token(&self) -> anyhow::Result<TokenResponse> {
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(
                &self.authentication.username,
                Some(&self.authentication.password),
            )
            .form(&[
                ("grant_type", self.form_params.grant_type.as_str()),
                ("scope", self.form_params.scope.as_str()),
                ("expires_in", self.form_params.expires_in.as_str()),
            ])
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        debug!("Token request status: {}", status);

        let body = response.text().await?;

        Ok(TokenResponse {
            status,
            content_type,
            body,
        })
    }
}
