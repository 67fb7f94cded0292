use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors surfaced by the coordination layer
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Every token request attempt was rejected by the issuer
    #[error(
        "access token request was not successful after {attempts} attempts; \
         last status: {}; last response: {body}",
        status_label(.status)
    )]
    AuthExhausted {
        attempts: u32,
        status: Option<u16>,
        body: String,
    },

    /// The issuer answered 200 but the body carried no usable access token
    #[error("access token was not found in the response (status {status}): {body}")]
    MalformedCredentialResponse { status: u16, body: String },

    /// A polled condition never held before its deadline
    #[error("'{name}' did not hold within {waited:?} ({attempts} attempts): {last_failure:#}")]
    PollDeadlineExceeded {
        name: String,
        waited: Duration,
        attempts: u32,
        last_failure: anyhow::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config file {path:?}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}
