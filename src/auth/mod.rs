//! Access token issuing and per-context caching

pub mod cache;
pub mod context;
pub mod issuer;
pub mod retry;

pub use cache::{CredentialCache, DEFAULT_TTL};
pub use context::{CachedCredential, ExecutionContext};
pub use issuer::{HttpTokenIssuer, TokenIssuer, TokenResponse};
pub use retry::RetryConfig;
