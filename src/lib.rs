//! Coordination primitives for running document-platform API tests in parallel.
//!
//! - [`auth::CredentialCache`] hands out access tokens per execution context and
//!   refreshes them once they pass their TTL.
//! - [`registry::ResourceAllocationRegistry`] keeps concurrent test cases from
//!   picking the same remote resource.
//! - [`poll::BoundedPoller`] waits for eventually consistent server state before an
//!   assertion runs.

pub mod auth;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod poll;
pub mod registry;

pub use auth::{CredentialCache, ExecutionContext, HttpTokenIssuer, TokenIssuer, TokenResponse};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use poll::{BoundedPoller, PollConfig, PollOutcome};
pub use registry::{ResourceAllocationRegistry, ResourceId, SelectionStrategy};
