use std::fmt;
use std::time::{Duration, Instant};

/// Unit of isolation for cached credentials, usually one test worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutionContext(String);

impl ExecutionContext {
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Context keyed by the calling OS thread
    pub fn current_thread() -> Self {
        let thread = std::thread::current();
        match thread.name() {
            Some(name) => Self(format!("{}-{:?}", name, thread.id())),
            None => Self(format!("{:?}", thread.id())),
        }
    }

    /// A fresh context that no other caller shares
    pub fn unique() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExecutionContext {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

/// Bearer token together with the moment it was issued
#[derive(Clone)]
pub struct CachedCredential {
    pub value: String,
    pub issued_at: Instant,
}

impl CachedCredential {
    pub fn new(value: String, issued_at: Instant) -> Self {
        Self { value, issued_at }
    }

    /// Usable until `now > issued_at + ttl`
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now <= self.issued_at + ttl
    }
}

// Keep token values out of debug output and logs.
impl fmt::Debug for CachedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCredential")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_boundary() {
        let issued_at = Instant::now();
        let ttl = Duration::from_secs(600);
        let credential = CachedCredential::new("token".to_string(), issued_at);

        assert!(credential.is_fresh(issued_at, ttl));
        assert!(credential.is_fresh(issued_at + ttl, ttl));
        assert!(!credential.is_fresh(issued_at + ttl + Duration::from_millis(1), ttl));
    }

    #[test]
    fn test_debug_redacts_value() {
        let credential = CachedCredential::new("super-secret".to_string(), Instant::now());
        let rendered = format!("{:?}", credential);

        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_unique_contexts_differ() {
        assert_ne!(ExecutionContext::unique(), ExecutionContext::unique());
    }

    #[test]
    fn test_current_thread_context_differs_between_threads() {
        let here = ExecutionContext::current_thread();
        let there = std::thread::spawn(ExecutionContext::current_thread)
            .join()
            .unwrap();

        assert_eq!(here, ExecutionContext::current_thread());
        assert_ne!(here, there);
    }
}
