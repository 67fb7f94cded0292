#![allow(dead_code)]

use async_trait::async_trait;
use dp_harness::{CredentialCache, ManualClock, TokenIssuer, TokenResponse};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub enum Scripted {
    Reply(TokenResponse),
    Transport(&'static str),
}

/// Issuer that plays back a fixed script, then repeats the fallback reply
pub struct ScriptedIssuer {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Option<TokenResponse>,
    calls: AtomicU32,
}

impl ScriptedIssuer {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicU32::new(0),
        })
    }

    pub fn always(reply: TokenResponse) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(reply),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for ScriptedIssuer {
    async fn request_token(&self) -> anyhow::Result<TokenResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Transport(message)) => Err(anyhow::anyhow!(message)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| anyhow::anyhow!("issuer script exhausted")),
        }
    }
}

pub struct SequentialIssuer {
    calls: AtomicU32,
}

impl SequentialIssuer {
    /// Hands out `token-1`, `token-2`, ... forever
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for SequentialIssuer {
    async fn request_token(&self) -> anyhow::Result<TokenResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TokenResponse::json(format!(
            r#"{{"access_token":"token-{}","token_type":"bearer","expires_in":3600}}"#,
            call
        )))
    }
}

pub fn token_body(token: &str) -> TokenResponse {
    TokenResponse::json(format!(r#"{{"access_token":"{}"}}"#, token))
}

/// Cache on virtual time with the default TTL and a 3 x 30s retry budget
pub fn cache_on_manual_clock(issuer: Arc<dyn TokenIssuer>) -> (CredentialCache, ManualClock) {
    let clock = ManualClock::new();
    let cache = CredentialCache::new(issuer).with_clock(Arc::new(clock.clone()));
    (cache, clock)
}

pub const MS: Duration = Duration::from_millis(1);
