//! Bearer token access
//!
//! The engine never stores credentials itself; it asks an injected
//! provider for the current token at each connection attempt, so token
//! refresh stays under the caller's control.

use std::sync::{Arc, RwLock};

/// Source of the bearer token used to authenticate the transport
pub trait TokenProvider: Send + Sync {
    /// The current token, or `None` when unauthenticated
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed-token provider, mainly for tests and simple tools
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn bearer_token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}

/// Shared mutable token slot for callers that refresh credentials at
/// runtime
#[derive(Debug, Clone, Default)]
pub struct SharedTokenProvider {
    token: Arc<RwLock<Option<String>>>,
}

impl SharedTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.into());
        }
    }

    pub fn clear_token(&self) {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
    }
}

impl TokenProvider for SharedTokenProvider {
    fn bearer_token(&self) -> Option<String> {
        self.token.read().ok().and_then(|slot| slot.clone())
    }
}
