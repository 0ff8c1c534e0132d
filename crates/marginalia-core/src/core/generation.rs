//! Generation tokens for "most recent request wins".
//!
//! Capture a token before starting async work and check it when the work
//! completes; if another request began in the meantime the result is stale
//! and must be dropped. Nothing is cancelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, monotonically increasing request counter.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    counter: Arc<AtomicU64>,
}

/// The counter value captured when a request started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GenerationToken(u64);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new request, invalidating every earlier token.
    pub fn begin(&self) -> GenerationToken {
        GenerationToken(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Invalidates outstanding tokens without starting a new request.
    pub fn invalidate(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, token: GenerationToken) -> bool {
        self.counter.load(Ordering::SeqCst) == token.0
    }

    /// Runs `apply` only if `token` is still current.
    pub fn apply_if_current<T>(&self, token: GenerationToken, apply: impl FnOnce() -> T) -> Option<T> {
        self.is_current(token).then(apply)
    }
}
