//! Generation-counter cancellation.
//!
//! At most one analysis is live at a time. Issuing a token supersedes the
//! previous one; a token is cancelled once the counter has moved past its
//! stamp. Resumed continuations check their token before touching shared UI
//! state, which is the only mutual exclusion the single-threaded pipeline
//! needs.

use std::sync::atomic::{AtomicU64, Ordering};

/// A generation stamp identifying one analysis attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    generation: u64,
}

#[derive(Debug, Default)]
pub struct TokenManager {
    generation: AtomicU64,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the live token (if any) and return a fresh live one.
    pub fn issue(&self) -> Token {
        Token {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    /// Cancel the live token without issuing a replacement. Used on
    /// pointer-leave, where no new analysis starts.
    pub fn revoke(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self, token: &Token) -> bool {
        self.generation.load(Ordering::SeqCst) > token.generation
    }
}
