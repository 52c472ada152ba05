use std::sync::atomic::{AtomicU64, Ordering};

/// Selections served by one token before moving to the next.
pub const SELECTIONS_PER_TOKEN: u64 = 3;

/// Round-robin over the configured GitHub tokens.
///
/// Each token is handed out for [`SELECTIONS_PER_TOKEN`] consecutive selections
/// before the next one takes over, wrapping at the end of the pool. The counter
/// is shared by all requests and resets when the process restarts.
pub struct TokenRotator {
    selections: AtomicU64,
    tokens: Vec<String>,
}

impl TokenRotator {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            selections: AtomicU64::new(0),
            tokens,
        }
    }

    /// Pick the token for the next remote call. `None` only when the pool is empty.
    pub fn select(&self) -> Option<&str> {
        if self.tokens.is_empty() {
            return None;
        }

        let n = self.selections.fetch_add(1, Ordering::Relaxed);
        let index = ((n / SELECTIONS_PER_TOKEN) % self.tokens.len() as u64) as usize;
        tracing::trace!(selection = n, token_index = index, "Selected credential");
        Some(&self.tokens[index])
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
