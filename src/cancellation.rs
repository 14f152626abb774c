//! Cancellable timeout plumbing: CancellationToken + generation counter.
//! The arming timeout is a scheduled task tied to the generation that armed
//! it; a stale timeout firing after the state already changed carries an old
//! generation and is dropped by the orchestrator without touching state.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Manages timeout generations. Arming a new timeout advances the generation
/// and cancels the prior token, so at most one timeout is ever live.
pub struct TaskGeneration {
    current_token: RwLock<CancellationToken>,
    generation: AtomicU64,
}

impl TaskGeneration {
    pub fn new() -> Self {
        Self {
            current_token: RwLock::new(CancellationToken::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Cancel any outstanding timeout, advance the generation, and return a
    /// fresh child token plus the new generation to stamp the next timeout.
    pub fn cancel_and_advance(&self) -> (CancellationToken, u64) {
        let mut token_guard = self.current_token.write();
        token_guard.cancel();
        let new_root = CancellationToken::new();
        let child = new_root.child_token();
        *token_guard = new_root;
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        (child, gen)
    }

    /// Read the current generation. A timeout event whose stamped generation
    /// differs from this is stale.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cancel the outstanding timeout without advancing the generation.
    pub fn cancel_all(&self) {
        let token_guard = self.current_token.read();
        token_guard.cancel();
    }
}

impl Default for TaskGeneration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_increments_generation() {
        let tg = TaskGeneration::new();
        assert_eq!(tg.current_generation(), 0);
        let (_, g1) = tg.cancel_and_advance();
        assert_eq!(g1, 1);
        let (_, g2) = tg.cancel_and_advance();
        assert_eq!(g2, 2);
        assert_eq!(tg.current_generation(), 2);
    }

    #[test]
    fn advance_cancels_prior_token() {
        let tg = TaskGeneration::new();
        let (t1, _) = tg.cancel_and_advance();
        assert!(!t1.is_cancelled());
        let (t2, _) = tg.cancel_and_advance();
        assert!(t1.is_cancelled());
        assert!(!t2.is_cancelled());
    }

    #[test]
    fn cancel_all_keeps_generation() {
        let tg = TaskGeneration::new();
        let (t1, g1) = tg.cancel_and_advance();
        tg.cancel_all();
        assert!(t1.is_cancelled());
        assert_eq!(tg.current_generation(), g1);
    }
}
