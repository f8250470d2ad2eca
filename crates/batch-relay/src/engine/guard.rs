//! # Exclusion Guard
//!
//! Per-instance mutual exclusion for state-mutating entry points. The flag
//! is taken on entry and released when the token drops, so every exit path,
//! early error returns included, releases it.

use crate::errors::EngineError;
use std::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// GUARD
// =============================================================================

/// Reentrancy-exclusion flag shared by every mutating entry point.
///
/// Both engines dispatch to untrusted code mid-execution; the guard ensures
/// no entry point can be re-entered, directly or through a callee calling
/// back in, while another is still executing.
#[derive(Debug, Default)]
pub struct ExclusionGuard {
    busy: AtomicBool,
}

impl ExclusionGuard {
    /// Creates a released guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the guard for the duration of the returned token.
    ///
    /// Fails with [`EngineError::ReentrancyDetected`] if another entry point
    /// currently holds it.
    pub fn enter(&self) -> Result<ExclusionToken<'_>, EngineError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(EngineError::ReentrancyDetected);
        }
        Ok(ExclusionToken { guard: self })
    }

    /// Returns true if an entry point currently holds the guard.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Scoped token releasing the guard on drop.
#[derive(Debug)]
pub struct ExclusionToken<'a> {
    guard: &'a ExclusionGuard,
}

impl Drop for ExclusionToken<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

// =============================================================================
// TESTS
// =============================================================================
