//! # Domain Invariants
//!
//! Invariants that MUST hold for every committed invocation, checkable at
//! runtime and exercised directly by tests:
//!
//! - Result alignment: one outcome per input call, position-aligned.
//! - Value conservation: forwarded value equals attached payment exactly.
//! - Bounds: no batch exceeds its configured size limit.
//! - Transfer completeness: a committed batch moved every requested item.

use crate::domain::entities::{MulticallReceipt, TransferReceipt, TransferRequest};
use crate::domain::value_objects::U256;

// =============================================================================
// INVARIANT CHECKS
// =============================================================================

/// Result alignment: a delegated-call batch of `n` calls produces exactly
/// `n` outcomes, tolerated failures included.
#[must_use]
pub fn check_result_alignment(calls: usize, receipt: &MulticallReceipt) -> bool {
    receipt.outcomes.len() == calls && receipt.executed == calls
}

/// Value conservation: the value forwarded by a committed value-carrying
/// batch equals the attached payment, exactly.
#[must_use]
pub fn check_value_conservation(attached: U256, receipt: &MulticallReceipt) -> bool {
    receipt.value_forwarded == attached
}

/// Bounds: a batch length never exceeds its configured maximum.
#[must_use]
pub fn check_batch_bound(len: usize, max: usize) -> bool {
    len <= max
}

/// Transfer completeness: a committed transfer batch moved every requested
/// `(registry, item)` pair, in input order.
#[must_use]
pub fn check_transfer_completeness(request: &TransferRequest, receipt: &TransferReceipt) -> bool {
    receipt.transferred.len() == request.len()
        && receipt
            .transferred
            .iter()
            .zip(request.registries.iter().zip(request.item_ids.iter()))
            .all(|(&(registry, item), (&want_registry, &want_item))| {
                registry == want_registry && item == want_item
            })
}

/// Check every multicall invariant at once.
#[must_use]
pub fn check_multicall_invariants(
    calls: usize,
    attached: U256,
    receipt: &MulticallReceipt,
) -> InvariantCheckResult {
    let mut violations = Vec::new();

    if !check_result_alignment(calls, receipt) {
        violations.push(InvariantViolation::ResultMisaligned {
            calls,
            outcomes: receipt.outcomes.len(),
        });
    }

    if !check_value_conservation(attached, receipt) {
        violations.push(InvariantViolation::ValueNotConserved {
            attached,
            forwarded: receipt.value_forwarded,
        });
    }

    if violations.is_empty() {
        InvariantCheckResult::Valid
    } else {
        InvariantCheckResult::Invalid(violations)
    }
}

// =============================================================================
// INVARIANT TYPES
// =============================================================================

/// Result of checking a set of invariants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantCheckResult {
    /// All invariants hold.
    Valid,
    /// One or more invariants violated.
    Invalid(Vec<InvariantViolation>),
}

impl InvariantCheckResult {
    /// Returns true if all invariants hold.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Specific invariant violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Outcome count does not match call count.
    ResultMisaligned {
        /// Calls in the batch.
        calls: usize,
        /// Outcomes in the receipt.
        outcomes: usize,
    },
    /// Forwarded value differs from attached payment.
    ValueNotConserved {
        /// Payment attached by the caller.
        attached: U256,
        /// Value the batch actually forwarded.
        forwarded: U256,
    },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResultMisaligned { calls, outcomes } => {
                write!(f, "result misaligned: {calls} calls, {outcomes} outcomes")
            }
            Self::ValueNotConserved {
                attached,
                forwarded,
            } => {
                write!(
                    f,
                    "value not conserved: attached {attached}, forwarded {forwarded}"
                )
            }
        }
    }
}

// =============================================================================
// LIMIT CONSTANTS
// =============================================================================

/// Hard size and fee bounds exposed as part of the engine surface.
pub mod limits {
    use crate::domain::value_objects::U256;

    /// Maximum items per transfer batch.
    pub const MAX_BATCH_SIZE: usize = 50;

    /// Maximum calls per delegated-call batch.
    pub const MAX_MULTICALL_SIZE: usize = 100;

    /// Base units per native unit (10^18).
    pub const BASE_UNITS_PER_NATIVE: u64 = 1_000_000_000_000_000_000;

    /// Ceiling on the configurable flat fee: one native unit.
    #[must_use]
    pub fn max_fee() -> U256 {
        U256::from(BASE_UNITS_PER_NATIVE)
    }
}

// =============================================================================
// TESTS
// =============================================================================
