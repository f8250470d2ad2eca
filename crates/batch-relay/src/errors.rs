//! # Error Types
//!
//! All error types for the relay engine, one enum per concern.
//! External-dependency failures are distinct kinds from input-validation and
//! funding failures so callers can tell "their registry is broken" apart from
//! "their own input was wrong". Nothing is retried internally; every error is
//! terminal for its invocation and rolls the whole invocation back.

use crate::domain::value_objects::{Address, Bytes, U256};
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// ACCESS ERRORS
// =============================================================================

/// Errors from privileged-operation access checks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// A privileged operation was called by a non-operator account.
    #[error("caller {caller} is not the operator")]
    NotOperator {
        /// Account that attempted the call.
        caller: Address,
    },

    /// A handoff acceptance was attempted by an account that is not the
    /// pending candidate.
    #[error("caller {caller} is not the pending operator")]
    NotPendingOperator {
        /// Account that attempted the acceptance.
        caller: Address,
    },

    /// A handoff was proposed to the zero address.
    #[error("handoff candidate must not be the zero address")]
    InvalidCandidate,
}

// =============================================================================
// TRANSFER ERRORS
// =============================================================================

/// Errors from batched item transfers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The request deadline is in the past.
    #[error("request expired: deadline {deadline} < now {now}")]
    Expired {
        /// Deadline carried by the request.
        deadline: u64,
        /// Current timestamp at entry.
        now: u64,
    },

    /// The batch contains no items.
    #[error("empty batch")]
    EmptyBatch,

    /// The batch exceeds the size bound.
    #[error("batch too large: {len} > {max}")]
    BatchTooLarge {
        /// Items in the request.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Registry and item-id sequences differ in length.
    #[error("length mismatch: {registries} registries, {items} items")]
    LengthMismatch {
        /// Length of the registry sequence.
        registries: usize,
        /// Length of the item-id sequence.
        items: usize,
    },

    /// The recipient is the zero address.
    #[error("recipient must not be the zero address")]
    InvalidRecipient,

    /// The attached payment does not cover the fee.
    #[error("insufficient fee: required {required}, provided {provided}")]
    InsufficientFee {
        /// Flat fee for this invocation.
        required: U256,
        /// Payment attached by the caller.
        provided: U256,
    },

    /// A registry address in the batch is zero.
    #[error("registry at index {index} is the zero address")]
    InvalidRegistry {
        /// Position of the offending entry.
        index: usize,
    },

    /// The capability probe itself failed. Treated identically to an
    /// unsupported registry so a failing probe cannot corrupt the caller.
    #[error("interface probe failed for registry {registry}")]
    InterfaceCheckFailed {
        /// Registry whose probe failed.
        registry: Address,
    },

    /// The registry does not support the item-ownership capability.
    #[error("registry {registry} does not support item transfers")]
    NotSupported {
        /// Registry that failed the probe.
        registry: Address,
    },

    /// The registry rejected a single item transfer.
    #[error("transfer of item {item_id} failed on registry {registry}")]
    ItemTransferFailed {
        /// Registry the transfer was attempted on.
        registry: Address,
        /// Item that failed to move.
        item_id: U256,
    },

    /// Returning the excess payment to the caller failed.
    #[error("refund of excess payment failed")]
    RefundFailed,
}

// =============================================================================
// MULTICALL ERRORS
// =============================================================================

/// Errors from batched delegated calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MulticallError {
    /// The call batch exceeds the size bound.
    #[error("too many calls: {len} > {max}")]
    TooManyCalls {
        /// Calls in the batch.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// A delegated call failed and its failure was not tolerated.
    #[error("delegated call at index {index} failed")]
    DelegatedCallFailed {
        /// Position of the failing call.
        index: usize,
    },

    /// Accumulating declared call values overflowed.
    #[error("declared value accumulation overflowed at index {index}")]
    ValueOverflow {
        /// Position of the call whose value overflowed the sum.
        index: usize,
    },

    /// The attached payment does not exactly match the declared values.
    ///
    /// Raised inside the loop as soon as the running sum exceeds the
    /// attached payment, and again at the end if the attached payment
    /// exceeds the final sum. Equality is required, not mere sufficiency.
    #[error("value mismatch: attached {attached}, required {required}")]
    ValueMismatch {
        /// Payment attached by the caller.
        attached: U256,
        /// Declared values accumulated so far.
        required: U256,
    },
}

// =============================================================================
// FEE ERRORS
// =============================================================================

/// Errors from fee administration and withdrawal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeError {
    /// The requested fee exceeds the fixed ceiling.
    #[error("fee above ceiling: requested {requested}, max {max}")]
    AboveCeiling {
        /// Fee the operator asked for.
        requested: U256,
        /// Fixed ceiling.
        max: U256,
    },

    /// A withdrawal asked for more than the collected balance.
    #[error("insufficient collected balance: requested {requested}, collected {collected}")]
    InsufficientCollected {
        /// Amount requested.
        requested: U256,
        /// Balance available.
        collected: U256,
    },

    /// The payout transfer itself failed.
    #[error("fee payout failed")]
    PayoutFailed,
}

// =============================================================================
// OUTBOUND PORT ERRORS
// =============================================================================

/// Errors from the registry gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The capability probe itself threw.
    #[error("probe failed: {0}")]
    ProbeFailed(String),

    /// The registry rejected the transfer (unknown item, wrong owner, or the
    /// recipient refused acceptance).
    #[error("transfer rejected: {0}")]
    TransferRejected(String),

    /// No registry is reachable at the given address.
    #[error("no registry at {0}")]
    Unreachable(Address),
}

/// Errors from the call dispatcher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The target ran and failed, returning `output` as failure data.
    #[error("call reverted ({} bytes of return data)", .output.len())]
    Reverted {
        /// Failure data returned by the target.
        output: Bytes,
    },

    /// The paying account cannot cover the forwarded value.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Value the call tried to forward.
        required: U256,
        /// Balance actually available.
        available: U256,
    },

    /// The receiving account refused a raw native transfer.
    #[error("account {to} refused the value transfer")]
    ValueRefused {
        /// Intended recipient.
        to: Address,
    },
}

/// Errors from the world journal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Commit or rollback was asked for a checkpoint that does not exist.
    #[error("unknown checkpoint {0}")]
    UnknownCheckpoint(Uuid),

    /// The world state is unavailable.
    #[error("world state unavailable")]
    Unavailable,
}

// =============================================================================
// TOP-LEVEL ERROR
// =============================================================================

/// Top-level error returned by every engine entry point.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine is paused and the operation is pause-gated.
    #[error("engine is paused")]
    Paused,

    /// `pause` was called while already paused.
    #[error("engine is already paused")]
    AlreadyPaused,

    /// `unpause` was called while not paused.
    #[error("engine is not paused")]
    NotPaused,

    /// A state-mutating entry point was re-entered while another was
    /// executing.
    #[error("reentrant call detected")]
    ReentrancyDetected,

    /// Access-control failure.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Batched-transfer failure.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Delegated-call failure.
    #[error(transparent)]
    Multicall(#[from] MulticallError),

    /// Fee administration failure.
    #[error(transparent)]
    Fee(#[from] FeeError),

    /// Native value movement failure outside an engine core.
    #[error("native transfer failed: {0}")]
    Native(#[from] CallError),

    /// World journal failure.
    #[error("state error: {0}")]
    State(#[from] StateError),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_display() {
        let err = TransferError::BatchTooLarge { len: 51, max: 50 };
        assert_eq!(err.to_string(), "batch too large: 51 > 50");

        let err = TransferError::InsufficientFee {
            required: U256::from(10),
            provided: U256::from(3),
        };
        assert_eq!(err.to_string(), "insufficient fee: required 10, provided 3");
    }

    #[test]
    fn test_multicall_error_display() {
        let err = MulticallError::ValueMismatch {
            attached: U256::from(5),
            required: U256::from(7),
        };
        assert_eq!(err.to_string(), "value mismatch: attached 5, required 7");
    }

    #[test]
    fn test_error_conversion_into_engine_error() {
        let err: EngineError = AccessError::InvalidCandidate.into();
        assert!(matches!(err, EngineError::Access(_)));

        let err: EngineError = TransferError::EmptyBatch.into();
        assert!(matches!(err, EngineError::Transfer(_)));

        let err: EngineError = MulticallError::TooManyCalls { len: 101, max: 100 }.into();
        assert!(matches!(err, EngineError::Multicall(_)));
    }

    #[test]
    fn test_access_error_carries_caller() {
        let caller = Address::new([3u8; 20]);
        let err = AccessError::NotOperator { caller };
        assert!(err.to_string().contains("not the operator"));
    }

    #[test]
    fn test_call_error_display() {
        let err = CallError::Reverted {
            output: Bytes::from_slice(&[1, 2, 3]),
        };
        assert!(err.to_string().contains("3 bytes"));
    }
}
