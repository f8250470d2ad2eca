//! # Engine Events
//!
//! Signals emitted by committed operations. Events are buffered inside an
//! invocation and only surface on receipts once the whole operation has
//! committed; a failed invocation never yields events.

use crate::domain::value_objects::{Address, U256};
use serde::{Deserialize, Serialize};

// =============================================================================
// EVENTS
// =============================================================================

/// A signal recorded by a successfully committed operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayEvent {
    /// One item changed ownership inside a transfer batch.
    ItemTransferred {
        /// Registry holding the item.
        registry: Address,
        /// New owner of the item.
        recipient: Address,
        /// Identifier of the transferred item.
        item_id: U256,
    },
    /// The per-invocation fee was changed by the operator.
    FeeUpdated {
        /// The fee now charged per transfer batch.
        new_fee: U256,
    },
    /// A delegated-call batch completed.
    MulticallExecuted {
        /// Number of calls dispatched.
        count: usize,
        /// Account that submitted the batch.
        caller: Address,
    },
    /// Collected fees were paid out.
    FundsWithdrawn {
        /// Account the payout went to.
        recipient: Address,
        /// Amount paid out.
        amount: U256,
    },
    /// A two-phase operator handoff was proposed.
    HandoffProposed {
        /// Account that may now accept the handoff.
        candidate: Address,
    },
    /// A two-phase operator handoff was accepted.
    HandoffCompleted {
        /// Operator before the handoff.
        previous: Address,
        /// Operator after the handoff.
        new: Address,
    },
    /// The engine was paused.
    Paused {
        /// Operator that paused it.
        by: Address,
    },
    /// The engine was unpaused.
    Unpaused {
        /// Operator that unpaused it.
        by: Address,
    },
}

// =============================================================================
// TESTS
// =============================================================================
