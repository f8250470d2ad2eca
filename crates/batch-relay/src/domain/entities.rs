//! # Core Domain Entities
//!
//! Main business entities for batched transfers and delegated calls.
//! Request, call, and receipt structures live for exactly one invocation;
//! only [`ControlState`] persists for the engine's lifetime.

use crate::domain::invariants::limits;
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::events::RelayEvent;
use serde::{Deserialize, Serialize};

// =============================================================================
// CALL CONTEXT
// =============================================================================

/// Host-supplied block metadata for one invocation.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ChainContext {
    /// Block number.
    pub number: u64,
    /// Block timestamp (unix seconds).
    pub timestamp: u64,
}

/// Context of one engine invocation: who calls, how much native value rides
/// along, and the block the call executes in.
#[derive(Clone, Copy, Debug, Default)]
pub struct CallContext {
    /// Account making the call.
    pub caller: Address,
    /// Native value attached to the call.
    pub value: U256,
    /// Block metadata at call time.
    pub block: ChainContext,
}

impl CallContext {
    /// Creates a context for a plain (non-payable) call.
    #[must_use]
    pub fn new(caller: Address) -> Self {
        Self {
            caller,
            value: U256::zero(),
            block: ChainContext::default(),
        }
    }

    /// Attaches native value to the context.
    #[must_use]
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Pins the context to a block timestamp.
    #[must_use]
    pub fn at_time(mut self, timestamp: u64) -> Self {
        self.block.timestamp = timestamp;
        self
    }
}

// =============================================================================
// TRANSFER REQUEST
// =============================================================================

/// A request to move a batch of items, all to one recipient.
///
/// `registries` and `item_ids` are position-aligned: entry `i` asks registry
/// `registries[i]` to move item `item_ids[i]` from the caller to `recipient`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Registry holding each item.
    pub registries: Vec<Address>,
    /// Identifier of each item.
    pub item_ids: Vec<U256>,
    /// Single recipient for the whole batch.
    pub recipient: Address,
    /// Unix timestamp after which the request is stale. A deadline equal to
    /// the current time is still valid.
    pub deadline: u64,
}

impl TransferRequest {
    /// Number of items in the batch, taken from the registry sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registries.len()
    }

    /// Returns true if the batch holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}

// =============================================================================
// DELEGATED CALLS
// =============================================================================

/// One delegated call in a strict batch: failure aborts everything.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Call {
    /// Account the call is dispatched to.
    pub target: Address,
    /// Opaque payload handed to the target.
    pub payload: Bytes,
}

/// One delegated call in a failure-tolerant batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TolerantCall {
    /// Account the call is dispatched to.
    pub target: Address,
    /// When set, this call's failure is recorded instead of aborting the
    /// batch.
    pub allow_failure: bool,
    /// Opaque payload handed to the target.
    pub payload: Bytes,
}

/// One delegated call carrying native value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValueCall {
    /// Account the call is dispatched to.
    pub target: Address,
    /// When set, this call's failure is recorded instead of aborting the
    /// batch.
    pub allow_failure: bool,
    /// Native value forwarded with exactly this call.
    pub value: U256,
    /// Opaque payload handed to the target.
    pub payload: Bytes,
}

/// Outcome of one dispatched call, position-aligned with its input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutcome {
    /// Whether the call succeeded.
    pub success: bool,
    /// Return data (or failure data) from the target.
    pub output: Bytes,
}

impl CallOutcome {
    /// Outcome of a successful call.
    #[must_use]
    pub fn ok(output: Bytes) -> Self {
        Self {
            success: true,
            output,
        }
    }

    /// Outcome of a tolerated failure.
    #[must_use]
    pub fn failed(output: Bytes) -> Self {
        Self {
            success: false,
            output,
        }
    }
}

// =============================================================================
// RECEIPTS
// =============================================================================

/// Receipt of a committed transfer batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Every `(registry, item_id)` pair that changed ownership, in input
    /// order. Equal in length to the request on success.
    pub transferred: Vec<(Address, U256)>,
    /// Flat fee retained from the attached payment.
    pub fee_paid: U256,
    /// Excess payment returned to the caller.
    pub refunded: U256,
    /// Signals recorded by this invocation.
    pub events: Vec<RelayEvent>,
}

/// Receipt of a committed delegated-call batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MulticallReceipt {
    /// One outcome per input call, position-aligned. `len(outcomes) ==
    /// len(calls)` always, including tolerated failures.
    pub outcomes: Vec<CallOutcome>,
    /// Number of calls dispatched.
    pub executed: usize,
    /// Total declared value committed by the batch's accounting. A tolerated
    /// failure still commits its declared value even though the failed call
    /// consumed none of it.
    pub value_forwarded: U256,
    /// Signals recorded by this invocation.
    pub events: Vec<RelayEvent>,
}

// =============================================================================
// ENGINE CONFIGURATION
// =============================================================================

/// Size and fee bounds for the engine.
///
/// The bounds exist to cap worst-case work per invocation; both loops are
/// otherwise unbounded attack surface against untrusted callees.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Maximum items per transfer batch.
    pub max_batch_size: usize,
    /// Maximum calls per delegated-call batch.
    pub max_multicall_size: usize,
    /// Ceiling on the configurable flat fee, in base units.
    pub max_fee: U256,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_batch_size: limits::MAX_BATCH_SIZE,
            max_multicall_size: limits::MAX_MULTICALL_SIZE,
            max_fee: limits::max_fee(),
        }
    }
}

// =============================================================================
// CONTROL STATE
// =============================================================================

/// The engine's persistent state: operator identity, pause flag, and the fee
/// ledger. Mutated only through the dedicated setters on the service, never
/// mid-batch.
#[derive(Clone, Debug)]
pub struct ControlState {
    /// Current operator. Never the zero address after construction.
    pub operator: Address,
    /// Candidate of an in-flight two-phase handoff, if any.
    pub pending_operator: Option<Address>,
    /// Operational gate for transfer batches.
    pub paused: bool,
    /// Flat fee charged per transfer batch, independent of batch size.
    pub fee: U256,
    /// Fees collected and not yet withdrawn.
    pub collected: U256,
}

impl ControlState {
    /// Creates control state owned by `operator` with a zero fee.
    #[must_use]
    pub fn new(operator: Address) -> Self {
        Self {
            operator,
            pending_operator: None,
            paused: false,
            fee: U256::zero(),
            collected: U256::zero(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
