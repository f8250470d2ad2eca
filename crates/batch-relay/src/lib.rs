//! # batch-relay - Batched Asset Transfer & Delegated Call Engine
//!
//! ## Purpose
//!
//! Moves ownership of many uniquely-identified items held in external
//! registries to a single recipient in one atomic operation, and lets a
//! designated operator run bounded batches of arbitrary delegated calls,
//! optionally forwarding native value per call, under strict or
//! failure-tolerant policies.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | INVARIANT-1 | Abort is total rollback | `service.rs` - journal checkpoint around every mutating entry point |
//! | INVARIANT-2 | Result alignment (one outcome per call) | `engine/multicall.rs` + `domain/invariants.rs` - `check_result_alignment()` |
//! | INVARIANT-3 | Exact value conservation | `domain/services.rs` - `ValueAccumulator` |
//! | INVARIANT-4 | Bounded batches | `domain/services.rs` - `validate_transfer_request()`, `ensure_call_bound()` |
//! | INVARIANT-5 | Single-writer execution | `engine/guard.rs` - `ExclusionGuard` |
//!
//! ## Execution Safety Limits
//!
//! | Limit | Value | Purpose |
//! |-------|-------|---------|
//! | `MAX_BATCH_SIZE` | 50 | Bound per-invocation transfer work |
//! | `MAX_MULTICALL_SIZE` | 100 | Bound per-invocation dispatch work |
//! | fee ceiling | 1 native unit | Bound operator-settable fees |
//!
//! ## Trust Model
//!
//! Registries and call targets are untrusted: they may fail, re-enter, or
//! burn resources. The engine defends with bounded loops, contained
//! capability probes (a probe that throws counts as unsupported), and the
//! exclusion guard.
//!
//! ## Usage Example
//!
//! ```ignore
//! use batch_relay::prelude::*;
//!
//! let receipt = service.send_batch(&ctx, &request).await?;
//! for (registry, item_id) in &receipt.transferred {
//!     println!("moved {item_id} on {registry}");
//! }
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod events;
pub mod ports;
pub mod service;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        Call, CallContext, CallOutcome, ChainContext, ControlState, MulticallReceipt,
        RelayConfig, TolerantCall, TransferReceipt, TransferRequest, ValueCall,
    };

    // Value objects
    pub use crate::domain::value_objects::{Address, Bytes, InterfaceId, U256};

    // Domain services
    pub use crate::domain::services::{
        ensure_call_bound, required_value, validate_transfer_request, ValueAccumulator,
    };

    // Invariants
    pub use crate::domain::invariants::{
        check_batch_bound, check_multicall_invariants, check_result_alignment,
        check_transfer_completeness, check_value_conservation, limits, InvariantCheckResult,
        InvariantViolation,
    };

    // Ports
    pub use crate::ports::inbound::{EngineStatus, RelayApi};
    pub use crate::ports::outbound::{
        CallDispatcher, CheckpointId, RegistryGateway, WorldJournal,
    };

    // Events
    pub use crate::events::RelayEvent;

    // Errors
    pub use crate::errors::{
        AccessError, CallError, EngineError, FeeError, MulticallError, RegistryError,
        StateError, TransferError,
    };

    // Execution cores
    pub use crate::engine::{ExclusionGuard, MulticallEngine, TransferEngine};

    // Adapters
    pub use crate::adapters::{InMemoryWorld, TargetScript};

    // Service
    pub use crate::service::{create_test_service, RelayService, RelayStats};
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// TESTS
// =============================================================================
