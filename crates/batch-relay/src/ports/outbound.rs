//! # Driven Ports (Outbound)
//!
//! Interfaces the engine depends on. Adapters implement these traits to
//! provide item registries, delegated-call dispatch, native value movement,
//! and the transactional world journal.
//!
//! Registries and call targets are untrusted: they may fail, re-enter, or
//! burn resources. The engine only ever sees them through the narrow results
//! of these traits and never inspects what a target concretely is.

use crate::domain::value_objects::{Address, Bytes, InterfaceId, U256};
use crate::errors::{CallError, RegistryError, StateError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// REGISTRY GATEWAY
// =============================================================================

/// Interface to external item-ownership registries.
///
/// A registry records which account owns each uniquely-identified item and
/// exposes a capability probe plus a transfer with recipient-acceptance
/// semantics (the recipient may refuse the item, failing the transfer).
#[async_trait]
pub trait RegistryGateway: Send + Sync {
    /// Probe whether `registry` asserts support for `interface`.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - the registry supports the capability
    /// * `Ok(false)` - the registry answered and does not
    /// * `Err(_)` - the probe itself failed; callers treat this exactly like
    ///   an unsupported registry
    async fn supports_interface(
        &self,
        registry: Address,
        interface: InterfaceId,
    ) -> Result<bool, RegistryError>;

    /// Transfer `item_id` on `registry` from `from` to `to`, with recipient
    /// acceptance.
    ///
    /// Fails if the item does not exist, `from` does not own it, or `to`
    /// refuses acceptance.
    async fn transfer_item(
        &self,
        registry: Address,
        from: Address,
        to: Address,
        item_id: U256,
    ) -> Result<(), RegistryError>;
}

// =============================================================================
// CALL DISPATCHER
// =============================================================================

/// Interface for dispatching delegated calls and moving native value.
#[async_trait]
pub trait CallDispatcher: Send + Sync {
    /// Dispatch an arbitrary call to `target`, forwarding `value` from the
    /// engine's own account.
    ///
    /// # Returns
    ///
    /// * `Ok(output)` - the target ran and returned `output`
    /// * `Err(CallError::Reverted { output })` - the target ran and failed;
    ///   no value moved
    async fn invoke(
        &self,
        target: Address,
        payload: &Bytes,
        value: U256,
    ) -> Result<Bytes, CallError>;

    /// Raw native transfer of `amount` from `from` to `to`.
    ///
    /// Used for attached-payment collection, excess refunds, and fee
    /// payouts. The recipient may refuse the transfer.
    async fn transfer_native(
        &self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), CallError>;

    /// Native balance of `account`.
    async fn native_balance(&self, account: Address) -> Result<U256, CallError>;
}

// =============================================================================
// WORLD JOURNAL
// =============================================================================

/// Identifier of an open journal checkpoint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointId(pub Uuid);

impl CheckpointId {
    /// Creates a fresh checkpoint id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Debug for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "checkpoint:{}", self.0)
    }
}

/// Transactional boundary over all world state.
///
/// Every state-mutating invocation opens a checkpoint, performs its
/// transfers, dispatches, and balance moves, and then either commits the
/// checkpoint or rolls everything back to it. This is what makes an abort a
/// total rollback: ownership changes, balance changes, and call-target side
/// effects all revert together.
#[async_trait]
pub trait WorldJournal: Send + Sync {
    /// Open a checkpoint capturing the current world state.
    async fn checkpoint(&self) -> Result<CheckpointId, StateError>;

    /// Discard the checkpoint, keeping every change made since it.
    async fn commit(&self, id: CheckpointId) -> Result<(), StateError>;

    /// Restore the world to the checkpoint, discarding every change made
    /// since it.
    async fn rollback(&self, id: CheckpointId) -> Result<(), StateError>;
}

// =============================================================================
// TESTS
// =============================================================================
