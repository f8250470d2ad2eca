//! # Driving Ports (Inbound)
//!
//! The interface the relay engine exposes. Hosts and harnesses drive the
//! engine through [`RelayApi`]; the service in `service.rs` is its canonical
//! implementation.

use crate::domain::entities::{
    Call, CallContext, MulticallReceipt, TolerantCall, TransferReceipt, TransferRequest,
    ValueCall,
};
use crate::domain::value_objects::{Address, U256};
use crate::errors::EngineError;
use crate::events::RelayEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// ENGINE STATUS
// =============================================================================

/// Snapshot of the engine's persistent metadata, readable by anyone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Current operator.
    pub operator: Address,
    /// Candidate of an in-flight handoff, if any.
    pub pending_operator: Option<Address>,
    /// Whether transfer batches are gated off.
    pub paused: bool,
    /// Flat fee charged per transfer batch.
    pub fee: U256,
    /// Collected fees available for withdrawal.
    pub collected: U256,
}

// =============================================================================
// RELAY API (Primary Driving Port)
// =============================================================================

/// Primary API of the relay engine.
///
/// | Operation | Access | Effect |
/// |---|---|---|
/// | `send_batch` | anyone, not paused | transfers items, collects fee, refunds excess |
/// | `propose_handoff` | operator | begins two-phase handoff |
/// | `accept_handoff` | pending candidate | completes handoff |
/// | `set_fee` | operator | bounded by the fee ceiling |
/// | `pause` / `unpause` | operator | toggles the transfer gate |
/// | `withdraw` | operator | pays out collected fees |
/// | `execute_all` | operator | strict delegated-call batch |
/// | `execute_all_tolerant` | operator | per-call failure-tolerant batch |
/// | `execute_all_tolerant_with_value` | operator | value-forwarding tolerant batch |
/// | `status` / `native_balance` | anyone | read-only metadata |
///
/// Every mutating operation is atomic: it either commits completely or
/// leaves no observable change, including on deep external-call failures.
#[async_trait]
pub trait RelayApi: Send + Sync {
    /// Move a batch of items to one recipient, charging the flat fee and
    /// refunding any excess payment.
    async fn send_batch(
        &self,
        ctx: &CallContext,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, EngineError>;

    /// Begin a two-phase operator handoff to `candidate`. The effective
    /// operator does not change until the candidate accepts; a later
    /// proposal replaces the pending candidate.
    async fn propose_handoff(
        &self,
        ctx: &CallContext,
        candidate: Address,
    ) -> Result<RelayEvent, EngineError>;

    /// Complete a handoff previously proposed to the caller.
    async fn accept_handoff(&self, ctx: &CallContext) -> Result<RelayEvent, EngineError>;

    /// Set the flat per-batch fee, bounded by the fee ceiling.
    async fn set_fee(&self, ctx: &CallContext, value: U256) -> Result<RelayEvent, EngineError>;

    /// Gate off transfer batches.
    async fn pause(&self, ctx: &CallContext) -> Result<RelayEvent, EngineError>;

    /// Reopen transfer batches.
    async fn unpause(&self, ctx: &CallContext) -> Result<RelayEvent, EngineError>;

    /// Pay out `amount` of collected fees to the caller.
    async fn withdraw(&self, ctx: &CallContext, amount: U256) -> Result<RelayEvent, EngineError>;

    /// Execute a strict batch of delegated calls: any failure aborts the
    /// whole batch.
    async fn execute_all(
        &self,
        ctx: &CallContext,
        calls: &[Call],
    ) -> Result<MulticallReceipt, EngineError>;

    /// Execute a failure-tolerant batch: a call flagged `allow_failure`
    /// records its failure in place instead of aborting.
    async fn execute_all_tolerant(
        &self,
        ctx: &CallContext,
        calls: &[TolerantCall],
    ) -> Result<MulticallReceipt, EngineError>;

    /// Execute a failure-tolerant batch forwarding declared value per call.
    /// The attached payment must equal the sum of declared values exactly.
    async fn execute_all_tolerant_with_value(
        &self,
        ctx: &CallContext,
        calls: &[ValueCall],
    ) -> Result<MulticallReceipt, EngineError>;

    /// Read the engine's persistent metadata.
    async fn status(&self) -> EngineStatus;

    /// Read the engine's native balance from the world.
    async fn native_balance(&self) -> Result<U256, EngineError>;
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let status = EngineStatus {
            operator: Address::new([1u8; 20]),
            pending_operator: None,
            paused: false,
            fee: U256::from(5),
            collected: U256::zero(),
        };

        let serialized = serde_json::to_string(&status).unwrap();
        let deserialized: EngineStatus = serde_json::from_str(&serialized).unwrap();
        assert_eq!(status, deserialized);
    }
}
