//! # Batch Transfer Engine
//!
//! Validates and executes one bounded batch of item transfers to a single
//! recipient: fail-fast validation, an in-order per-item loop of probe plus
//! transfer, then exact refund of any excess payment. The engine itself is
//! oblivious to journaling; the service wraps each run in a checkpoint so
//! that any error here rolls the whole invocation back.

use crate::domain::entities::{CallContext, RelayConfig, TransferReceipt, TransferRequest};
use crate::domain::services::validate_transfer_request;
use crate::domain::value_objects::{Address, InterfaceId, U256};
use crate::errors::TransferError;
use crate::events::RelayEvent;
use crate::ports::outbound::{CallDispatcher, RegistryGateway};
use tracing::debug;

// =============================================================================
// ENGINE
// =============================================================================

/// Executes transfer batches against the registry gateway.
pub struct TransferEngine<'a> {
    registries: &'a dyn RegistryGateway,
    dispatcher: &'a dyn CallDispatcher,
    config: &'a RelayConfig,
    /// The engine's own account, source of refunds.
    engine_account: Address,
}

impl<'a> TransferEngine<'a> {
    /// Creates an engine over the given ports.
    pub fn new(
        registries: &'a dyn RegistryGateway,
        dispatcher: &'a dyn CallDispatcher,
        config: &'a RelayConfig,
        engine_account: Address,
    ) -> Self {
        Self {
            registries,
            dispatcher,
            config,
            engine_account,
        }
    }

    /// Runs one transfer batch.
    ///
    /// Validation order: deadline, emptiness, size bound, sequence
    /// alignment, recipient, fee. Then, per item in input order: zero
    /// check, capability probe (a probe that throws counts as unsupported),
    /// transfer with recipient acceptance. Any failure is terminal for the
    /// whole batch. On success the excess over the flat fee goes back to the
    /// caller; a failed refund fails the batch too.
    pub async fn execute(
        &self,
        ctx: &CallContext,
        request: &TransferRequest,
        fee: U256,
    ) -> Result<TransferReceipt, TransferError> {
        validate_transfer_request(request, ctx.block.timestamp, fee, ctx.value, self.config)?;

        let mut transferred = Vec::with_capacity(request.len());
        let mut events = Vec::with_capacity(request.len());

        for (index, (&registry, &item_id)) in request
            .registries
            .iter()
            .zip(request.item_ids.iter())
            .enumerate()
        {
            if registry.is_zero() {
                return Err(TransferError::InvalidRegistry { index });
            }

            match self
                .registries
                .supports_interface(registry, InterfaceId::ITEM_OWNERSHIP)
                .await
            {
                Ok(true) => {}
                Ok(false) => return Err(TransferError::NotSupported { registry }),
                Err(err) => {
                    debug!(%registry, error = %err, "interface probe failed");
                    return Err(TransferError::InterfaceCheckFailed { registry });
                }
            }

            self.registries
                .transfer_item(registry, ctx.caller, request.recipient, item_id)
                .await
                .map_err(|err| {
                    debug!(%registry, %item_id, error = %err, "item transfer failed");
                    TransferError::ItemTransferFailed { registry, item_id }
                })?;

            transferred.push((registry, item_id));
            events.push(RelayEvent::ItemTransferred {
                registry,
                recipient: request.recipient,
                item_id,
            });
        }

        let excess = ctx.value.saturating_sub(fee);
        if !excess.is_zero() {
            self.dispatcher
                .transfer_native(self.engine_account, ctx.caller, excess)
                .await
                .map_err(|err| {
                    debug!(caller = %ctx.caller, %excess, error = %err, "refund failed");
                    TransferError::RefundFailed
                })?;
        }

        Ok(TransferReceipt {
            transferred,
            fee_paid: fee,
            refunded: excess,
            events,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
