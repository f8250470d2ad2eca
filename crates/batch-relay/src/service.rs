//! # Relay Service
//!
//! The contract-instance service: one persistent [`ControlState`], the
//! exclusion guard, and the two execution cores, wired over a world that
//! provides registries, call dispatch, and the transactional journal.
//!
//! Every mutating entry point follows the same shape: take the guard, pass
//! the gate checks, open a journal checkpoint, run the core, then commit on
//! success or roll back on any failure. The engine's own fields are only
//! touched after the last fallible step, so an abort leaves no observable
//! change anywhere.

use crate::adapters::InMemoryWorld;
use crate::domain::entities::{
    Call, CallContext, ControlState, MulticallReceipt, RelayConfig, TolerantCall,
    TransferReceipt, TransferRequest, ValueCall,
};
use crate::domain::value_objects::{Address, U256};
use crate::engine::{ExclusionGuard, MulticallEngine, TransferEngine};
use crate::errors::{AccessError, EngineError, FeeError};
use crate::events::RelayEvent;
use crate::ports::inbound::{EngineStatus, RelayApi};
use crate::ports::outbound::{CallDispatcher, CheckpointId, RegistryGateway, WorldJournal};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

// =============================================================================
// STATISTICS
// =============================================================================

/// Running counters for the service.
#[derive(Debug, Default, Clone)]
pub struct RelayStats {
    /// Transfer batches committed.
    pub batches_executed: u64,
    /// Items moved across all committed batches.
    pub items_transferred: u64,
    /// Delegated-call batches committed.
    pub multicalls_executed: u64,
    /// Calls dispatched across all committed batches.
    pub calls_dispatched: u64,
    /// Invocations that failed and rolled back.
    pub failed_invocations: u64,
    /// Invocations rejected before any work (paused, reentrant, or
    /// unauthorized).
    pub rejected_invocations: u64,
    /// Total fees collected over the service lifetime.
    pub fees_collected: U256,
}

// =============================================================================
// SERVICE
// =============================================================================

/// The relay engine service.
///
/// Generic over the world `W`, which supplies registries, call dispatch,
/// and the journal. The in-memory world backs tests; production adapters
/// implement the same three ports.
pub struct RelayService<W>
where
    W: RegistryGateway + CallDispatcher + WorldJournal,
{
    /// The engine's own account in the world.
    address: Address,
    /// Size and fee bounds.
    config: RelayConfig,
    /// Persistent operator/pause/fee state.
    control: Arc<RwLock<ControlState>>,
    /// Reentrancy exclusion across all mutating entry points.
    guard: ExclusionGuard,
    /// The world the engine executes against.
    world: Arc<W>,
    /// Service statistics.
    stats: Arc<RwLock<RelayStats>>,
}

impl<W> RelayService<W>
where
    W: RegistryGateway + CallDispatcher + WorldJournal,
{
    /// Creates a service at `address`, operated by `operator`.
    pub fn new(address: Address, operator: Address, world: Arc<W>, config: RelayConfig) -> Self {
        Self {
            address,
            config,
            control: Arc::new(RwLock::new(ControlState::new(operator))),
            guard: ExclusionGuard::new(),
            world,
            stats: Arc::new(RwLock::new(RelayStats::default())),
        }
    }

    /// The engine's own account.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current service statistics.
    pub async fn stats(&self) -> RelayStats {
        self.stats.read().await.clone()
    }

    // -------------------------------------------------------------------------
    // Entry-point plumbing
    // -------------------------------------------------------------------------

    async fn note_rejection(&self) {
        self.stats.write().await.rejected_invocations += 1;
    }

    async fn ensure_operator(&self, caller: Address) -> Result<(), EngineError> {
        let control = self.control.read().await;
        if control.operator != caller {
            return Err(AccessError::NotOperator { caller }.into());
        }
        Ok(())
    }

    /// Credits the attached payment to the engine account. Runs inside the
    /// checkpoint, so a later abort returns it to the caller.
    async fn collect_payment(&self, ctx: &CallContext) -> Result<(), EngineError> {
        if ctx.value.is_zero() {
            return Ok(());
        }
        self.world
            .transfer_native(ctx.caller, self.address, ctx.value)
            .await?;
        Ok(())
    }

    /// Commits the checkpoint on success, rolls back on failure.
    async fn finalize<T>(
        &self,
        checkpoint: CheckpointId,
        result: Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        match result {
            Ok(value) => {
                self.world.commit(checkpoint).await?;
                Ok(value)
            }
            Err(err) => {
                self.world.rollback(checkpoint).await?;
                self.stats.write().await.failed_invocations += 1;
                Err(err)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Transfer batches
    // -------------------------------------------------------------------------

    /// Moves a batch of items to one recipient, charging the flat fee and
    /// refunding the excess.
    #[instrument(skip(self, request), fields(caller = %ctx.caller))]
    pub async fn send_batch(
        &self,
        ctx: &CallContext,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, EngineError> {
        let correlation_id = Uuid::new_v4();

        let _entry = match self.guard.enter() {
            Ok(token) => token,
            Err(err) => {
                self.note_rejection().await;
                return Err(err);
            }
        };

        let fee = {
            let control = self.control.read().await;
            if control.paused {
                drop(control);
                warn!(%correlation_id, "transfer batch rejected while paused");
                self.note_rejection().await;
                return Err(EngineError::Paused);
            }
            control.fee
        };

        let checkpoint = self.world.checkpoint().await?;
        let result = async {
            self.collect_payment(ctx).await?;
            let engine =
                TransferEngine::new(&*self.world, &*self.world, &self.config, self.address);
            engine
                .execute(ctx, request, fee)
                .await
                .map_err(EngineError::from)
        }
        .await;
        let receipt = self.finalize(checkpoint, result).await?;

        self.control.write().await.collected += fee;
        {
            let mut stats = self.stats.write().await;
            stats.batches_executed += 1;
            stats.items_transferred += receipt.transferred.len() as u64;
            stats.fees_collected += fee;
        }

        info!(
            %correlation_id,
            items = receipt.transferred.len(),
            %fee,
            refunded = %receipt.refunded,
            "transfer batch committed"
        );
        Ok(receipt)
    }

    // -------------------------------------------------------------------------
    // Delegated-call batches
    // -------------------------------------------------------------------------

    /// Strict delegated-call batch. Operator-only.
    #[instrument(skip(self, calls), fields(caller = %ctx.caller))]
    pub async fn execute_all(
        &self,
        ctx: &CallContext,
        calls: &[Call],
    ) -> Result<MulticallReceipt, EngineError> {
        let _entry = self.enter_multicall(ctx).await?;

        let checkpoint = self.world.checkpoint().await?;
        let result = async {
            self.collect_payment(ctx).await?;
            MulticallEngine::new(&*self.world, &self.config)
                .execute_all(ctx, calls)
                .await
                .map_err(EngineError::from)
        }
        .await;
        let receipt = self.finalize(checkpoint, result).await?;

        self.note_multicall(&receipt).await;
        Ok(receipt)
    }

    /// Failure-tolerant delegated-call batch. Operator-only.
    #[instrument(skip(self, calls), fields(caller = %ctx.caller))]
    pub async fn execute_all_tolerant(
        &self,
        ctx: &CallContext,
        calls: &[TolerantCall],
    ) -> Result<MulticallReceipt, EngineError> {
        let _entry = self.enter_multicall(ctx).await?;

        let checkpoint = self.world.checkpoint().await?;
        let result = async {
            self.collect_payment(ctx).await?;
            MulticallEngine::new(&*self.world, &self.config)
                .execute_all_tolerant(ctx, calls)
                .await
                .map_err(EngineError::from)
        }
        .await;
        let receipt = self.finalize(checkpoint, result).await?;

        self.note_multicall(&receipt).await;
        Ok(receipt)
    }

    /// Value-forwarding tolerant delegated-call batch. Operator-only; the
    /// attached payment must equal the sum of declared values exactly.
    #[instrument(skip(self, calls), fields(caller = %ctx.caller))]
    pub async fn execute_all_tolerant_with_value(
        &self,
        ctx: &CallContext,
        calls: &[ValueCall],
    ) -> Result<MulticallReceipt, EngineError> {
        let _entry = self.enter_multicall(ctx).await?;

        let checkpoint = self.world.checkpoint().await?;
        let result = async {
            self.collect_payment(ctx).await?;
            MulticallEngine::new(&*self.world, &self.config)
                .execute_all_tolerant_with_value(ctx, calls)
                .await
                .map_err(EngineError::from)
        }
        .await;
        let receipt = self.finalize(checkpoint, result).await?;

        self.note_multicall(&receipt).await;
        Ok(receipt)
    }

    async fn enter_multicall(
        &self,
        ctx: &CallContext,
    ) -> Result<crate::engine::ExclusionToken<'_>, EngineError> {
        let token = match self.guard.enter() {
            Ok(token) => token,
            Err(err) => {
                self.note_rejection().await;
                return Err(err);
            }
        };

        if let Err(err) = self.ensure_operator(ctx.caller).await {
            warn!(caller = %ctx.caller, "unauthorized multicall");
            self.note_rejection().await;
            return Err(err);
        }

        Ok(token)
    }

    async fn note_multicall(&self, receipt: &MulticallReceipt) {
        let mut stats = self.stats.write().await;
        stats.multicalls_executed += 1;
        stats.calls_dispatched += receipt.executed as u64;
    }

    // -------------------------------------------------------------------------
    // Administration
    // -------------------------------------------------------------------------

    /// Begins a two-phase operator handoff. The effective operator is
    /// unchanged until the candidate accepts; proposing again replaces the
    /// pending candidate.
    #[instrument(skip(self), fields(caller = %ctx.caller, %candidate))]
    pub async fn propose_handoff(
        &self,
        ctx: &CallContext,
        candidate: Address,
    ) -> Result<RelayEvent, EngineError> {
        let _entry = self.guard.enter()?;
        self.ensure_operator(ctx.caller).await?;

        if candidate.is_zero() {
            return Err(AccessError::InvalidCandidate.into());
        }

        self.control.write().await.pending_operator = Some(candidate);
        info!("operator handoff proposed");
        Ok(RelayEvent::HandoffProposed { candidate })
    }

    /// Completes a handoff previously proposed to the caller.
    #[instrument(skip(self), fields(caller = %ctx.caller))]
    pub async fn accept_handoff(&self, ctx: &CallContext) -> Result<RelayEvent, EngineError> {
        let _entry = self.guard.enter()?;

        let mut control = self.control.write().await;
        if control.pending_operator != Some(ctx.caller) {
            return Err(AccessError::NotPendingOperator { caller: ctx.caller }.into());
        }

        let previous = control.operator;
        control.operator = ctx.caller;
        control.pending_operator = None;

        info!(%previous, "operator handoff completed");
        Ok(RelayEvent::HandoffCompleted {
            previous,
            new: ctx.caller,
        })
    }

    /// Sets the flat per-batch fee, bounded by the configured ceiling.
    #[instrument(skip(self), fields(caller = %ctx.caller, %value))]
    pub async fn set_fee(
        &self,
        ctx: &CallContext,
        value: U256,
    ) -> Result<RelayEvent, EngineError> {
        let _entry = self.guard.enter()?;
        self.ensure_operator(ctx.caller).await?;

        if value > self.config.max_fee {
            return Err(FeeError::AboveCeiling {
                requested: value,
                max: self.config.max_fee,
            }
            .into());
        }

        self.control.write().await.fee = value;
        info!("fee updated");
        Ok(RelayEvent::FeeUpdated { new_fee: value })
    }

    /// Gates off transfer batches.
    #[instrument(skip(self), fields(caller = %ctx.caller))]
    pub async fn pause(&self, ctx: &CallContext) -> Result<RelayEvent, EngineError> {
        let _entry = self.guard.enter()?;
        self.ensure_operator(ctx.caller).await?;

        let mut control = self.control.write().await;
        if control.paused {
            return Err(EngineError::AlreadyPaused);
        }
        control.paused = true;

        info!("engine paused");
        Ok(RelayEvent::Paused { by: ctx.caller })
    }

    /// Reopens transfer batches.
    #[instrument(skip(self), fields(caller = %ctx.caller))]
    pub async fn unpause(&self, ctx: &CallContext) -> Result<RelayEvent, EngineError> {
        let _entry = self.guard.enter()?;
        self.ensure_operator(ctx.caller).await?;

        let mut control = self.control.write().await;
        if !control.paused {
            return Err(EngineError::NotPaused);
        }
        control.paused = false;

        info!("engine unpaused");
        Ok(RelayEvent::Unpaused { by: ctx.caller })
    }

    /// Pays out `amount` of collected fees to the caller. The collected
    /// ledger is only debited after the payout has gone through.
    #[instrument(skip(self), fields(caller = %ctx.caller, %amount))]
    pub async fn withdraw(
        &self,
        ctx: &CallContext,
        amount: U256,
    ) -> Result<RelayEvent, EngineError> {
        let _entry = self.guard.enter()?;
        self.ensure_operator(ctx.caller).await?;

        let collected = self.control.read().await.collected;
        if amount > collected {
            return Err(FeeError::InsufficientCollected {
                requested: amount,
                collected,
            }
            .into());
        }

        self.world
            .transfer_native(self.address, ctx.caller, amount)
            .await
            .map_err(|err| {
                warn!(error = %err, "fee payout failed");
                EngineError::from(FeeError::PayoutFailed)
            })?;

        self.control.write().await.collected -= amount;
        info!("fees withdrawn");
        Ok(RelayEvent::FundsWithdrawn {
            recipient: ctx.caller,
            amount,
        })
    }

    // -------------------------------------------------------------------------
    // Read-only queries
    // -------------------------------------------------------------------------

    /// Snapshot of the engine's persistent metadata.
    pub async fn status(&self) -> EngineStatus {
        let control = self.control.read().await;
        EngineStatus {
            operator: control.operator,
            pending_operator: control.pending_operator,
            paused: control.paused,
            fee: control.fee,
            collected: control.collected,
        }
    }

    /// The engine account's native balance.
    pub async fn native_balance(&self) -> Result<U256, EngineError> {
        Ok(self.world.native_balance(self.address).await?)
    }
}

/// Creates a service over a fresh in-memory world, returning the world
/// alongside so tests can script it.
#[must_use]
pub fn create_test_service(
    address: Address,
    operator: Address,
) -> (RelayService<InMemoryWorld>, Arc<InMemoryWorld>) {
    let world = Arc::new(InMemoryWorld::new(address));
    let service = RelayService::new(address, operator, Arc::clone(&world), RelayConfig::default());
    (service, world)
}

// =============================================================================
// RelayApi Implementation
// =============================================================================

#[async_trait]
impl<W> RelayApi for RelayService<W>
where
    W: RegistryGateway + CallDispatcher + WorldJournal,
{
    async fn send_batch(
        &self,
        ctx: &CallContext,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, EngineError> {
        RelayService::send_batch(self, ctx, request).await
    }

    async fn propose_handoff(
        &self,
        ctx: &CallContext,
        candidate: Address,
    ) -> Result<RelayEvent, EngineError> {
        RelayService::propose_handoff(self, ctx, candidate).await
    }

    async fn accept_handoff(&self, ctx: &CallContext) -> Result<RelayEvent, EngineError> {
        RelayService::accept_handoff(self, ctx).await
    }

    async fn set_fee(&self, ctx: &CallContext, value: U256) -> Result<RelayEvent, EngineError> {
        RelayService::set_fee(self, ctx, value).await
    }

    async fn pause(&self, ctx: &CallContext) -> Result<RelayEvent, EngineError> {
        RelayService::pause(self, ctx).await
    }

    async fn unpause(&self, ctx: &CallContext) -> Result<RelayEvent, EngineError> {
        RelayService::unpause(self, ctx).await
    }

    async fn withdraw(&self, ctx: &CallContext, amount: U256) -> Result<RelayEvent, EngineError> {
        RelayService::withdraw(self, ctx, amount).await
    }

    async fn execute_all(
        &self,
        ctx: &CallContext,
        calls: &[Call],
    ) -> Result<MulticallReceipt, EngineError> {
        RelayService::execute_all(self, ctx, calls).await
    }

    async fn execute_all_tolerant(
        &self,
        ctx: &CallContext,
        calls: &[TolerantCall],
    ) -> Result<MulticallReceipt, EngineError> {
        RelayService::execute_all_tolerant(self, ctx, calls).await
    }

    async fn execute_all_tolerant_with_value(
        &self,
        ctx: &CallContext,
        calls: &[ValueCall],
    ) -> Result<MulticallReceipt, EngineError> {
        RelayService::execute_all_tolerant_with_value(self, ctx, calls).await
    }

    async fn status(&self) -> EngineStatus {
        RelayService::status(self).await
    }

    async fn native_balance(&self) -> Result<U256, EngineError> {
        RelayService::native_balance(self).await
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::world::TargetScript;
    use crate::domain::invariants::check_transfer_completeness;
    use crate::domain::value_objects::Bytes;
    use crate::errors::{MulticallError, TransferError};

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    const ENGINE: u8 = 0xee;
    const OPERATOR: u8 = 0x01;
    const CALLER: u8 = 0x10;
    const RECIPIENT: u8 = 0x20;
    const REGISTRY: u8 = 0x30;

    /// Service plus a world holding `items` items owned by the caller and a
    /// funded caller account.
    fn fixture(items: u64) -> (RelayService<InMemoryWorld>, Arc<InMemoryWorld>) {
        let (service, world) = create_test_service(addr(ENGINE), addr(OPERATOR));
        world.register_registry(addr(REGISTRY));
        for item in 0..items {
            world.mint(addr(REGISTRY), U256::from(item), addr(CALLER));
        }
        world.set_balance(addr(CALLER), U256::from(1_000));
        (service, world)
    }

    fn request(items: u64) -> TransferRequest {
        TransferRequest {
            registries: vec![addr(REGISTRY); items as usize],
            item_ids: (0..items).map(U256::from).collect(),
            recipient: addr(RECIPIENT),
            deadline: 1_000,
        }
    }

    fn caller_ctx(value: u64) -> CallContext {
        CallContext::new(addr(CALLER))
            .with_value(U256::from(value))
            .at_time(1_000)
    }

    fn operator_ctx(value: u64) -> CallContext {
        CallContext::new(addr(OPERATOR)).with_value(U256::from(value))
    }

    // -------------------------------------------------------------------------
    // Transfer batches
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_send_batch_commits_and_collects_fee() {
        let (service, world) = fixture(3);
        service
            .set_fee(&operator_ctx(0), U256::from(10))
            .await
            .unwrap();

        let receipt = service
            .send_batch(&caller_ctx(10), &request(3))
            .await
            .unwrap();

        assert!(check_transfer_completeness(&request(3), &receipt));
        assert_eq!(world.owner_of(addr(REGISTRY), U256::zero()), Some(addr(RECIPIENT)));
        assert_eq!(service.status().await.collected, U256::from(10));
        assert_eq!(service.native_balance().await.unwrap(), U256::from(10));

        let stats = service.stats().await;
        assert_eq!(stats.batches_executed, 1);
        assert_eq!(stats.items_transferred, 3);
        assert_eq!(stats.fees_collected, U256::from(10));
    }

    #[tokio::test]
    async fn test_send_batch_atomicity_on_mid_batch_failure() {
        let (service, world) = fixture(3);
        service
            .set_fee(&operator_ctx(0), U256::from(10))
            .await
            .unwrap();

        // Item 1 of 3 belongs to someone else, so the batch dies at index 1.
        world.mint(addr(REGISTRY), U256::from(1), addr(0x99));

        let err = service
            .send_batch(&caller_ctx(10), &request(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Transfer(TransferError::ItemTransferFailed { item_id, .. })
                if item_id == U256::from(1)
        ));

        // Item 0 transferred before the failure, then rolled back with it.
        assert_eq!(world.owner_of(addr(REGISTRY), U256::zero()), Some(addr(CALLER)));
        // No fee collected, and the attached payment came back.
        assert_eq!(service.status().await.collected, U256::zero());
        assert_eq!(world.balance_of(addr(CALLER)), U256::from(1_000));
        assert_eq!(service.stats().await.failed_invocations, 1);
    }

    #[tokio::test]
    async fn test_refund_exactness() {
        let (service, world) = fixture(1);
        service
            .set_fee(&operator_ctx(0), U256::from(10))
            .await
            .unwrap();

        // Overpay by 490: net spend must be exactly the fee.
        let receipt = service
            .send_batch(&caller_ctx(500), &request(1))
            .await
            .unwrap();

        assert_eq!(receipt.fee_paid, U256::from(10));
        assert_eq!(receipt.refunded, U256::from(490));
        assert_eq!(world.balance_of(addr(CALLER)), U256::from(990));
    }

    #[tokio::test]
    async fn test_send_batch_rejects_underpayment() {
        let (service, _world) = fixture(1);
        service
            .set_fee(&operator_ctx(0), U256::from(10))
            .await
            .unwrap();

        let err = service
            .send_batch(&caller_ctx(9), &request(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Transfer(TransferError::InsufficientFee { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_batch_bounds() {
        let (service, world) = fixture(51);

        let err = service
            .send_batch(&caller_ctx(0), &request(51))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Transfer(TransferError::BatchTooLarge { len: 51, max: 50 })
        ));
        // No state change.
        assert_eq!(world.owner_of(addr(REGISTRY), U256::zero()), Some(addr(CALLER)));

        // Exactly at the bound succeeds.
        let receipt = service
            .send_batch(&caller_ctx(0), &request(50))
            .await
            .unwrap();
        assert_eq!(receipt.transferred.len(), 50);
    }

    #[tokio::test]
    async fn test_deadline_boundary() {
        let (service, _world) = fixture(1);

        // Deadline equal to now is valid.
        let ctx = caller_ctx(0).at_time(1_000);
        assert!(service.send_batch(&ctx, &request(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_request_rejected() {
        let (service, _world) = fixture(1);

        let ctx = caller_ctx(0).at_time(1_001);
        let err = service.send_batch(&ctx, &request(1)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Transfer(TransferError::Expired { deadline: 1_000, now: 1_001 })
        ));
    }

    // -------------------------------------------------------------------------
    // Pause gating
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_pause_gates_transfers_until_unpause() {
        let (service, _world) = fixture(1);

        service.pause(&operator_ctx(0)).await.unwrap();
        let err = service
            .send_batch(&caller_ctx(0), &request(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Paused));
        assert_eq!(service.stats().await.rejected_invocations, 1);

        // Identical inputs go through once unpaused.
        service.unpause(&operator_ctx(0)).await.unwrap();
        assert!(service.send_batch(&caller_ctx(0), &request(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_pause_transitions_are_operator_only_and_exclusive() {
        let (service, _world) = fixture(0);

        let err = service.pause(&caller_ctx(0)).await.unwrap_err();
        assert!(matches!(err, EngineError::Access(AccessError::NotOperator { .. })));

        service.pause(&operator_ctx(0)).await.unwrap();
        assert!(matches!(
            service.pause(&operator_ctx(0)).await,
            Err(EngineError::AlreadyPaused)
        ));

        service.unpause(&operator_ctx(0)).await.unwrap();
        assert!(matches!(
            service.unpause(&operator_ctx(0)).await,
            Err(EngineError::NotPaused)
        ));
    }

    // -------------------------------------------------------------------------
    // Two-phase handoff
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_two_phase_handoff() {
        let (service, _world) = fixture(0);
        let candidate = addr(0x40);

        // Proposing does not change the effective operator.
        let event = service
            .propose_handoff(&operator_ctx(0), candidate)
            .await
            .unwrap();
        assert_eq!(event, RelayEvent::HandoffProposed { candidate });
        assert_eq!(service.status().await.operator, addr(OPERATOR));

        // Only the candidate may accept.
        let err = service.accept_handoff(&caller_ctx(0)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Access(AccessError::NotPendingOperator { .. })
        ));

        let event = service
            .accept_handoff(&CallContext::new(candidate))
            .await
            .unwrap();
        assert_eq!(
            event,
            RelayEvent::HandoffCompleted {
                previous: addr(OPERATOR),
                new: candidate,
            }
        );

        let status = service.status().await;
        assert_eq!(status.operator, candidate);
        assert!(status.pending_operator.is_none());
    }

    #[tokio::test]
    async fn test_second_proposal_overwrites_first_candidate() {
        let (service, _world) = fixture(0);
        let first = addr(0x40);
        let second = addr(0x41);

        service
            .propose_handoff(&operator_ctx(0), first)
            .await
            .unwrap();
        service
            .propose_handoff(&operator_ctx(0), second)
            .await
            .unwrap();

        // The first candidate can no longer accept.
        let err = service
            .accept_handoff(&CallContext::new(first))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Access(AccessError::NotPendingOperator { .. })
        ));

        assert!(service
            .accept_handoff(&CallContext::new(second))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_handoff_rejects_zero_candidate_and_non_operator() {
        let (service, _world) = fixture(0);

        let err = service
            .propose_handoff(&operator_ctx(0), Address::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Access(AccessError::InvalidCandidate)));

        let err = service
            .propose_handoff(&caller_ctx(0), addr(0x40))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Access(AccessError::NotOperator { .. })));
    }

    // -------------------------------------------------------------------------
    // Fee ledger
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_fee_ceiling() {
        let (service, _world) = fixture(0);
        let ceiling = RelayConfig::default().max_fee;

        assert!(service.set_fee(&operator_ctx(0), ceiling).await.is_ok());
        let err = service
            .set_fee(&operator_ctx(0), ceiling + U256::from(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Fee(FeeError::AboveCeiling { .. })));
    }

    #[tokio::test]
    async fn test_withdraw_flow() {
        let (service, world) = fixture(1);
        service
            .set_fee(&operator_ctx(0), U256::from(10))
            .await
            .unwrap();
        service
            .send_batch(&caller_ctx(10), &request(1))
            .await
            .unwrap();

        // More than collected is refused.
        let err = service
            .withdraw(&operator_ctx(0), U256::from(11))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Fee(FeeError::InsufficientCollected { .. })
        ));

        let event = service
            .withdraw(&operator_ctx(0), U256::from(10))
            .await
            .unwrap();
        assert_eq!(
            event,
            RelayEvent::FundsWithdrawn {
                recipient: addr(OPERATOR),
                amount: U256::from(10),
            }
        );
        assert_eq!(service.status().await.collected, U256::zero());
        assert_eq!(world.balance_of(addr(OPERATOR)), U256::from(10));
    }

    #[tokio::test]
    async fn test_withdraw_payout_failure_leaves_ledger_intact() {
        let (service, world) = fixture(1);
        service
            .set_fee(&operator_ctx(0), U256::from(10))
            .await
            .unwrap();
        service
            .send_batch(&caller_ctx(10), &request(1))
            .await
            .unwrap();

        world.set_value_rejector(addr(OPERATOR));
        let err = service
            .withdraw(&operator_ctx(0), U256::from(10))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Fee(FeeError::PayoutFailed)));
        assert_eq!(service.status().await.collected, U256::from(10));
    }

    // -------------------------------------------------------------------------
    // Delegated-call batches
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_multicall_is_operator_only() {
        let (service, _world) = fixture(0);
        let calls = [Call {
            target: addr(0x50),
            payload: Bytes::new(),
        }];

        let err = service
            .execute_all(&caller_ctx(0), &calls)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Access(AccessError::NotOperator { .. })));
        assert_eq!(service.stats().await.rejected_invocations, 1);
    }

    #[tokio::test]
    async fn test_multicall_not_pause_gated() {
        let (service, _world) = fixture(0);
        service.pause(&operator_ctx(0)).await.unwrap();

        let calls = [Call {
            target: addr(0x50),
            payload: Bytes::new(),
        }];
        // Operator-only dispatch still runs while transfers are gated.
        assert!(service.execute_all(&operator_ctx(0), &calls).await.is_ok());
    }

    #[tokio::test]
    async fn test_tolerant_multicall_result_alignment() {
        let (service, world) = fixture(0);
        world.script_target(
            addr(0x51),
            TargetScript::Fail {
                output: Bytes::from_slice(&[0xff]),
            },
        );

        let calls = [
            TolerantCall {
                target: addr(0x50),
                allow_failure: false,
                payload: Bytes::new(),
            },
            TolerantCall {
                target: addr(0x51),
                allow_failure: true,
                payload: Bytes::new(),
            },
        ];

        let receipt = service
            .execute_all_tolerant(&operator_ctx(0), &calls)
            .await
            .unwrap();
        assert_eq!(receipt.outcomes.len(), 2);
        assert!(receipt.outcomes[0].success);
        assert!(!receipt.outcomes[1].success);

        let stats = service.stats().await;
        assert_eq!(stats.multicalls_executed, 1);
        assert_eq!(stats.calls_dispatched, 2);
    }

    #[tokio::test]
    async fn test_value_multicall_rolls_back_on_mismatch() {
        let (service, world) = fixture(0);
        world.set_balance(addr(OPERATOR), U256::from(100));

        let calls = [ValueCall {
            target: addr(0x50),
            allow_failure: false,
            value: U256::from(30),
            payload: Bytes::new(),
        }];

        // Attached 40 != declared 30: rejected at the end, everything
        // rolled back, payment returned.
        let err = service
            .execute_all_tolerant_with_value(&operator_ctx(40), &calls)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Multicall(MulticallError::ValueMismatch { .. })
        ));
        assert_eq!(world.balance_of(addr(OPERATOR)), U256::from(100));
        assert_eq!(world.balance_of(addr(0x50)), U256::zero());

        // Exact payment commits.
        let receipt = service
            .execute_all_tolerant_with_value(&operator_ctx(30), &calls)
            .await
            .unwrap();
        assert_eq!(receipt.value_forwarded, U256::from(30));
        assert_eq!(world.balance_of(addr(0x50)), U256::from(30));
        assert_eq!(world.balance_of(addr(OPERATOR)), U256::from(70));
    }

    // -------------------------------------------------------------------------
    // Exclusion guard
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_reentrant_invocation_rejected() {
        let (service, _world) = fixture(1);

        // Simulate a callee re-entering while an entry point is executing.
        let held = service.guard.enter().unwrap();

        let err = service
            .send_batch(&caller_ctx(0), &request(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ReentrancyDetected));

        let err = service
            .execute_all(&operator_ctx(0), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ReentrancyDetected));

        drop(held);
        assert!(service.send_batch(&caller_ctx(0), &request(1)).await.is_ok());
    }
}
