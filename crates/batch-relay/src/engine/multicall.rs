//! # Delegated Call Engine
//!
//! Executes bounded batches of delegated calls in three flavors: strict
//! (any failure aborts), failure-tolerant (flagged calls may fail in place),
//! and failure-tolerant with per-call value forwarding. The value-forwarding
//! variant runs the exact-match accounting protocol: the attached payment
//! must cover the running sum of declared values at every step and equal it
//! exactly at the end.

use crate::domain::entities::{
    Call, CallContext, CallOutcome, MulticallReceipt, RelayConfig, TolerantCall, ValueCall,
};
use crate::domain::services::{ensure_call_bound, ValueAccumulator};
use crate::domain::value_objects::{Bytes, U256};
use crate::errors::{CallError, MulticallError};
use crate::events::RelayEvent;
use crate::ports::outbound::CallDispatcher;
use tracing::debug;

/// Return data carried by a failed call, if any.
fn failure_output(err: &CallError) -> Bytes {
    match err {
        CallError::Reverted { output } => output.clone(),
        _ => Bytes::new(),
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Executes delegated-call batches against the call dispatcher.
pub struct MulticallEngine<'a> {
    dispatcher: &'a dyn CallDispatcher,
    config: &'a RelayConfig,
}

impl<'a> MulticallEngine<'a> {
    /// Creates an engine over the given dispatcher.
    pub fn new(dispatcher: &'a dyn CallDispatcher, config: &'a RelayConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Strict batch: dispatches each call in order, aborting the whole batch
    /// on the first failure. No value is forwarded.
    pub async fn execute_all(
        &self,
        ctx: &CallContext,
        calls: &[Call],
    ) -> Result<MulticallReceipt, MulticallError> {
        ensure_call_bound(calls.len(), self.config)?;

        let mut outcomes = Vec::with_capacity(calls.len());
        for (index, call) in calls.iter().enumerate() {
            let output = self
                .dispatcher
                .invoke(call.target, &call.payload, U256::zero())
                .await
                .map_err(|err| {
                    debug!(index, target = %call.target, error = %err, "delegated call failed");
                    MulticallError::DelegatedCallFailed { index }
                })?;
            outcomes.push(CallOutcome::ok(output));
        }

        Ok(self.receipt(ctx, calls.len(), outcomes, U256::zero()))
    }

    /// Failure-tolerant batch: a call flagged `allow_failure` records its
    /// failure as `(false, output)` in place; an unflagged failure aborts.
    /// No value is forwarded.
    pub async fn execute_all_tolerant(
        &self,
        ctx: &CallContext,
        calls: &[TolerantCall],
    ) -> Result<MulticallReceipt, MulticallError> {
        ensure_call_bound(calls.len(), self.config)?;

        let mut outcomes = Vec::with_capacity(calls.len());
        for (index, call) in calls.iter().enumerate() {
            match self
                .dispatcher
                .invoke(call.target, &call.payload, U256::zero())
                .await
            {
                Ok(output) => outcomes.push(CallOutcome::ok(output)),
                Err(err) if call.allow_failure => {
                    debug!(index, target = %call.target, error = %err, "tolerated call failure");
                    outcomes.push(CallOutcome::failed(failure_output(&err)));
                }
                Err(err) => {
                    debug!(index, target = %call.target, error = %err, "delegated call failed");
                    return Err(MulticallError::DelegatedCallFailed { index });
                }
            }
        }

        Ok(self.receipt(ctx, calls.len(), outcomes, U256::zero()))
    }

    /// Failure-tolerant batch forwarding declared value per call.
    ///
    /// The running sum of declared values is checked against the attached
    /// payment after every addition, so underfunding surfaces at the
    /// earliest possible call; after the loop the payment must match the sum
    /// exactly, so overpayment is rejected rather than stranded. A tolerated
    /// failure still commits its declared value to the accounting even
    /// though the failed call consumed none of it.
    pub async fn execute_all_tolerant_with_value(
        &self,
        ctx: &CallContext,
        calls: &[ValueCall],
    ) -> Result<MulticallReceipt, MulticallError> {
        ensure_call_bound(calls.len(), self.config)?;

        let mut accumulator = ValueAccumulator::new(ctx.value);
        let mut outcomes = Vec::with_capacity(calls.len());

        for (index, call) in calls.iter().enumerate() {
            accumulator.add(index, call.value)?;

            match self
                .dispatcher
                .invoke(call.target, &call.payload, call.value)
                .await
            {
                Ok(output) => outcomes.push(CallOutcome::ok(output)),
                Err(err) if call.allow_failure => {
                    debug!(index, target = %call.target, error = %err, "tolerated call failure");
                    outcomes.push(CallOutcome::failed(failure_output(&err)));
                }
                Err(err) => {
                    debug!(index, target = %call.target, error = %err, "delegated call failed");
                    return Err(MulticallError::DelegatedCallFailed { index });
                }
            }
        }

        accumulator.finalize()?;

        Ok(self.receipt(ctx, calls.len(), outcomes, accumulator.accumulated()))
    }

    fn receipt(
        &self,
        ctx: &CallContext,
        calls: usize,
        outcomes: Vec<CallOutcome>,
        value_forwarded: U256,
    ) -> MulticallReceipt {
        debug_assert_eq!(outcomes.len(), calls);

        MulticallReceipt {
            executed: calls,
            outcomes,
            value_forwarded,
            events: vec![RelayEvent::MulticallExecuted {
                count: calls,
                caller: ctx.caller,
            }],
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
