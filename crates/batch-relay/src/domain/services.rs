//! # Domain Services
//!
//! Pure validation and accounting logic. No I/O, no async; everything here is
//! deterministic and unit-testable in isolation.

use crate::domain::entities::{RelayConfig, TransferRequest, ValueCall};
use crate::domain::value_objects::U256;
use crate::errors::{MulticallError, TransferError};

// =============================================================================
// TRANSFER VALIDATION
// =============================================================================

/// Validates a transfer request ahead of its core loop.
///
/// Checks run in a fixed order and the first failure is terminal:
/// deadline, emptiness, size bound, sequence alignment, recipient, fee.
/// A deadline equal to `now` is still valid.
pub fn validate_transfer_request(
    request: &TransferRequest,
    now: u64,
    fee: U256,
    payment: U256,
    config: &RelayConfig,
) -> Result<(), TransferError> {
    if now > request.deadline {
        return Err(TransferError::Expired {
            deadline: request.deadline,
            now,
        });
    }

    if request.is_empty() {
        return Err(TransferError::EmptyBatch);
    }

    if request.len() > config.max_batch_size {
        return Err(TransferError::BatchTooLarge {
            len: request.len(),
            max: config.max_batch_size,
        });
    }

    if request.registries.len() != request.item_ids.len() {
        return Err(TransferError::LengthMismatch {
            registries: request.registries.len(),
            items: request.item_ids.len(),
        });
    }

    if request.recipient.is_zero() {
        return Err(TransferError::InvalidRecipient);
    }

    if payment < fee {
        return Err(TransferError::InsufficientFee {
            required: fee,
            provided: payment,
        });
    }

    Ok(())
}

// =============================================================================
// MULTICALL BOUNDS
// =============================================================================

/// Rejects delegated-call batches above the configured size bound.
pub fn ensure_call_bound(len: usize, config: &RelayConfig) -> Result<(), MulticallError> {
    if len > config.max_multicall_size {
        return Err(MulticallError::TooManyCalls {
            len,
            max: config.max_multicall_size,
        });
    }
    Ok(())
}

/// Checked sum of the declared values in a batch.
///
/// Mirrors the running accumulation the engine performs, for callers that
/// want to price a batch up front.
pub fn required_value(calls: &[ValueCall]) -> Result<U256, MulticallError> {
    let mut total = U256::zero();
    for (index, call) in calls.iter().enumerate() {
        total = total
            .checked_add(call.value)
            .ok_or(MulticallError::ValueOverflow { index })?;
    }
    Ok(total)
}

// =============================================================================
// VALUE ACCOUNTING
// =============================================================================

/// Running accounting for a value-forwarding batch.
///
/// The attached payment must cover the accumulated declared values at every
/// step, and must equal them exactly once the batch is done. Underfunding is
/// therefore detected at the earliest possible call, and overpayment is
/// rejected at the end rather than silently stranded.
#[derive(Clone, Copy, Debug)]
pub struct ValueAccumulator {
    attached: U256,
    accumulated: U256,
}

impl ValueAccumulator {
    /// Starts accounting against the caller's attached payment.
    #[must_use]
    pub fn new(attached: U256) -> Self {
        Self {
            attached,
            accumulated: U256::zero(),
        }
    }

    /// Adds the declared value of the call at `index`.
    ///
    /// Fails with `ValueOverflow` if the sum no longer fits, and with
    /// `ValueMismatch` the moment the sum exceeds the attached payment.
    pub fn add(&mut self, index: usize, value: U256) -> Result<(), MulticallError> {
        self.accumulated = self
            .accumulated
            .checked_add(value)
            .ok_or(MulticallError::ValueOverflow { index })?;

        if self.attached < self.accumulated {
            return Err(MulticallError::ValueMismatch {
                attached: self.attached,
                required: self.accumulated,
            });
        }

        Ok(())
    }

    /// Requires the attached payment to equal the accumulated values exactly.
    pub fn finalize(&self) -> Result<(), MulticallError> {
        if self.attached != self.accumulated {
            return Err(MulticallError::ValueMismatch {
                attached: self.attached,
                required: self.accumulated,
            });
        }
        Ok(())
    }

    /// Total declared value accumulated so far.
    #[must_use]
    pub fn accumulated(&self) -> U256 {
        self.accumulated
    }
}

// =============================================================================
// TESTS
// =============================================================================
