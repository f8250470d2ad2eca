//! # In-Memory World
//!
//! In-memory implementation of every outbound port: item registries, native
//! balances, scripted call targets, and the transactional journal.
//! Production deployments would adapt these ports to real registries and a
//! real transactional store; tests script this one to inject failures.

use crate::domain::value_objects::{Address, Bytes, InterfaceId, U256};
use crate::errors::{CallError, RegistryError, StateError};
use crate::ports::outbound::{CallDispatcher, CheckpointId, RegistryGateway, WorldJournal};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

// =============================================================================
// SCRIPTS
// =============================================================================

/// Scripted behavior of a call target.
#[derive(Clone, Debug)]
pub enum TargetScript {
    /// The target runs and returns `output`.
    Succeed {
        /// Return data handed back to the engine.
        output: Bytes,
    },
    /// The target runs and fails with `output` as failure data. No value
    /// moves.
    Fail {
        /// Failure data handed back to the engine.
        output: Bytes,
    },
}

/// One dispatched call, recorded for test assertions. The record survives
/// rollback; it documents what was attempted, not what committed.
#[derive(Clone, Debug)]
pub struct DispatchRecord {
    /// Target the call went to.
    pub target: Address,
    /// Payload handed to the target.
    pub payload: Bytes,
    /// Value the call carried.
    pub value: U256,
}

// =============================================================================
// WORLD STATE
// =============================================================================

#[derive(Clone, Default)]
struct RegistryRecord {
    supported: bool,
    probe_fails: bool,
    owners: HashMap<U256, Address>,
    rejecting_recipients: HashSet<Address>,
}

#[derive(Clone, Default)]
struct WorldState {
    balances: HashMap<Address, U256>,
    registries: HashMap<Address, RegistryRecord>,
    targets: HashMap<Address, TargetScript>,
    value_rejectors: HashSet<Address>,
}

/// In-memory world for tests and local runs.
#[derive(Default)]
pub struct InMemoryWorld {
    /// The engine's own account; `invoke` forwards value from here.
    engine: Address,
    state: RwLock<WorldState>,
    snapshots: RwLock<HashMap<CheckpointId, WorldState>>,
    dispatched: RwLock<Vec<DispatchRecord>>,
}

impl InMemoryWorld {
    /// Creates an empty world where `engine` is the engine's own account.
    #[must_use]
    pub fn new(engine: Address) -> Self {
        Self {
            engine,
            ..Self::default()
        }
    }

    /// Registers a registry that supports item transfers.
    pub fn register_registry(&self, registry: Address) {
        self.state.write().unwrap().registries.insert(
            registry,
            RegistryRecord {
                supported: true,
                ..RegistryRecord::default()
            },
        );
    }

    /// Registers a registry that answers the probe with "unsupported".
    pub fn register_unsupported_registry(&self, registry: Address) {
        self.state
            .write()
            .unwrap()
            .registries
            .insert(registry, RegistryRecord::default());
    }

    /// Makes the registry's capability probe itself fail.
    pub fn make_probe_fail(&self, registry: Address) {
        let mut state = self.state.write().unwrap();
        let record = state.registries.entry(registry).or_default();
        record.supported = true;
        record.probe_fails = true;
    }

    /// Records `owner` as the owner of `item_id` on `registry`.
    pub fn mint(&self, registry: Address, item_id: U256, owner: Address) {
        let mut state = self.state.write().unwrap();
        state
            .registries
            .entry(registry)
            .or_default()
            .owners
            .insert(item_id, owner);
    }

    /// Current owner of `item_id` on `registry`, if any.
    #[must_use]
    pub fn owner_of(&self, registry: Address, item_id: U256) -> Option<Address> {
        self.state
            .read()
            .unwrap()
            .registries
            .get(&registry)
            .and_then(|record| record.owners.get(&item_id).copied())
    }

    /// Makes `recipient` refuse item acceptance on `registry`.
    pub fn set_recipient_rejects(&self, registry: Address, recipient: Address) {
        self.state
            .write()
            .unwrap()
            .registries
            .entry(registry)
            .or_default()
            .rejecting_recipients
            .insert(recipient);
    }

    /// Sets the native balance of `account`.
    pub fn set_balance(&self, account: Address, amount: U256) {
        self.state.write().unwrap().balances.insert(account, amount);
    }

    /// Native balance of `account`.
    #[must_use]
    pub fn balance_of(&self, account: Address) -> U256 {
        self.state
            .read()
            .unwrap()
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    /// Scripts the behavior of a call target. Unscripted targets behave like
    /// plain accounts: the call succeeds with empty output and the value is
    /// accepted.
    pub fn script_target(&self, target: Address, script: TargetScript) {
        self.state.write().unwrap().targets.insert(target, script);
    }

    /// Makes `account` refuse raw native transfers.
    pub fn set_value_rejector(&self, account: Address) {
        self.state.write().unwrap().value_rejectors.insert(account);
    }

    /// Every call dispatched so far, attempted ones included.
    #[must_use]
    pub fn dispatched(&self) -> Vec<DispatchRecord> {
        self.dispatched.read().unwrap().clone()
    }

    fn move_balance(
        state: &mut WorldState,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), CallError> {
        if amount.is_zero() {
            return Ok(());
        }

        let available = state.balances.get(&from).copied().unwrap_or_default();
        if available < amount {
            return Err(CallError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        state.balances.insert(from, available - amount);
        let credit = state.balances.get(&to).copied().unwrap_or_default();
        state.balances.insert(to, credit + amount);
        Ok(())
    }
}

// =============================================================================
// PORT IMPLEMENTATIONS
// =============================================================================

#[async_trait]
impl RegistryGateway for InMemoryWorld {
    async fn supports_interface(
        &self,
        registry: Address,
        interface: InterfaceId,
    ) -> Result<bool, RegistryError> {
        let state = self.state.read().unwrap();
        let record = state
            .registries
            .get(&registry)
            .ok_or(RegistryError::Unreachable(registry))?;

        if record.probe_fails {
            return Err(RegistryError::ProbeFailed(format!(
                "probe threw on {registry}"
            )));
        }

        Ok(record.supported && interface == InterfaceId::ITEM_OWNERSHIP)
    }

    async fn transfer_item(
        &self,
        registry: Address,
        from: Address,
        to: Address,
        item_id: U256,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.write().unwrap();
        let record = state
            .registries
            .get_mut(&registry)
            .ok_or(RegistryError::Unreachable(registry))?;

        match record.owners.get(&item_id) {
            None => {
                return Err(RegistryError::TransferRejected(format!(
                    "unknown item {item_id}"
                )))
            }
            Some(&owner) if owner != from => {
                return Err(RegistryError::TransferRejected(format!(
                    "{from} does not own item {item_id}"
                )))
            }
            Some(_) => {}
        }

        if record.rejecting_recipients.contains(&to) {
            return Err(RegistryError::TransferRejected(format!(
                "{to} refused acceptance"
            )));
        }

        record.owners.insert(item_id, to);
        Ok(())
    }
}

#[async_trait]
impl CallDispatcher for InMemoryWorld {
    async fn invoke(
        &self,
        target: Address,
        payload: &Bytes,
        value: U256,
    ) -> Result<Bytes, CallError> {
        self.dispatched.write().unwrap().push(DispatchRecord {
            target,
            payload: payload.clone(),
            value,
        });

        let mut state = self.state.write().unwrap();
        match state.targets.get(&target).cloned() {
            Some(TargetScript::Fail { output }) => Err(CallError::Reverted { output }),
            Some(TargetScript::Succeed { output }) => {
                Self::move_balance(&mut state, self.engine, target, value)?;
                Ok(output)
            }
            None => {
                Self::move_balance(&mut state, self.engine, target, value)?;
                Ok(Bytes::new())
            }
        }
    }

    async fn transfer_native(
        &self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), CallError> {
        let mut state = self.state.write().unwrap();
        if state.value_rejectors.contains(&to) {
            return Err(CallError::ValueRefused { to });
        }
        Self::move_balance(&mut state, from, to, amount)
    }

    async fn native_balance(&self, account: Address) -> Result<U256, CallError> {
        Ok(self.balance_of(account))
    }
}

#[async_trait]
impl WorldJournal for InMemoryWorld {
    async fn checkpoint(&self) -> Result<CheckpointId, StateError> {
        let id = CheckpointId::generate();
        let snapshot = self.state.read().unwrap().clone();
        self.snapshots.write().unwrap().insert(id, snapshot);
        Ok(id)
    }

    async fn commit(&self, id: CheckpointId) -> Result<(), StateError> {
        self.snapshots
            .write()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(StateError::UnknownCheckpoint(id.0))
    }

    async fn rollback(&self, id: CheckpointId) -> Result<(), StateError> {
        let snapshot = self
            .snapshots
            .write()
            .unwrap()
            .remove(&id)
            .ok_or(StateError::UnknownCheckpoint(id.0))?;
        *self.state.write().unwrap() = snapshot;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
