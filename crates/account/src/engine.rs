//! In-memory multi-owner account that runs its active guard around every
//! transaction
//!
//! ```text
//! execute(params)
//!     │  nonce += 1
//!     ▼
//! ┌─────────────────────────────┐
//! │ guard.check_transaction     │ ← error: restore, return Err
//! └─────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────┐
//! │ apply call                  │ ← setGuard on self; targets stage an effect
//! └─────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────┐
//! │ guard.check_after_execution │ ← same guard read before the call
//! └─────────────────────────────┘
//!     │
//!     ▼
//!   target effect applied        ← dropped if any hook failed
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use multiguard_core::{
    decode_address_call, encode_address_call, AccountView, Address, GuardResult, Selector,
    StorageSlot, Transaction, TransactionGuard, TransactionParams, TxHash,
};
use serde::{Deserialize, Serialize};

/// State change of an accepted target call, applied once the transaction is kept
pub type CallEffect = Box<dyn FnOnce() + Send>;

/// Handler for calls to an external target: `(caller, data)`.
///
/// `None` fails the inner call. `Some` carries the effect to apply if every
/// hook passes; a reverted transaction drops it unapplied.
pub type CallHandler = Arc<dyn Fn(&Address, &[u8]) -> Option<CallEffect> + Send + Sync>;

/// Selector of the account's own `setGuard(address)` entry point
pub fn set_guard_selector() -> Selector {
    Selector::of("setGuard(address)")
}

/// Call data for `setGuard(guard)`; the zero address clears the guard
pub fn encode_set_guard(guard: &Address) -> Vec<u8> {
    encode_address_call(set_guard_selector(), guard)
}

/// Result of an applied transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub tx_hash: TxHash,
    pub nonce: u64,
    /// Whether the inner call succeeded (the nonce is consumed either way)
    pub success: bool,
}

/// State restored when a hook aborts the transaction
struct Checkpoint {
    nonce: u64,
    guard_slot: Option<Vec<u8>>,
    guard: Option<Arc<dyn TransactionGuard>>,
}

/// Reference account engine
pub struct SimulatedAccount {
    address: Address,
    owners: Vec<Address>,
    nonce: u64,
    storage: HashMap<StorageSlot, Vec<u8>>,
    guard: Option<Arc<dyn TransactionGuard>>,
    /// Guards `setGuard` may point at, by address
    known_guards: HashMap<Address, Arc<dyn TransactionGuard>>,
    targets: HashMap<Address, CallHandler>,
    history: Vec<ExecutionOutcome>,
}

impl SimulatedAccount {
    pub fn new(address: Address, owners: Vec<Address>) -> Self {
        Self {
            address,
            owners,
            nonce: 0,
            storage: HashMap::new(),
            guard: None,
            known_guards: HashMap::new(),
            targets: HashMap::new(),
            history: Vec::new(),
        }
    }

    /// Account with identity and owners derived from labels
    pub fn with_labels(label: &str, owners: &[&str]) -> Self {
        Self::new(
            Address::from_label(label),
            owners.iter().map(|o| Address::from_label(o)).collect(),
        )
    }

    /// Install or clear the active guard directly (setup path, no hooks run)
    pub fn set_guard(&mut self, guard: Option<Arc<dyn TransactionGuard>>) {
        match guard {
            Some(guard) => {
                self.known_guards.insert(guard.address(), guard.clone());
                self.install(guard);
            }
            None => self.clear_guard(),
        }
    }

    /// Make a guard reachable through a `setGuard` transaction
    pub fn register_guard(&mut self, guard: Arc<dyn TransactionGuard>) {
        self.known_guards.insert(guard.address(), guard);
    }

    /// Route calls to `target` through `handler`
    pub fn register_target(&mut self, target: Address, handler: CallHandler) {
        self.targets.insert(target, handler);
    }

    /// Bind parameters to the nonce the next execution will use
    pub fn next_transaction(&self, params: TransactionParams) -> Transaction {
        params.with_nonce(self.nonce)
    }

    /// Applied transactions, oldest first
    pub fn history(&self) -> &[ExecutionOutcome] {
        &self.history
    }

    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    /// Run a transaction through the active guard.
    ///
    /// A hook error restores the nonce and guard slot, drops the target
    /// call's staged effect, and is returned as is.
    pub fn execute(
        &mut self,
        params: TransactionParams,
        signatures: &[u8],
        executor: &Address,
    ) -> GuardResult<ExecutionOutcome> {
        let tx = params.clone().with_nonce(self.nonce);
        let tx_hash = self.transaction_hash(&tx);
        let checkpoint = self.checkpoint();

        self.nonce += 1;
        let guard = self.guard.clone();

        if let Some(guard) = &guard {
            if let Err(e) = guard.check_transaction(&*self, &params, signatures, executor) {
                tracing::warn!(
                    account = %self.address,
                    tx_hash = %tx_hash,
                    error = %e,
                    "Guard rejected transaction"
                );
                self.restore(checkpoint);
                return Err(e);
            }
        }

        let (success, effect) = self.apply_call(&tx);

        if let Some(guard) = &guard {
            if let Err(e) = guard.check_after_execution(&*self, &tx_hash, success) {
                tracing::warn!(
                    account = %self.address,
                    tx_hash = %tx_hash,
                    error = %e,
                    "Guard post-hook failed, reverting"
                );
                self.restore(checkpoint);
                return Err(e);
            }
        }

        if let Some(effect) = effect {
            effect();
        }

        tracing::debug!(
            account = %self.address,
            tx_hash = %tx_hash,
            nonce = tx.nonce,
            success,
            "Transaction applied"
        );

        let outcome = ExecutionOutcome {
            tx_hash,
            nonce: tx.nonce,
            success,
        };
        self.history.push(outcome.clone());
        Ok(outcome)
    }

    fn install(&mut self, guard: Arc<dyn TransactionGuard>) {
        self.storage
            .insert(StorageSlot::guard(), guard.address().as_bytes().to_vec());
        self.guard = Some(guard);
    }

    fn clear_guard(&mut self) {
        self.storage.remove(&StorageSlot::guard());
        self.guard = None;
    }

    fn apply_call(&mut self, tx: &Transaction) -> (bool, Option<CallEffect>) {
        let to = *tx.to();
        if to == self.address {
            return (self.apply_self_call(tx.data()), None);
        }
        match self.targets.get(&to) {
            Some(handler) => match handler(&self.address, tx.data()) {
                Some(effect) => (true, Some(effect)),
                None => (false, None),
            },
            // Plain transfer to an unknown target
            None => (true, None),
        }
    }

    fn apply_self_call(&mut self, data: &[u8]) -> bool {
        match decode_address_call(set_guard_selector(), data) {
            Some(guard) if guard.is_zero() => {
                self.clear_guard();
                true
            }
            Some(guard) => match self.known_guards.get(&guard).cloned() {
                Some(guard) => {
                    self.install(guard);
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            nonce: self.nonce,
            guard_slot: self.storage.get(&StorageSlot::guard()).cloned(),
            guard: self.guard.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.nonce = checkpoint.nonce;
        match checkpoint.guard_slot {
            Some(slot) => {
                self.storage.insert(StorageSlot::guard(), slot);
            }
            None => {
                self.storage.remove(&StorageSlot::guard());
            }
        }
        self.guard = checkpoint.guard;
    }
}

impl AccountView for SimulatedAccount {
    fn address(&self) -> Address {
        self.address
    }

    fn nonce(&self) -> u64 {
        self.nonce
    }

    fn is_owner(&self, identity: &Address) -> bool {
        self.owners.contains(identity)
    }

    fn read_raw_state(&self, slot: &StorageSlot, length: usize) -> Vec<u8> {
        let mut out = self.storage.get(slot).cloned().unwrap_or_default();
        out.resize(length, 0);
        out
    }
}

impl fmt::Debug for SimulatedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedAccount")
            .field("address", &self.address)
            .field("owners", &self.owners)
            .field("nonce", &self.nonce)
            .field("guard", &self.guard.as_ref().map(|g| g.address()))
            .finish()
    }
}
