//! Narrow view of the enclosing account and the dispatcher contract it calls
//!
//! The account (its execution engine, owner set and storage) is owned by the
//! host. Guards only ever see it through [`AccountView`]; the host only ever
//! talks to its active dispatcher through [`TransactionGuard`].

use sha2::{Digest, Sha256};
use std::fmt;

use crate::address::{Address, TxHash};
use crate::error::GuardResult;
use crate::transaction::{hash_transaction, Transaction, TransactionParams};

/// Label hashed to obtain the slot holding the active guard address
const GUARD_SLOT_LABEL: &str = "guard_manager.guard.address";

/// 32-byte key into an account's raw storage
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageSlot([u8; 32]);

impl StorageSlot {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Slot derived from a label
    pub fn from_label(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    /// Well-known slot where the account stores its active guard address
    pub fn guard() -> Self {
        Self::from_label(GUARD_SLOT_LABEL)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for StorageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageSlot(0x{})", hex::encode(self.0))
    }
}

/// Read-only handle on the account a guard is evaluating
pub trait AccountView {
    /// The account's own identity
    fn address(&self) -> Address;

    /// Current nonce. When a pre-hook runs the engine has already
    /// incremented it for the pending transaction.
    fn nonce(&self) -> u64;

    /// Owner-set membership
    fn is_owner(&self, identity: &Address) -> bool;

    /// Raw storage read of `length` bytes at `slot` (zero-filled if unset)
    fn read_raw_state(&self, slot: &StorageSlot, length: usize) -> Vec<u8>;

    /// Canonical transaction fingerprint
    fn transaction_hash(&self, tx: &Transaction) -> TxHash {
        hash_transaction(&self.address(), tx)
    }

    /// Address currently stored in the guard slot (zero if none)
    fn active_guard(&self) -> Address {
        Address::from_slice(&self.read_raw_state(&StorageSlot::guard(), Address::LEN))
    }
}

/// Dispatcher contract the account engine invokes around every transaction
pub trait TransactionGuard: Send + Sync {
    /// Identity stored in the account's guard slot
    fn address(&self) -> Address;

    /// Pre-hook: called before the transaction is applied
    fn check_transaction(
        &self,
        account: &dyn AccountView,
        params: &TransactionParams,
        signatures: &[u8],
        executor: &Address,
    ) -> GuardResult<()>;

    /// Post-hook: called after the transaction ran
    fn check_after_execution(
        &self,
        account: &dyn AccountView,
        tx_hash: &TxHash,
        success: bool,
    ) -> GuardResult<()>;
}
