//! Guard module trait - the capability every policy module implements

use multiguard_core::{Address, GuardResult, TxHash};

use crate::context::TransactionContext;

/// A policy module the registry fans transactions out to
///
/// Validation and state changes are split so a transaction's effects on
/// modules are all-or-nothing: `check_transaction` validates without side
/// effects, and `commit_transaction` applies the module's state transition.
/// The registry commits only after every module accepted the pre-hook and
/// the post-hook fan-out succeeded, so a reverted transaction leaves no
/// module state behind.
pub trait GuardModule: Send + Sync {
    /// Module name for logging/debugging
    fn name(&self) -> &str;

    /// Module identity, unique within a registry
    fn address(&self) -> Address;

    /// Validate a transaction before it is applied. Must not mutate state.
    fn check_transaction(&self, ctx: &TransactionContext<'_>) -> GuardResult<()>;

    /// Apply the transition accepted by `check_transaction` for the
    /// transaction with hash `tx_hash`, now that it is kept
    fn commit_transaction(&self, _account: &Address, _tx_hash: &TxHash) {}

    /// Called after the transaction ran
    fn check_after_execution(
        &self,
        _account: &Address,
        _tx_hash: &TxHash,
        _success: bool,
    ) -> GuardResult<()> {
        Ok(())
    }

    /// Called once the registry has removed this module from `account`
    fn on_remove(&self, _account: &Address) {}
}

/// A module that accepts everything (for testing)
pub struct NoOpGuard {
    address: Address,
}

impl NoOpGuard {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

impl GuardModule for NoOpGuard {
    fn name(&self) -> &str {
        "noop_guard"
    }

    fn address(&self) -> Address {
        self.address
    }

    fn check_transaction(&self, _ctx: &TransactionContext<'_>) -> GuardResult<()> {
        Ok(())
    }
}
