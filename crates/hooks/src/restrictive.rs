//! Restrictive Guard - static transaction restrictions
//!
//! Rejects delegate calls, any gas refund pricing, and execution by anyone
//! who is not an owner of the account.

use multiguard_core::{Address, GuardError, GuardResult, Operation};

use crate::context::TransactionContext;
use crate::traits::GuardModule;

/// Reason code: delegate calls are not allowed
pub const DELEGATE_CALL_RESTRICTED: &str = "DELEGATE_CALL_RESTRICTED";
/// Reason code: gas price must be zero
pub const GAS_PRICE_RESTRICTED: &str = "GAS_PRICE_RESTRICTED";
/// Reason code: executor must be an owner
pub const EXECUTOR_NOT_OWNER: &str = "EXECUTOR_NOT_OWNER";

/// Stateless restriction policy
pub struct RestrictiveGuard {
    address: Address,
}

impl RestrictiveGuard {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    fn reject(&self, reason: &str, code: &str) -> GuardError {
        GuardError::rejected(self.name(), reason, code)
    }
}

impl GuardModule for RestrictiveGuard {
    fn name(&self) -> &str {
        "restrictive_guard"
    }

    fn address(&self) -> Address {
        self.address
    }

    fn check_transaction(&self, ctx: &TransactionContext<'_>) -> GuardResult<()> {
        let params = &ctx.transaction.params;

        if params.operation == Operation::DelegateCall {
            return Err(self.reject("delegate calls are restricted", DELEGATE_CALL_RESTRICTED));
        }

        if params.gas_price != 0 {
            return Err(self.reject(
                &format!("gas price {} must be zero", params.gas_price),
                GAS_PRICE_RESTRICTED,
            ));
        }

        if !ctx.account.is_owner(ctx.executor) {
            return Err(self.reject(
                &format!("executor {} is not an owner", ctx.executor),
                EXECUTOR_NOT_OWNER,
            ));
        }

        Ok(())
    }
}
