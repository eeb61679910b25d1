//! Hook context - what every guard module sees for one transaction

use multiguard_core::{AccountView, Address, Transaction, TxHash};

/// Context passed to each module's pre-hook
#[derive(Clone, Copy)]
pub struct TransactionContext<'a> {
    /// Account the transaction runs on
    pub account: &'a dyn AccountView,

    /// Transaction record, bound to the nonce it consumes
    pub transaction: &'a Transaction,

    /// Raw signature bytes, passed through untouched
    pub signatures: &'a [u8],

    /// Identity that triggered execution
    pub executor: &'a Address,
}

impl<'a> TransactionContext<'a> {
    pub fn new(
        account: &'a dyn AccountView,
        transaction: &'a Transaction,
        signatures: &'a [u8],
        executor: &'a Address,
    ) -> Self {
        Self {
            account,
            transaction,
            signatures,
            executor,
        }
    }

    /// Address of the account
    pub fn account_address(&self) -> Address {
        self.account.address()
    }

    /// Canonical hash of the transaction, computed by the account
    pub fn tx_hash(&self) -> TxHash {
        self.account.transaction_hash(self.transaction)
    }
}

impl std::fmt::Debug for TransactionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("account", &self.account.address())
            .field("transaction", self.transaction)
            .field("signatures", &self.signatures.len())
            .field("executor", self.executor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiguard_account::SimulatedAccount;
    use multiguard_core::{hash_transaction, TransactionParams};

    #[test]
    fn test_context_hash_uses_account() {
        let account = SimulatedAccount::with_labels("safe", &["alice"]);
        let tx = TransactionParams::call(Address::from_label("target"), vec![1]).with_nonce(3);
        let executor = Address::from_label("alice");

        let ctx = TransactionContext::new(&account, &tx, &[], &executor);

        assert_eq!(ctx.account_address(), Address::from_label("safe"));
        assert_eq!(ctx.tx_hash(), hash_transaction(&Address::from_label("safe"), &tx));
        assert!(format!("{:?}", ctx).contains("TransactionContext"));
    }
}
