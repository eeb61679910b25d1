//! Transaction record passed through the guard hooks
//!
//! `TransactionParams` is what the account engine hands to the dispatcher;
//! `Transaction` adds the nonce the transaction is bound to. The canonical
//! hash covers every field, nonce included.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum_macros::{Display, EnumString};

use crate::address::{Address, TxHash};

/// Domain tag mixed into every transaction hash
const TX_HASH_DOMAIN: &[u8] = b"multiguard.transaction.v1";

/// How the account performs the call
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Regular message call
    #[default]
    Call,
    /// Code of the target runs in the account's own context
    DelegateCall,
}

impl Operation {
    fn as_byte(&self) -> u8 {
        match self {
            Operation::Call => 0,
            Operation::DelegateCall => 1,
        }
    }
}

/// Transaction fields as proposed to the account, without the nonce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionParams {
    /// Call target
    pub to: Address,

    /// Native value transferred with the call
    pub value: u128,

    /// Call data
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,

    /// Call or delegate call
    pub operation: Operation,

    /// Gas reserved for the inner call
    pub safe_tx_gas: u64,

    /// Gas charged independently of the inner call
    pub base_gas: u64,

    /// Gas price used for the refund (0 = no refund)
    pub gas_price: u128,

    /// Token used for the refund (zero = native)
    pub gas_token: Address,

    /// Receiver of the refund (zero = executor)
    pub refund_receiver: Address,
}

impl TransactionParams {
    /// Plain call with no value and no refund
    pub fn call(to: Address, data: impl Into<Vec<u8>>) -> Self {
        Self {
            to,
            value: 0,
            data: data.into(),
            operation: Operation::Call,
            safe_tx_gas: 0,
            base_gas: 0,
            gas_price: 0,
            gas_token: Address::ZERO,
            refund_receiver: Address::ZERO,
        }
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn with_refund(mut self, gas_token: Address, refund_receiver: Address) -> Self {
        self.gas_token = gas_token;
        self.refund_receiver = refund_receiver;
        self
    }

    /// Bind these parameters to a nonce
    pub fn with_nonce(self, nonce: u64) -> Transaction {
        Transaction {
            params: self,
            nonce,
        }
    }
}

/// A fully specified transaction: parameters plus nonce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub params: TransactionParams,
    pub nonce: u64,
}

impl Transaction {
    pub fn to(&self) -> &Address {
        &self.params.to
    }

    pub fn data(&self) -> &[u8] {
        &self.params.data
    }

    pub fn operation(&self) -> Operation {
        self.params.operation
    }
}

/// Canonical SHA-256 fingerprint of a transaction for a given account.
///
/// Variable-length data is length-prefixed so distinct field splits never
/// collide.
pub fn hash_transaction(account: &Address, tx: &Transaction) -> TxHash {
    let p = &tx.params;
    let mut hasher = Sha256::new();

    hasher.update(TX_HASH_DOMAIN);
    hasher.update(account.as_bytes());
    hasher.update(p.to.as_bytes());
    hasher.update(p.value.to_le_bytes());
    hasher.update((p.data.len() as u64).to_le_bytes());
    hasher.update(&p.data);
    hasher.update([p.operation.as_byte()]);
    hasher.update(p.safe_tx_gas.to_le_bytes());
    hasher.update(p.base_gas.to_le_bytes());
    hasher.update(p.gas_price.to_le_bytes());
    hasher.update(p.gas_token.as_bytes());
    hasher.update(p.refund_receiver.as_bytes());
    hasher.update(tx.nonce.to_le_bytes());

    TxHash::from_slice(&hasher.finalize())
}
