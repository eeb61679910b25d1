//! MultiGuard Core - shared types for the guard dispatcher and its modules
//!
//! # Key Types
//! - `Address` / `TxHash`: fixed-size identities and transaction fingerprints
//! - `Transaction`: the record every guard hook evaluates
//! - `AccountView`: read-only handle on the enclosing account
//! - `TransactionGuard`: the contract the account engine calls around execution
//! - `GuardError`: failure taxonomy shared by every hook
//! - `GuardEvent` / `EventSink`: audit trail of state transitions

pub mod account;
pub mod address;
pub mod calldata;
pub mod clock;
pub mod error;
pub mod event;
pub mod transaction;

pub use account::{AccountView, StorageSlot, TransactionGuard};
pub use address::{Address, TxHash};
pub use calldata::{decode_address_call, encode_address_call, Selector};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorKind, GuardError, GuardResult, ParseIdError};
pub use event::{EventSink, GuardEvent, MemorySink, TracingSink};
pub use transaction::{hash_transaction, Operation, Transaction, TransactionParams};
