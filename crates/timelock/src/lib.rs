//! MultiGuard Timelock - delayed execution guard module
//!
//! Owners schedule a transaction ahead of time; the account can only execute
//! it once the account's configured delay has passed, and only once. A
//! cancellor chosen by the account can cancel pending transactions.

pub mod call;
pub mod config;
pub mod guard;

pub use call::{encode_set_cancellor, set_cancellor_selector, TimelockCall};
pub use config::{ScheduledTransaction, TimelockConfig, TimelockSettings};
pub use guard::{TimelockGuard, TimelockSnapshot};
