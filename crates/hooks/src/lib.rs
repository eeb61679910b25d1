//! MultiGuard Hooks - guard modules behind a single dispatcher
//!
//! An account has one active guard slot. Installing the [`GuardRegistry`]
//! there lets the account run any number of guard modules:
//!
//! ```text
//! Account executes transaction
//!     │  nonce consumed
//!     ▼
//! ┌─────────────────────────────┐
//! │ PRE-HOOK: check all modules │ ← first rejection aborts
//! │ then commit all modules     │
//! └─────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────┐
//! │ CALL                        │
//! └─────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────┐
//! │ POST-HOOK: uninstall latch  │ ← only if no longer installed
//! │ then every module           │ ← FailClosed / FailOpen
//! └─────────────────────────────┘
//! ```
//!
//! Guards are added immediately but removed only after a delay, as is the
//! registry itself.

pub mod config;
pub mod context;
pub mod registry;
pub mod restrictive;
pub mod traits;

pub use config::{FailPolicy, RegistryConfig, MAX_DELAY_SECS};
pub use context::TransactionContext;
pub use registry::{GuardRegistry, ModuleFailure, PendingRemoval, PostHookReport, RegistrySnapshot};
pub use restrictive::RestrictiveGuard;
pub use traits::{GuardModule, NoOpGuard};
