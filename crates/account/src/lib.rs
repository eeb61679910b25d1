//! MultiGuard Account - reference execution engine
//!
//! Stands in for the enclosing multi-owner account: it owns the nonce, the
//! owner set and raw storage (including the active guard slot), computes
//! canonical transaction hashes, and invokes the active guard's pre- and
//! post-hooks around every transaction it applies.
//!
//! A transaction either lands whole or not at all: when a hook aborts, the
//! nonce and guard slot are restored and the called target's staged effect
//! is dropped.

mod engine;

pub use engine::{
    encode_set_guard, set_guard_selector, CallEffect, CallHandler, ExecutionOutcome,
    SimulatedAccount,
};
