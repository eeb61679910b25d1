//! Audit events emitted on every guard state transition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

use crate::address::{Address, TxHash};

/// A guard state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuardEvent {
    /// Module added to an account's guard set
    GuardAdded { account: Address, guard: Address },

    /// Removal timer started (or restarted)
    GuardRemovalInitiated {
        account: Address,
        guard: Address,
        remove_at: DateTime<Utc>,
    },

    /// Module removed after its delay
    GuardRemoved { account: Address, guard: Address },

    /// Uninstall timer started (or restarted)
    UninstallInitiated {
        account: Address,
        uninstall_at: DateTime<Utc>,
    },

    /// Uninstall latch consumed
    UninstallCompleted { account: Address },

    /// Timelock accepted a transaction for later execution
    TransactionScheduled {
        account: Address,
        tx_hash: TxHash,
        eligible_at: DateTime<Utc>,
    },

    /// Scheduled transaction consumed by the pre-hook
    TransactionExecuted { account: Address, tx_hash: TxHash },

    /// Scheduled transaction cancelled
    TransactionCancelled {
        account: Address,
        tx_hash: TxHash,
        cancellor: Address,
    },

    /// Timelock delay reconfigured
    DelayChanged { account: Address, delay_secs: u64 },

    /// Timelock cancellor reconfigured
    CancellorChanged {
        account: Address,
        cancellor: Option<Address>,
    },

    /// Timelock state dropped on removal
    TimelockPurged { account: Address, dropped: usize },
}

impl GuardEvent {
    /// Account the event belongs to
    pub fn account(&self) -> &Address {
        match self {
            GuardEvent::GuardAdded { account, .. }
            | GuardEvent::GuardRemovalInitiated { account, .. }
            | GuardEvent::GuardRemoved { account, .. }
            | GuardEvent::UninstallInitiated { account, .. }
            | GuardEvent::UninstallCompleted { account }
            | GuardEvent::TransactionScheduled { account, .. }
            | GuardEvent::TransactionExecuted { account, .. }
            | GuardEvent::TransactionCancelled { account, .. }
            | GuardEvent::DelayChanged { account, .. }
            | GuardEvent::CancellorChanged { account, .. }
            | GuardEvent::TimelockPurged { account, .. } => account,
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            GuardEvent::GuardAdded { .. } => "guard_added",
            GuardEvent::GuardRemovalInitiated { .. } => "guard_removal_initiated",
            GuardEvent::GuardRemoved { .. } => "guard_removed",
            GuardEvent::UninstallInitiated { .. } => "uninstall_initiated",
            GuardEvent::UninstallCompleted { .. } => "uninstall_completed",
            GuardEvent::TransactionScheduled { .. } => "transaction_scheduled",
            GuardEvent::TransactionExecuted { .. } => "transaction_executed",
            GuardEvent::TransactionCancelled { .. } => "transaction_cancelled",
            GuardEvent::DelayChanged { .. } => "delay_changed",
            GuardEvent::CancellorChanged { .. } => "cancellor_changed",
            GuardEvent::TimelockPurged { .. } => "timelock_purged",
        }
    }
}

/// Destination for guard events
///
/// Emission never fails the transition that produced the event.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: GuardEvent);
}

/// Writes each event as a structured `tracing` record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: GuardEvent) {
        tracing::info!(
            event = event.name(),
            account = %event.account(),
            detail = ?event,
            "Guard event"
        );
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<GuardEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far
    pub fn events(&self) -> Vec<GuardEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of emitted events, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(GuardEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: GuardEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
