//! Timelock Guard - every transaction must be scheduled and wait out a delay
//!
//! ```text
//! UNSCHEDULED ──schedule──▶ SCHEDULED ──pre-hook, now >= eligible_at──▶ EXECUTED
//!      ▲                        │
//!      └────────cancel──────────┘
//! ```
//!
//! The delay is captured when a transaction is scheduled; later
//! configuration changes never move an existing `eligible_at`. A direct
//! `setCancellor` call to this module always passes the pre-hook so an
//! account can recover from a lost cancellor.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde::{Deserialize, Serialize};

use multiguard_core::{
    AccountView, Address, Clock, EventSink, GuardError, GuardEvent, GuardResult, Operation,
    SystemClock, TracingSink, Transaction, TxHash,
};
use multiguard_hooks::{GuardModule, GuardRegistry, TransactionContext, MAX_DELAY_SECS};

use crate::call::TimelockCall;
use crate::config::{ScheduledTransaction, TimelockConfig, TimelockSettings};

/// Timelock state of one account
#[derive(Default)]
struct AccountTimelock {
    config: TimelockConfig,
    /// Scheduling order
    scheduled: Vec<TxHash>,
    tx_data: HashMap<TxHash, ScheduledTransaction>,
}

impl AccountTimelock {
    fn take(&mut self, tx_hash: &TxHash) -> Option<ScheduledTransaction> {
        let entry = self.tx_data.remove(tx_hash)?;
        self.scheduled.retain(|h| h != tx_hash);
        Some(entry)
    }
}

/// Inspectable timelock state of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockSnapshot {
    pub account: Address,
    pub config: TimelockConfig,
    pub scheduled: Vec<ScheduledTransaction>,
}

/// Time-delayed execution policy
pub struct TimelockGuard {
    address: Address,
    /// Registry consulted for installation checks
    registry: Weak<GuardRegistry>,
    settings: TimelockSettings,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    accounts: RwLock<HashMap<Address, AccountTimelock>>,
}

impl TimelockGuard {
    pub fn new(address: Address, registry: &Arc<GuardRegistry>) -> Self {
        Self {
            address,
            registry: Arc::downgrade(registry),
            settings: TimelockSettings::default(),
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingSink),
            accounts: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_settings(mut self, settings: TimelockSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Set the calling account's delay. Applies to transactions scheduled
    /// from now on.
    pub fn set_delay(&self, caller: &Address, delay: std::time::Duration) -> GuardResult<()> {
        self.ensure_installed(caller)?;
        if delay.subsec_nanos() != 0 {
            return Err(GuardError::Config(
                "delay must be a whole number of seconds".to_string(),
            ));
        }
        let delay_secs = delay.as_secs();
        if delay_secs > MAX_DELAY_SECS {
            return Err(GuardError::Config(format!(
                "delay {}s exceeds {}s",
                delay_secs, MAX_DELAY_SECS
            )));
        }

        self.write().entry(*caller).or_default().config.delay_secs = delay_secs;

        tracing::info!(account = %caller, delay_secs, "Timelock delay changed");
        self.events.emit(GuardEvent::DelayChanged {
            account: *caller,
            delay_secs,
        });
        Ok(())
    }

    /// Set or clear the calling account's cancellor
    pub fn set_cancellor(&self, caller: &Address, cancellor: Option<Address>) -> GuardResult<()> {
        self.ensure_installed(caller)?;
        let cancellor = cancellor.filter(|c| !c.is_zero());

        self.write().entry(*caller).or_default().config.cancellor = cancellor;

        tracing::info!(account = %caller, cancellor = ?cancellor, "Timelock cancellor changed");
        self.events.emit(GuardEvent::CancellorChanged {
            account: *caller,
            cancellor,
        });
        Ok(())
    }

    /// Schedule a transaction for `account`; `caller` must be an owner.
    ///
    /// The transaction carries its own nonce. Returns its canonical hash.
    pub fn schedule(
        &self,
        caller: &Address,
        account: &dyn AccountView,
        transaction: Transaction,
    ) -> GuardResult<TxHash> {
        let addr = account.address();
        self.ensure_installed(&addr)?;
        if !account.is_owner(caller) {
            return Err(GuardError::NotOwner {
                account: addr,
                caller: *caller,
            });
        }

        let tx_hash = account.transaction_hash(&transaction);
        let now = self.clock.now();

        let eligible_at = {
            let mut accounts = self.write();
            let state = accounts.entry(addr).or_default();

            if state.tx_data.contains_key(&tx_hash) {
                return Err(GuardError::AlreadyScheduled(tx_hash));
            }
            let limit = self.settings.max_scheduled_per_account;
            if state.scheduled.len() >= limit {
                return Err(GuardError::CapacityExceeded {
                    what: "scheduled transactions",
                    limit,
                });
            }

            let eligible_at = now
                .checked_add_signed(state.config.delay())
                .ok_or_else(|| GuardError::Config("delay overflows the clock".to_string()))?;
            state.scheduled.push(tx_hash);
            state.tx_data.insert(
                tx_hash,
                ScheduledTransaction {
                    tx_hash,
                    transaction,
                    scheduled_at: now,
                    eligible_at,
                },
            );
            eligible_at
        };

        tracing::info!(
            account = %addr,
            tx_hash = %tx_hash,
            eligible_at = %eligible_at,
            "Transaction scheduled"
        );
        self.events.emit(GuardEvent::TransactionScheduled {
            account: addr,
            tx_hash,
            eligible_at,
        });
        Ok(tx_hash)
    }

    /// Cancel a scheduled transaction; `caller` must be the account's cancellor
    pub fn cancel(&self, caller: &Address, account: &Address, tx_hash: &TxHash) -> GuardResult<()> {
        {
            let mut accounts = self.write();
            let state = accounts.get_mut(account);

            let cancellor = state.as_ref().and_then(|s| s.config.cancellor);
            if cancellor != Some(*caller) {
                return Err(GuardError::NotCancellor {
                    account: *account,
                    caller: *caller,
                });
            }

            state
                .and_then(|s| s.take(tx_hash))
                .ok_or(GuardError::NotScheduled(*tx_hash))?;
        }

        tracing::info!(account = %account, tx_hash = %tx_hash, cancellor = %caller, "Transaction cancelled");
        self.events.emit(GuardEvent::TransactionCancelled {
            account: *account,
            tx_hash: *tx_hash,
            cancellor: *caller,
        });
        Ok(())
    }

    /// Validate an account's call to this module without applying it
    pub fn prepare(&self, caller: &Address, data: &[u8]) -> GuardResult<TimelockCall> {
        let call = TimelockCall::decode(data).ok_or_else(|| {
            GuardError::rejected(self.name(), "unknown timelock entry point", "UNKNOWN_CALL")
        })?;
        self.ensure_installed(caller)?;
        Ok(call)
    }

    /// Apply a call accepted by [`TimelockGuard::prepare`]
    pub fn apply(&self, caller: &Address, call: TimelockCall) -> GuardResult<()> {
        match call {
            TimelockCall::SetCancellor(cancellor) => self.set_cancellor(caller, cancellor),
        }
    }

    /// Validate and apply an account's call to this module
    pub fn dispatch(&self, caller: &Address, data: &[u8]) -> GuardResult<()> {
        let call = self.prepare(caller, data)?;
        self.apply(caller, call)
    }

    /// Scheduled transactions of an account, in scheduling order
    pub fn get_transactions(&self, account: &Address) -> Vec<ScheduledTransaction> {
        self.read()
            .get(account)
            .map(|s| {
                s.scheduled
                    .iter()
                    .filter_map(|h| s.tx_data.get(h).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Current configuration of an account
    pub fn config(&self, account: &Address) -> TimelockConfig {
        self.read()
            .get(account)
            .map(|s| s.config)
            .unwrap_or_default()
    }

    pub fn snapshot(&self, account: &Address) -> TimelockSnapshot {
        TimelockSnapshot {
            account: *account,
            config: self.config(account),
            scheduled: self.get_transactions(account),
        }
    }

    /// A direct `setCancellor` call to this module
    fn is_cancellor_update(&self, tx: &Transaction) -> bool {
        *tx.to() == self.address
            && tx.operation() == Operation::Call
            && TimelockCall::decode(tx.data()).is_some()
    }

    fn ensure_installed(&self, account: &Address) -> GuardResult<()> {
        let installed = self
            .registry
            .upgrade()
            .is_some_and(|r| r.contains_guard(account, &self.address));
        if !installed {
            return Err(GuardError::NotInstalled(*account));
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Address, AccountTimelock>> {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Address, AccountTimelock>> {
        self.accounts.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GuardModule for TimelockGuard {
    fn name(&self) -> &str {
        "timelock_guard"
    }

    fn address(&self) -> Address {
        self.address
    }

    fn check_transaction(&self, ctx: &TransactionContext<'_>) -> GuardResult<()> {
        if self.is_cancellor_update(ctx.transaction) {
            tracing::debug!(account = %ctx.account_address(), "setCancellor bypasses timelock");
            return Ok(());
        }

        let account = ctx.account_address();
        let tx_hash = ctx.tx_hash();
        let eligible_at = self
            .read()
            .get(&account)
            .and_then(|s| s.tx_data.get(&tx_hash))
            .map(|entry| entry.eligible_at)
            .ok_or(GuardError::NotScheduled(tx_hash))?;

        if self.clock.now() < eligible_at {
            return Err(GuardError::DelayNotElapsed {
                ready_at: Some(eligible_at),
            });
        }
        Ok(())
    }

    /// Consume the entry of an executed transaction. Bypassed
    /// `setCancellor` calls were never scheduled and consume nothing.
    fn commit_transaction(&self, account: &Address, tx_hash: &TxHash) {
        let consumed = self
            .write()
            .get_mut(account)
            .and_then(|s| s.take(tx_hash))
            .is_some();

        if consumed {
            tracing::info!(account = %account, tx_hash = %tx_hash, "Scheduled transaction executed");
            self.events.emit(GuardEvent::TransactionExecuted {
                account: *account,
                tx_hash: *tx_hash,
            });
        }
    }

    fn on_remove(&self, account: &Address) {
        let dropped = self
            .write()
            .remove(account)
            .map(|s| s.scheduled.len())
            .unwrap_or(0);

        tracing::info!(account = %account, dropped, "Timelock state purged");
        self.events.emit(GuardEvent::TimelockPurged {
            account: *account,
            dropped,
        });
    }
}
