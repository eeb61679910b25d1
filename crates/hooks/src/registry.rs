//! Guard Registry - per-account guard sets with delayed removal
//!
//! The registry is the single dispatcher an account installs. It fans every
//! pre- and post-hook out to the account's guard modules in insertion order.
//!
//! Adding a guard takes effect immediately. Removing a guard, and completing
//! an uninstall of the registry itself, only succeed once the configured
//! removal delay has passed since they were initiated, so a single batch of
//! operations cannot both disable a guard and exploit its absence.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use multiguard_core::{
    AccountView, Address, Clock, EventSink, GuardError, GuardEvent, GuardResult, SystemClock,
    TracingSink, TransactionGuard, TransactionParams, TxHash,
};

use crate::config::{FailPolicy, RegistryConfig};
use crate::context::TransactionContext;
use crate::traits::GuardModule;

/// Guard state of one account
#[derive(Default)]
struct AccountGuards {
    /// Installed modules, in insertion order
    guards: Vec<Arc<dyn GuardModule>>,
    /// Pending removals: guard -> earliest completion
    remove_at: HashMap<Address, DateTime<Utc>>,
    /// Pending uninstall: earliest completion
    uninstall_at: Option<DateTime<Utc>>,
    /// Transaction accepted by the last pre-hook, awaiting its post-hook
    staged: Option<StagedCommit>,
}

/// Modules that accepted a transaction, committed once it is kept
struct StagedCommit {
    tx_hash: TxHash,
    modules: Vec<Arc<dyn GuardModule>>,
}

impl AccountGuards {
    fn position(&self, guard: &Address) -> Option<usize> {
        self.guards.iter().position(|g| g.address() == *guard)
    }
}

/// A post-hook failure tolerated under [`FailPolicy::FailOpen`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFailure {
    pub guard: Address,
    pub name: String,
    pub error: GuardError,
}

/// Outcome of a post-hook fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostHookReport {
    /// The uninstall latch was consumed by this call
    pub uninstall_completed: bool,
    /// Module failures that were logged and skipped
    pub failures: Vec<ModuleFailure>,
}

/// A pending guard removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRemoval {
    pub guard: Address,
    pub remove_at: DateTime<Utc>,
}

/// Inspectable registry state of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub account: Address,
    pub guards: Vec<Address>,
    pub pending_removals: Vec<PendingRemoval>,
    pub uninstall_at: Option<DateTime<Utc>>,
}

/// Multi-guard dispatcher
pub struct GuardRegistry {
    /// Identity stored in an account's guard slot when installed
    address: Address,
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    accounts: RwLock<HashMap<Address, AccountGuards>>,
}

impl GuardRegistry {
    /// Create a registry with default config, system clock and tracing events
    pub fn new(address: Address) -> Self {
        Self {
            address,
            config: RegistryConfig::default(),
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingSink),
            accounts: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
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

    /// Set the post-hook fail policy
    pub fn with_fail_policy(mut self, policy: FailPolicy) -> Self {
        self.config.post_hook_policy = policy;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Whether the account's guard slot points at this registry
    pub fn is_installed(&self, account: &dyn AccountView) -> bool {
        account.active_guard() == self.address
    }

    /// Add a guard to the calling account. Takes effect immediately.
    pub fn add_guard(
        &self,
        account: &dyn AccountView,
        guard: Arc<dyn GuardModule>,
    ) -> GuardResult<()> {
        let addr = self.ensure_installed(account)?;
        let guard_addr = guard.address();

        {
            let mut accounts = self.write();
            let state = accounts.entry(addr).or_default();

            if state.position(&guard_addr).is_some() {
                return Err(GuardError::AlreadyPresent {
                    account: addr,
                    guard: guard_addr,
                });
            }
            if state.guards.len() >= self.config.max_guards {
                return Err(GuardError::CapacityExceeded {
                    what: "guards",
                    limit: self.config.max_guards,
                });
            }
            state.guards.push(guard.clone());
        }

        tracing::info!(account = %addr, guard = %guard_addr, name = guard.name(), "Guard added");
        self.events.emit(GuardEvent::GuardAdded {
            account: addr,
            guard: guard_addr,
        });
        Ok(())
    }

    /// Start (or restart) the removal timer for a guard
    pub fn initiate_guard_removal(
        &self,
        account: &dyn AccountView,
        guard: &Address,
    ) -> GuardResult<DateTime<Utc>> {
        let addr = self.ensure_installed(account)?;
        let remove_at = self.delay_from_now()?;

        {
            let mut accounts = self.write();
            let state = accounts
                .get_mut(&addr)
                .filter(|s| s.position(guard).is_some())
                .ok_or(GuardError::NotPresent {
                    account: addr,
                    guard: *guard,
                })?;
            state.remove_at.insert(*guard, remove_at);
        }

        tracing::info!(account = %addr, guard = %guard, remove_at = %remove_at, "Guard removal initiated");
        self.events.emit(GuardEvent::GuardRemovalInitiated {
            account: addr,
            guard: *guard,
            remove_at,
        });
        Ok(remove_at)
    }

    /// Remove a guard whose removal delay has passed.
    ///
    /// The removed module is notified through [`GuardModule::on_remove`] so it
    /// can drop its per-account state. Never creates account state.
    pub fn remove_guard(&self, account: &Address, guard: &Address) -> GuardResult<()> {
        let now = self.clock.now();

        let removed = {
            let mut accounts = self.write();
            let state = accounts.get_mut(account);

            let ready_at = state.as_ref().and_then(|s| s.remove_at.get(guard).copied());
            match (state, ready_at) {
                (Some(state), Some(at)) if now > at => {
                    let idx = state.position(guard).ok_or(GuardError::NotPresent {
                        account: *account,
                        guard: *guard,
                    })?;
                    state.remove_at.remove(guard);
                    state.guards.remove(idx)
                }
                _ => return Err(GuardError::DelayNotElapsed { ready_at }),
            }
        };

        tracing::info!(account = %account, guard = %guard, name = removed.name(), "Guard removed");
        self.events.emit(GuardEvent::GuardRemoved {
            account: *account,
            guard: *guard,
        });
        removed.on_remove(account);
        Ok(())
    }

    /// Start (or restart) the uninstall timer for the calling account.
    /// Only an account that still has the registry installed can start it.
    pub fn initiate_uninstall(&self, account: &dyn AccountView) -> GuardResult<DateTime<Utc>> {
        let addr = self.ensure_installed(account)?;
        let uninstall_at = self.delay_from_now()?;
        self.write().entry(addr).or_default().uninstall_at = Some(uninstall_at);

        tracing::info!(account = %addr, uninstall_at = %uninstall_at, "Uninstall initiated");
        self.events.emit(GuardEvent::UninstallInitiated {
            account: addr,
            uninstall_at,
        });
        Ok(uninstall_at)
    }

    /// Pre-hook fan-out.
    ///
    /// Every module validates; the first failure aborts. Nothing is applied
    /// here: the accepting modules are staged and committed by the post-hook
    /// once the transaction is known to be kept.
    pub fn check_transaction(
        &self,
        account: &dyn AccountView,
        params: &TransactionParams,
        signatures: &[u8],
        executor: &Address,
    ) -> GuardResult<()> {
        let addr = account.address();
        // The engine has already consumed the nonce for this transaction
        let nonce = account.nonce().checked_sub(1).ok_or_else(|| {
            GuardError::Internal(format!("account {} has not consumed a nonce", addr))
        })?;
        let tx = params.clone().with_nonce(nonce);
        let ctx = TransactionContext::new(account, &tx, signatures, executor);
        let modules = self.modules(&addr);

        for module in &modules {
            if let Err(e) = module.check_transaction(&ctx) {
                tracing::warn!(
                    account = %addr,
                    guard = module.name(),
                    nonce,
                    error = %e,
                    "Guard rejected transaction"
                );
                return Err(e);
            }
            tracing::debug!(account = %addr, guard = module.name(), nonce, "Guard check passed");
        }

        if let Some(state) = self.write().get_mut(&addr) {
            state.staged = Some(StagedCommit {
                tx_hash: ctx.tx_hash(),
                modules,
            });
        }

        Ok(())
    }

    /// Post-hook fan-out.
    ///
    /// If the registry is no longer the account's active guard this call is
    /// only valid as the completion of a matured uninstall, whose latch it
    /// consumes. Modules are then called in order regardless.
    ///
    /// Staged pre-hook transitions are committed only when this returns `Ok`;
    /// an error discards them along with the reverted transaction.
    pub fn check_after_execution(
        &self,
        account: &dyn AccountView,
        tx_hash: &TxHash,
        success: bool,
    ) -> GuardResult<PostHookReport> {
        let addr = account.address();
        let mut report = PostHookReport::default();
        let staged = self
            .write()
            .get_mut(&addr)
            .and_then(|s| s.staged.take())
            .filter(|s| s.tx_hash == *tx_hash);

        if !self.is_installed(account) {
            let now = self.clock.now();
            let ready_at = self.read().get(&addr).and_then(|s| s.uninstall_at);
            match ready_at {
                Some(at) if now > at => report.uninstall_completed = true,
                _ => return Err(GuardError::DelayNotElapsed { ready_at }),
            }
        }

        for module in self.modules(&addr) {
            match module.check_after_execution(&addr, tx_hash, success) {
                Ok(()) => {
                    tracing::debug!(account = %addr, guard = module.name(), "Post-execution check passed");
                }
                Err(e) => {
                    tracing::error!(
                        account = %addr,
                        guard = module.name(),
                        error = %e,
                        "Post-execution check failed"
                    );

                    match self.config.post_hook_policy {
                        FailPolicy::FailClosed => return Err(e),
                        FailPolicy::FailOpen => {
                            tracing::warn!(
                                guard = module.name(),
                                "FailOpen: continuing despite post-hook failure"
                            );
                            report.failures.push(ModuleFailure {
                                guard: module.address(),
                                name: module.name().to_string(),
                                error: e,
                            });
                        }
                    }
                }
            }
        }

        if let Some(staged) = staged {
            for module in &staged.modules {
                module.commit_transaction(&addr, tx_hash);
            }
        }

        // Consume the latch last so an aborted fan-out leaves it armed
        if report.uninstall_completed {
            if let Some(state) = self.write().get_mut(&addr) {
                state.uninstall_at = None;
            }
            tracing::info!(account = %addr, "Uninstall completed");
            self.events
                .emit(GuardEvent::UninstallCompleted { account: addr });
        }

        Ok(report)
    }

    /// Installed guards of an account, in hook order
    pub fn get_guards(&self, account: &Address) -> Vec<Address> {
        self.read()
            .get(account)
            .map(|s| s.guards.iter().map(|g| g.address()).collect())
            .unwrap_or_default()
    }

    /// Whether `guard` is installed for `account`
    pub fn contains_guard(&self, account: &Address, guard: &Address) -> bool {
        self.read()
            .get(account)
            .is_some_and(|s| s.position(guard).is_some())
    }

    /// Earliest completion of a pending guard removal
    pub fn pending_removal(&self, account: &Address, guard: &Address) -> Option<DateTime<Utc>> {
        self.read()
            .get(account)
            .and_then(|s| s.remove_at.get(guard).copied())
    }

    /// Earliest completion of a pending uninstall
    pub fn pending_uninstall(&self, account: &Address) -> Option<DateTime<Utc>> {
        self.read().get(account).and_then(|s| s.uninstall_at)
    }

    /// Serializable view of an account's registry state
    pub fn snapshot(&self, account: &Address) -> RegistrySnapshot {
        let accounts = self.read();
        let state = accounts.get(account);

        let guards: Vec<Address> = state
            .map(|s| s.guards.iter().map(|g| g.address()).collect())
            .unwrap_or_default();
        let pending_removals = state
            .map(|s| {
                guards
                    .iter()
                    .filter_map(|g| {
                        s.remove_at.get(g).map(|at| PendingRemoval {
                            guard: *g,
                            remove_at: *at,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        RegistrySnapshot {
            account: *account,
            guards,
            pending_removals,
            uninstall_at: state.and_then(|s| s.uninstall_at),
        }
    }

    fn ensure_installed(&self, account: &dyn AccountView) -> GuardResult<Address> {
        let addr = account.address();
        if !self.is_installed(account) {
            return Err(GuardError::NotInstalled(addr));
        }
        Ok(addr)
    }

    fn delay_from_now(&self) -> GuardResult<DateTime<Utc>> {
        self.clock
            .now()
            .checked_add_signed(self.config.removal_delay())
            .ok_or_else(|| GuardError::Config("removal delay overflows the clock".to_string()))
    }

    /// Snapshot of an account's modules so hooks run without the lock held
    fn modules(&self, account: &Address) -> Vec<Arc<dyn GuardModule>> {
        self.read()
            .get(account)
            .map(|s| s.guards.clone())
            .unwrap_or_default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Address, AccountGuards>> {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Address, AccountGuards>> {
        self.accounts.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TransactionGuard for GuardRegistry {
    fn address(&self) -> Address {
        self.address
    }

    fn check_transaction(
        &self,
        account: &dyn AccountView,
        params: &TransactionParams,
        signatures: &[u8],
        executor: &Address,
    ) -> GuardResult<()> {
        GuardRegistry::check_transaction(self, account, params, signatures, executor)
    }

    fn check_after_execution(
        &self,
        account: &dyn AccountView,
        tx_hash: &TxHash,
        success: bool,
    ) -> GuardResult<()> {
        GuardRegistry::check_after_execution(self, account, tx_hash, success).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NoOpGuard;
    use chrono::Duration;
    use multiguard_account::{encode_set_guard, SimulatedAccount};
    use multiguard_core::{ManualClock, MemorySink};
    use std::sync::Mutex;

    struct Fixture {
        clock: Arc<ManualClock>,
        events: Arc<MemorySink>,
        registry: Arc<GuardRegistry>,
        account: SimulatedAccount,
    }

    fn fixture() -> Fixture {
        fixture_with(RegistryConfig {
            removal_delay_secs: 100,
            ..Default::default()
        })
    }

    fn fixture_with(config: RegistryConfig) -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let events = Arc::new(MemorySink::new());
        let registry = Arc::new(
            GuardRegistry::new(Address::from_label("registry"))
                .with_config(config)
                .with_clock(clock.clone())
                .with_event_sink(events.clone()),
        );
        let mut account = SimulatedAccount::with_labels("safe", &["alice", "bob"]);
        account.set_guard(Some(registry.clone()));

        Fixture {
            clock,
            events,
            registry,
            account,
        }
    }

    fn noop(label: &str) -> Arc<dyn GuardModule> {
        Arc::new(NoOpGuard::new(Address::from_label(label)))
    }

    fn call() -> TransactionParams {
        TransactionParams::call(Address::from_label("target"), vec![])
    }

    /// Records hook calls into a shared log; optionally fails
    struct ScriptedGuard {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        reject: bool,
        fail_post: bool,
        removed: Mutex<Vec<Address>>,
    }

    impl ScriptedGuard {
        fn new(label: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                label,
                log,
                reject: false,
                fail_post: false,
                removed: Mutex::new(Vec::new()),
            }
        }
    }

    impl GuardModule for ScriptedGuard {
        fn name(&self) -> &str {
            self.label
        }

        fn address(&self) -> Address {
            Address::from_label(self.label)
        }

        fn check_transaction(&self, ctx: &TransactionContext<'_>) -> GuardResult<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("check:{}:{}", self.label, ctx.transaction.nonce));
            if self.reject {
                return Err(GuardError::rejected(self.label, "scripted", "SCRIPTED"));
            }
            Ok(())
        }

        fn commit_transaction(&self, _account: &Address, _tx_hash: &TxHash) {
            self.log.lock().unwrap().push(format!("commit:{}", self.label));
        }

        fn check_after_execution(
            &self,
            _account: &Address,
            _tx_hash: &TxHash,
            success: bool,
        ) -> GuardResult<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("post:{}:{}", self.label, success));
            if self.fail_post {
                return Err(GuardError::rejected(self.label, "post", "SCRIPTED_POST"));
            }
            Ok(())
        }

        fn on_remove(&self, account: &Address) {
            self.removed.lock().unwrap().push(*account);
        }
    }

    #[test]
    fn test_add_guard_once() {
        let f = fixture();
        let guard = noop("g1");

        f.registry.add_guard(&f.account, guard.clone()).unwrap();
        assert_eq!(f.registry.get_guards(&f.account.address()), vec![guard.address()]);

        let err = f.registry.add_guard(&f.account, guard.clone()).unwrap_err();
        assert!(matches!(err, GuardError::AlreadyPresent { .. }));
        assert_eq!(f.registry.get_guards(&f.account.address()).len(), 1);
        assert_eq!(f.events.names(), vec!["guard_added"]);
    }

    #[test]
    fn test_add_guard_requires_installation() {
        let f = fixture();
        let other = SimulatedAccount::with_labels("other", &["alice"]);

        let err = f.registry.add_guard(&other, noop("g1")).unwrap_err();
        assert_eq!(err, GuardError::NotInstalled(other.address()));
        assert!(f.registry.get_guards(&other.address()).is_empty());
    }

    #[test]
    fn test_add_guard_capacity() {
        let f = fixture_with(RegistryConfig {
            max_guards: 2,
            ..Default::default()
        });
        f.registry.add_guard(&f.account, noop("g1")).unwrap();
        f.registry.add_guard(&f.account, noop("g2")).unwrap();

        let err = f.registry.add_guard(&f.account, noop("g3")).unwrap_err();
        assert_eq!(
            err,
            GuardError::CapacityExceeded {
                what: "guards",
                limit: 2
            }
        );
    }

    #[test]
    fn test_guard_order_is_insertion_order() {
        let f = fixture();
        for label in ["c", "a", "b"] {
            f.registry.add_guard(&f.account, noop(label)).unwrap();
        }
        let expected: Vec<Address> = ["c", "a", "b"].iter().map(|l| Address::from_label(l)).collect();
        assert_eq!(f.registry.get_guards(&f.account.address()), expected);
    }

    #[test]
    fn test_remove_guard_timing() {
        let f = fixture();
        let guard = noop("g1");
        let account = f.account.address();
        f.registry.add_guard(&f.account, guard.clone()).unwrap();

        // Never initiated
        let err = f.registry.remove_guard(&account, &guard.address()).unwrap_err();
        assert_eq!(err, GuardError::DelayNotElapsed { ready_at: None });

        let ready_at = f
            .registry
            .initiate_guard_removal(&f.account, &guard.address())
            .unwrap();
        assert_eq!(f.registry.pending_removal(&account, &guard.address()), Some(ready_at));

        f.clock.advance(Duration::seconds(99));
        assert!(matches!(
            f.registry.remove_guard(&account, &guard.address()),
            Err(GuardError::DelayNotElapsed { .. })
        ));

        // Exactly at the deadline is still too early
        f.clock.advance(Duration::seconds(1));
        assert!(f.registry.remove_guard(&account, &guard.address()).is_err());

        f.clock.advance(Duration::seconds(1));
        f.registry.remove_guard(&account, &guard.address()).unwrap();

        assert!(f.registry.get_guards(&account).is_empty());
        assert_eq!(f.registry.pending_removal(&account, &guard.address()), None);
        assert_eq!(
            f.events.names(),
            vec!["guard_added", "guard_removal_initiated", "guard_removed"]
        );
    }

    #[test]
    fn test_reinitiating_removal_resets_timer() {
        let f = fixture();
        let guard = noop("g1");
        let account = f.account.address();
        f.registry.add_guard(&f.account, guard.clone()).unwrap();

        f.registry.initiate_guard_removal(&f.account, &guard.address()).unwrap();
        f.clock.advance(Duration::seconds(90));
        f.registry.initiate_guard_removal(&f.account, &guard.address()).unwrap();
        f.clock.advance(Duration::seconds(20));

        assert!(f.registry.remove_guard(&account, &guard.address()).is_err());

        f.clock.advance(Duration::seconds(81));
        assert!(f.registry.remove_guard(&account, &guard.address()).is_ok());
    }

    #[test]
    fn test_initiate_removal_requires_presence() {
        let f = fixture();
        let err = f
            .registry
            .initiate_guard_removal(&f.account, &Address::from_label("missing"))
            .unwrap_err();
        assert!(matches!(err, GuardError::NotPresent { .. }));
    }

    #[test]
    fn test_remove_guard_notifies_module() {
        let f = fixture();
        let log = Arc::new(Mutex::new(Vec::new()));
        let guard = Arc::new(ScriptedGuard::new("scripted", log));
        let account = f.account.address();
        f.registry.add_guard(&f.account, guard.clone()).unwrap();

        f.registry.initiate_guard_removal(&f.account, &guard.address()).unwrap();
        f.clock.advance(Duration::seconds(101));
        f.registry.remove_guard(&account, &guard.address()).unwrap();

        assert_eq!(*guard.removed.lock().unwrap(), vec![account]);
    }

    #[test]
    fn test_hooks_fan_out_in_order_then_commit() {
        let mut f = fixture();
        let log = Arc::new(Mutex::new(Vec::new()));
        f.registry
            .add_guard(&f.account, Arc::new(ScriptedGuard::new("first", log.clone())))
            .unwrap();
        f.registry
            .add_guard(&f.account, Arc::new(ScriptedGuard::new("second", log.clone())))
            .unwrap();

        f.account.execute(call(), &[], &Address::from_label("alice")).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "check:first:0",
                "check:second:0",
                "post:first:true",
                "post:second:true",
                "commit:first",
                "commit:second",
            ]
        );
    }

    #[test]
    fn test_pre_hook_failure_aborts_without_commit() {
        let mut f = fixture();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut second = ScriptedGuard::new("second", log.clone());
        second.reject = true;
        f.registry
            .add_guard(&f.account, Arc::new(ScriptedGuard::new("first", log.clone())))
            .unwrap();
        f.registry.add_guard(&f.account, Arc::new(second)).unwrap();
        f.registry
            .add_guard(&f.account, Arc::new(ScriptedGuard::new("third", log.clone())))
            .unwrap();

        let err = f
            .account
            .execute(call(), &[], &Address::from_label("alice"))
            .unwrap_err();

        assert_eq!(err.code(), "SCRIPTED");
        assert_eq!(*log.lock().unwrap(), vec!["check:first:0", "check:second:0"]);
        assert_eq!(f.account.nonce(), 0);
    }

    #[test]
    fn test_pre_hook_uses_consumed_nonce() {
        let mut f = fixture();
        let log = Arc::new(Mutex::new(Vec::new()));
        f.registry
            .add_guard(&f.account, Arc::new(ScriptedGuard::new("g", log.clone())))
            .unwrap();

        f.account.execute(call(), &[], &Address::from_label("alice")).unwrap();
        f.account.execute(call(), &[], &Address::from_label("alice")).unwrap();

        let checks: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.starts_with("check"))
            .cloned()
            .collect();
        assert_eq!(checks, vec!["check:g:0", "check:g:1"]);
    }

    #[test]
    fn test_post_hook_fail_closed() {
        let mut f = fixture();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = ScriptedGuard::new("failing", log.clone());
        failing.fail_post = true;
        f.registry.add_guard(&f.account, Arc::new(failing)).unwrap();
        f.registry
            .add_guard(&f.account, Arc::new(ScriptedGuard::new("after", log.clone())))
            .unwrap();

        let err = f
            .account
            .execute(call(), &[], &Address::from_label("alice"))
            .unwrap_err();

        assert_eq!(err.code(), "SCRIPTED_POST");
        assert!(!log.lock().unwrap().iter().any(|l| l.starts_with("post:after")));
        assert!(!log.lock().unwrap().iter().any(|l| l.starts_with("commit")));
    }

    #[test]
    fn test_staged_commit_applies_once() {
        let mut f = fixture();
        let log = Arc::new(Mutex::new(Vec::new()));
        f.registry
            .add_guard(&f.account, Arc::new(ScriptedGuard::new("watcher", log.clone())))
            .unwrap();

        let outcome = f
            .account
            .execute(call(), &[], &Address::from_label("alice"))
            .unwrap();
        assert_eq!(
            log.lock().unwrap().iter().filter(|l| l.starts_with("commit")).count(),
            1
        );

        // Replaying the post-hook finds nothing staged
        log.lock().unwrap().clear();
        f.registry
            .check_after_execution(&f.account, &outcome.tx_hash, true)
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["post:watcher:true"]);
    }

    #[test]
    fn test_post_hook_abort_discards_staged_commit() {
        let mut f = fixture();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = ScriptedGuard::new("failing", log.clone());
        failing.fail_post = true;
        f.registry
            .add_guard(&f.account, Arc::new(ScriptedGuard::new("first", log.clone())))
            .unwrap();
        f.registry.add_guard(&f.account, Arc::new(failing)).unwrap();

        let err = f
            .account
            .execute(call(), &[], &Address::from_label("alice"))
            .unwrap_err();

        assert_eq!(err.code(), "SCRIPTED_POST");
        assert_eq!(f.account.nonce(), 0);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["check:first:0", "check:failing:0", "post:first:true", "post:failing:true"]
        );
    }

    #[test]
    fn test_initiate_uninstall_requires_installation() {
        let f = fixture();
        let stranger = SimulatedAccount::with_labels("stranger", &["mallory"]);

        let err = f.registry.initiate_uninstall(&stranger).unwrap_err();
        assert_eq!(err, GuardError::NotInstalled(stranger.address()));
        assert_eq!(f.registry.pending_uninstall(&stranger.address()), None);
        assert!(f.events.names().is_empty());
    }

    #[test]
    fn test_uninstall_latch() {
        let mut f = fixture();
        let account = f.account.address();
        f.registry.initiate_uninstall(&f.account).unwrap();
        assert!(f.registry.pending_uninstall(&account).is_some());

        // Swap the dispatcher away before the delay: post-hook must fail
        let swap = TransactionParams::call(account, encode_set_guard(&Address::ZERO));
        let err = f
            .account
            .execute(swap.clone(), &[], &Address::from_label("alice"))
            .unwrap_err();
        assert!(matches!(err, GuardError::DelayNotElapsed { ready_at: Some(_) }));
        assert!(f.registry.is_installed(&f.account));

        f.clock.advance(Duration::seconds(101));
        f.account
            .execute(swap, &[], &Address::from_label("alice"))
            .unwrap();
        assert!(!f.registry.is_installed(&f.account));
        assert_eq!(f.registry.pending_uninstall(&account), None);

        // Latch consumed: a second completion attempt fails
        let err = f
            .registry
            .check_after_execution(&f.account, &TxHash::ZERO, true)
            .unwrap_err();
        assert_eq!(err, GuardError::DelayNotElapsed { ready_at: None });
        assert!(f.events.names().contains(&"uninstall_completed"));
    }

    #[test]
    fn test_uninstall_latch_survives_failed_fan_out() {
        let f = fixture();
        let account = f.account.address();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = ScriptedGuard::new("failing", log);
        failing.fail_post = true;
        f.registry.add_guard(&f.account, Arc::new(failing)).unwrap();
        f.registry.initiate_uninstall(&f.account).unwrap();
        f.clock.advance(Duration::seconds(101));

        let detached = SimulatedAccount::with_labels("safe", &["alice", "bob"]);
        assert!(f
            .registry
            .check_after_execution(&detached, &TxHash::ZERO, true)
            .is_err());
        assert!(f.registry.pending_uninstall(&account).is_some());
    }

    #[test]
    fn test_post_hook_while_installed_ignores_latch() {
        let f = fixture();
        let account = f.account.address();
        f.registry.initiate_uninstall(&f.account).unwrap();

        let report = f
            .registry
            .check_after_execution(&f.account, &TxHash::ZERO, true)
            .unwrap();
        assert!(!report.uninstall_completed);
        assert!(f.registry.pending_uninstall(&account).is_some());
    }

    #[test]
    fn test_snapshot() {
        let f = fixture();
        let account = f.account.address();
        let g1 = noop("g1");
        let g2 = noop("g2");
        f.registry.add_guard(&f.account, g1.clone()).unwrap();
        f.registry.add_guard(&f.account, g2.clone()).unwrap();
        let remove_at = f.registry.initiate_guard_removal(&f.account, &g2.address()).unwrap();

        let snapshot = f.registry.snapshot(&account);
        assert_eq!(snapshot.guards, vec![g1.address(), g2.address()]);
        assert_eq!(
            snapshot.pending_removals,
            vec![PendingRemoval {
                guard: g2.address(),
                remove_at
            }]
        );
        assert_eq!(snapshot.uninstall_at, None);

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: RegistrySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_unknown_account_is_empty() {
        let f = fixture();
        let unknown = Address::from_label("unknown");
        assert!(f.registry.get_guards(&unknown).is_empty());
        assert!(!f.registry.contains_guard(&unknown, &Address::from_label("g1")));
        assert_eq!(f.registry.snapshot(&unknown).guards, Vec::<Address>::new());
    }
}
