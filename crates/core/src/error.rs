//! Guard errors
//!
//! Every failure aborts the enclosing call. Variants are grouped into
//! [`ErrorKind`] so callers can tell authorization, state, timing, policy and
//! capacity failures apart.

use chrono::{DateTime, Utc};
use strum_macros::Display;
use thiserror::Error;

use crate::address::{Address, TxHash};

/// Failure class of a [`GuardError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Caller lacks the required role
    Authorization,
    /// Membership or existence violated
    State,
    /// A required delay has not elapsed
    Timing,
    /// A module's own rule rejected the transaction
    Policy,
    /// A configured capacity bound was hit
    Capacity,
    /// Host or configuration problem
    Internal,
}

/// Errors raised by the guard registry and guard modules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("Guard dispatcher not installed for account {0}")]
    NotInstalled(Address),

    #[error("Guard {guard} already installed for account {account}")]
    AlreadyPresent { account: Address, guard: Address },

    #[error("Guard {guard} not installed for account {account}")]
    NotPresent { account: Address, guard: Address },

    #[error("Delay not elapsed (ready at {})", fmt_ready(.ready_at))]
    DelayNotElapsed { ready_at: Option<DateTime<Utc>> },

    #[error("Transaction {0} already scheduled")]
    AlreadyScheduled(TxHash),

    #[error("Transaction {0} not scheduled")]
    NotScheduled(TxHash),

    #[error("{caller} is not an owner of account {account}")]
    NotOwner { account: Address, caller: Address },

    #[error("{caller} is not the cancellor for account {account}")]
    NotCancellor { account: Address, caller: Address },

    #[error("Rejected by {guard}: {reason} (code: {code})")]
    Rejected {
        guard: String,
        reason: String,
        code: String,
    },

    #[error("Capacity exceeded: at most {limit} {what} per account")]
    CapacityExceeded { what: &'static str, limit: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn fmt_ready(ready_at: &Option<DateTime<Utc>>) -> String {
    match ready_at {
        Some(at) => at.to_rfc3339(),
        None => "never initiated".to_string(),
    }
}

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

impl GuardError {
    /// Create a policy rejection
    pub fn rejected(
        guard: impl Into<String>,
        reason: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        GuardError::Rejected {
            guard: guard.into(),
            reason: reason.into(),
            code: code.into(),
        }
    }

    /// Failure class
    pub fn kind(&self) -> ErrorKind {
        match self {
            GuardError::NotInstalled(_)
            | GuardError::NotOwner { .. }
            | GuardError::NotCancellor { .. } => ErrorKind::Authorization,
            GuardError::AlreadyPresent { .. }
            | GuardError::NotPresent { .. }
            | GuardError::AlreadyScheduled(_)
            | GuardError::NotScheduled(_) => ErrorKind::State,
            GuardError::DelayNotElapsed { .. } => ErrorKind::Timing,
            GuardError::Rejected { .. } => ErrorKind::Policy,
            GuardError::CapacityExceeded { .. } => ErrorKind::Capacity,
            GuardError::Config(_) | GuardError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable reason
    pub fn code(&self) -> &str {
        match self {
            GuardError::NotInstalled(_) => "NOT_INSTALLED",
            GuardError::AlreadyPresent { .. } => "ALREADY_PRESENT",
            GuardError::NotPresent { .. } => "NOT_PRESENT",
            GuardError::DelayNotElapsed { .. } => "DELAY_NOT_ELAPSED",
            GuardError::AlreadyScheduled(_) => "ALREADY_SCHEDULED",
            GuardError::NotScheduled(_) => "NOT_SCHEDULED",
            GuardError::NotOwner { .. } => "NOT_OWNER",
            GuardError::NotCancellor { .. } => "NOT_CANCELLOR",
            GuardError::Rejected { code, .. } => code.as_str(),
            GuardError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            GuardError::Config(_) => "CONFIG",
            GuardError::Internal(_) => "INTERNAL",
        }
    }

    /// Check if this is a policy rejection
    pub fn is_rejection(&self) -> bool {
        matches!(self, GuardError::Rejected { .. })
    }
}

/// Errors parsing a hex identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIdError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
