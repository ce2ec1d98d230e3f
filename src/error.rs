use crate::domain::payment::{PaymentMethod, PaymentStatus};
use crate::domain::verification::VerificationRequestId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Rejections raised by the status transition engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("unknown shipment status '{0}'")]
    InvalidStatus(String),
    #[error("event timestamp {attempted} is before the last update at {last_updated}")]
    NonMonotonicTimestamp {
        last_updated: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },
    #[error(
        "shipment is on hold until payment is settled (required {required_amount}, paid {paid_amount})"
    )]
    GatingViolation {
        required_amount: Decimal,
        paid_amount: Decimal,
    },
}

/// Rejections raised by the payment ledger.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("payment cannot move from {from} to {to}")]
    InvalidStateTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

/// Rejections raised by the verification workflow.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerificationError {
    #[error("payment method '{0}' is not allowed for this shipment")]
    MethodNotAllowed(PaymentMethod),
    #[error("verification request {0} has already been processed")]
    AlreadyProcessed(VerificationRequestId),
}

/// A concurrent write on the same shipment won the race.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("shipment {tracking_number} was modified concurrently (expected version {expected}, found {found})")]
pub struct ConflictError {
    pub tracking_number: String,
    pub expected: u64,
    pub found: u64,
}

/// Flat classification of [`TrackingError`], used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    GatingViolation,
    InvalidStateTransition,
    NonMonotonicTimestamp,
    Conflict,
    MethodNotAllowed,
    AlreadyProcessed,
    Internal,
}

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl TrackingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Csv(_) => ErrorKind::Validation,
            Self::Transition(TransitionError::InvalidStatus(_)) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Transition(TransitionError::NonMonotonicTimestamp { .. }) => {
                ErrorKind::NonMonotonicTimestamp
            }
            Self::Transition(TransitionError::GatingViolation { .. }) => ErrorKind::GatingViolation,
            Self::Ledger(LedgerError::InvalidStateTransition { .. }) => {
                ErrorKind::InvalidStateTransition
            }
            Self::Verification(VerificationError::MethodNotAllowed(_)) => {
                ErrorKind::MethodNotAllowed
            }
            Self::Verification(VerificationError::AlreadyProcessed(_)) => {
                ErrorKind::AlreadyProcessed
            }
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Io(_) | Self::Internal(_) => ErrorKind::Internal,
            #[cfg(feature = "storage-rocksdb")]
            Self::RocksDb(_) => ErrorKind::Internal,
        }
    }

    /// Only lost optimistic-concurrency races are worth replaying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, TrackingError>;
