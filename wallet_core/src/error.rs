use biopay_crypto::MnemonicError;
use biopay_types::{MicroAlgos, TxId, TypesError};
use thiserror::Error;

use crate::storage::StorageError;

/// Input problems the user can correct.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("amount must be a positive number")]
    InvalidAmount,

    #[error("amount has more than {max} decimal places")]
    TooManyDecimals { max: u32 },

    #[error("amount is below the network minimum of {minimum}")]
    AmountBelowMinimum { minimum: MicroAlgos },

    #[error("recipient address is required")]
    MissingRecipient,

    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),

    #[error("invalid recovery phrase: {0}")]
    InvalidMnemonic(#[from] MnemonicError),

    #[error("note exceeds {max} bytes")]
    NoteTooLong { max: usize },

    #[error("face payments require a completed face verification")]
    IdentityNotVerified,
}

impl From<TypesError> for ValidationError {
    fn from(e: TypesError) -> Self {
        match e {
            TypesError::InvalidAmount(_) => Self::InvalidAmount,
            TypesError::TooManyDecimals { max } => Self::TooManyDecimals { max },
            TypesError::InvalidAddress(reason) => Self::InvalidAddress(reason),
            other => Self::InvalidAddress(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("no enrolled identity matched the captured face")]
    NoMatch,

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("insufficient reward points: need {requested}, have {available}")]
    InsufficientPoints { requested: u64, available: u64 },

    #[error("secure storage could not complete the operation on {key}")]
    StorageDegraded { key: String },

    #[error("broadcast rejected: {0}")]
    Broadcast(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("no wallet connected")]
    NotConnected,

    #[error("a wallet is already connected; disconnect first")]
    AlreadyConnected,

    #[error("cannot {action} while {stage}")]
    InvalidTransition {
        stage: &'static str,
        action: &'static str,
    },

    #[error("a submission for this payment is already in flight")]
    SubmissionInFlight,

    #[error("payment was already submitted as {tx_id}")]
    DuplicateSubmission { tx_id: TxId },

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`WalletError`], stable for assertions and UI mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Authentication,
    ServiceUnavailable,
    Timeout,
    InsufficientPoints,
    StorageDegraded,
    Broadcast,
    Signing,
    Storage,
    InvalidState,
    Capture,
    Config,
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NoMatch => ErrorKind::Authentication,
            Self::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::InsufficientPoints { .. } => ErrorKind::InsufficientPoints,
            Self::StorageDegraded { .. } => ErrorKind::StorageDegraded,
            Self::Broadcast(_) => ErrorKind::Broadcast,
            Self::Signing(_) => ErrorKind::Signing,
            Self::Storage(_) => ErrorKind::Storage,
            Self::NotConnected
            | Self::AlreadyConnected
            | Self::InvalidTransition { .. }
            | Self::SubmissionInFlight
            | Self::DuplicateSubmission { .. } => ErrorKind::InvalidState,
            Self::Capture(_) => ErrorKind::Capture,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether an idempotent read may be retried after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::Timeout(_))
    }

    /// Map a transport error from `reqwest`, keeping timeouts distinct.
    pub(crate) fn from_transport(context: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(format!("{context}: {e}"))
        } else {
            Self::ServiceUnavailable(format!("{context}: {e}"))
        }
    }
}

impl From<StorageError> for WalletError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::FallbackDisabled { key } => Self::StorageDegraded { key },
            other => Self::Storage(other),
        }
    }
}

impl From<TypesError> for WalletError {
    fn from(e: TypesError) -> Self {
        Self::Validation(e.into())
    }
}
