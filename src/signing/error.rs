//! Signed URL error definitions.

use thiserror::Error;

/// Failures of the storage backing signed URL records.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Signed URL storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Signed URL storage is unreadable: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Signed URL storage lock poisoned")]
    Poisoned,
}

/// Errors raised while issuing a signed URL.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Usage budgets start at one.
    #[error("Max usage must be at least 1, got {0}")]
    InvalidMaxUsage(u32),

    /// The protected URL already carries one of the signature parameters.
    #[error("Parameter `{0}` is reserved for signed URLs")]
    ReservedParameter(String),

    /// The application secret cannot key the MAC.
    #[error("Invalid signing secret")]
    InvalidSecret,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Why a signed URL was rejected.
///
/// Only signature mismatch, expiry and exhaustion are told apart; every
/// other problem collapses into `InvalidSignature`.
#[derive(Debug, Error)]
pub enum SignedUrlError {
    /// Missing parameters, malformed values or a signature mismatch.
    #[error("The link signature is invalid")]
    InvalidSignature,

    /// The signature is valid but the link has expired.
    #[error("The link has expired")]
    Expired,

    /// The identifier is unknown: never issued, already used up, or purged.
    #[error("The link has already been used or is unknown")]
    BadIdentifier,

    /// Storage failed; verification fails closed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SignedUrlError {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SignedUrlError::InvalidSignature => "invalid_signature",
            SignedUrlError::Expired => "expired",
            SignedUrlError::BadIdentifier => "bad_identifier",
            SignedUrlError::Storage(_) => "storage_error",
        }
    }
}
