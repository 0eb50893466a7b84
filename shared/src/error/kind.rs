//! Caller-facing error taxonomy
//!
//! Every [`ErrorCode`] belongs to exactly one [`ErrorKind`]. The kind tells a
//! caller what to do next: fix the request, re-authenticate, re-read state, or
//! retry with backoff.

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Missing or malformed field. Caller bug, not retriable.
    InvalidArgument,
    /// Create collided with an existing document.
    AlreadyExists,
    /// Role check failed.
    PermissionDenied,
    /// Referenced document absent.
    NotFound,
    /// State-machine violation or already processed. Re-read before deciding.
    FailedPrecondition,
    /// Missing or invalid token.
    Unauthenticated,
    /// Transient I/O failure. Safe to retry with backoff.
    Unavailable,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Whether retrying the same call later can succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl ErrorCode {
    /// Taxonomy bucket for this code
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument
            | Self::InvalidRequest
            | Self::RequiredField
            | Self::ValueOutOfRange
            | Self::InvalidStatus => ErrorKind::InvalidArgument,

            Self::AlreadyExists | Self::RegistrationExists => ErrorKind::AlreadyExists,

            Self::PermissionDenied | Self::RoleRequired | Self::NotOrderOwner => {
                ErrorKind::PermissionDenied
            }

            Self::NotFound
            | Self::RegistrationNotFound
            | Self::BranchNotFound
            | Self::OrderNotFound
            | Self::OrderItemNotFound => ErrorKind::NotFound,

            Self::FailedPrecondition
            | Self::RegistrationAlreadyProcessed
            | Self::BranchInactive
            | Self::BranchNotAssigned
            | Self::RegistrationAccountConflict
            | Self::OrderNotDraft
            | Self::IllegalTransition
            | Self::OrderEmpty
            | Self::OrderNotPlaced
            | Self::PaymentVerificationFailed
            | Self::PaymentAmountMismatch
            | Self::OrderAlreadyPaid => ErrorKind::FailedPrecondition,

            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                ErrorKind::Unauthenticated
            }

            Self::IdentityProviderError
            | Self::GatewayUnavailable
            | Self::GatewayTimeout
            | Self::GatewayBadResponse
            | Self::StorageUnavailable
            | Self::NetworkError => ErrorKind::Unavailable,

            Self::Success
            | Self::Unknown
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError => ErrorKind::Internal,
        }
    }
}
