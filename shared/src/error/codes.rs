//! Unified error codes for the order hub
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Registration / branch errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so mobile clients can map
/// them to localized messages without parsing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Argument missing or malformed
    InvalidArgument = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,
    /// Operation not allowed in the current state
    FailedPrecondition = 9,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Specific role required
    RoleRequired = 2002,
    /// Caller does not own the order
    NotOrderOwner = 2003,

    // ==================== 3xxx: Registration / Branch ====================
    /// Registration not found
    RegistrationNotFound = 3001,
    /// Registration has already been approved or rejected
    RegistrationAlreadyProcessed = 3002,
    /// A registration for this email already exists
    RegistrationExists = 3003,
    /// Branch not found
    BranchNotFound = 3004,
    /// Branch is deactivated
    BranchInactive = 3005,
    /// Identity provider call failed
    IdentityProviderError = 3006,
    /// Caller has no branch assigned
    BranchNotAssigned = 3007,
    /// Registration email belongs to an account with another role or branch
    RegistrationAccountConflict = 3008,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order is no longer a draft
    OrderNotDraft = 4002,
    /// Status transition is not allowed
    IllegalTransition = 4003,
    /// Order has no line items
    OrderEmpty = 4004,
    /// Order line not found
    OrderItemNotFound = 4005,
    /// Unknown order status value
    InvalidStatus = 4006,
    /// Order has not been placed yet
    OrderNotPlaced = 4007,

    // ==================== 5xxx: Payment ====================
    /// Gateway did not confirm the transaction
    PaymentVerificationFailed = 5001,
    /// Gateway amount differs from the order total
    PaymentAmountMismatch = 5002,
    /// Order has already been paid
    OrderAlreadyPaid = 5003,
    /// Payment gateway unreachable
    GatewayUnavailable = 5004,
    /// Payment gateway did not answer in time
    GatewayTimeout = 5005,
    /// Payment gateway returned an unusable response
    GatewayBadResponse = 5006,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Storage temporarily unavailable
    StorageUnavailable = 9003,
    /// Network error
    NetworkError = 9004,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the default English message for this error code
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "Success",
            ErrorCode::Unknown => "Unknown error",
            ErrorCode::InvalidArgument => "Invalid argument",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::RequiredField => "Required field missing",
            ErrorCode::ValueOutOfRange => "Value out of range",
            ErrorCode::FailedPrecondition => "Operation not allowed in current state",

            ErrorCode::NotAuthenticated => "Authentication required",
            ErrorCode::TokenExpired => "Token has expired",
            ErrorCode::TokenInvalid => "Invalid token",

            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "Role required",
            ErrorCode::NotOrderOwner => "Order belongs to another user",

            ErrorCode::RegistrationNotFound => "Registration not found",
            ErrorCode::RegistrationAlreadyProcessed => "Registration already processed",
            ErrorCode::RegistrationExists => "Registration already submitted",
            ErrorCode::BranchNotFound => "Branch not found",
            ErrorCode::BranchInactive => "Branch is inactive",
            ErrorCode::IdentityProviderError => "Identity provider error",
            ErrorCode::BranchNotAssigned => "No branch assigned to this account",
            ErrorCode::RegistrationAccountConflict => {
                "Registration email belongs to another account"
            }

            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderNotDraft => "Order is not a draft",
            ErrorCode::IllegalTransition => "Order status transition not allowed",
            ErrorCode::OrderEmpty => "Order has no items",
            ErrorCode::OrderItemNotFound => "Order item not found",
            ErrorCode::InvalidStatus => "Invalid order status",
            ErrorCode::OrderNotPlaced => "Order has not been placed",

            ErrorCode::PaymentVerificationFailed => "Payment verification failed",
            ErrorCode::PaymentAmountMismatch => "Payment amount does not match order total",
            ErrorCode::OrderAlreadyPaid => "Order has already been paid",
            ErrorCode::GatewayUnavailable => "Payment gateway unavailable",
            ErrorCode::GatewayTimeout => "Payment gateway timed out",
            ErrorCode::GatewayBadResponse => "Payment gateway returned an invalid response",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::StorageUnavailable => "Storage temporarily unavailable",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code as u16
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Error returned when converting an unknown u16 into an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::InvalidArgument),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),
            9 => Ok(ErrorCode::FailedPrecondition),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::RoleRequired),
            2003 => Ok(ErrorCode::NotOrderOwner),

            // Registration / Branch
            3001 => Ok(ErrorCode::RegistrationNotFound),
            3002 => Ok(ErrorCode::RegistrationAlreadyProcessed),
            3003 => Ok(ErrorCode::RegistrationExists),
            3004 => Ok(ErrorCode::BranchNotFound),
            3005 => Ok(ErrorCode::BranchInactive),
            3006 => Ok(ErrorCode::IdentityProviderError),
            3007 => Ok(ErrorCode::BranchNotAssigned),
            3008 => Ok(ErrorCode::RegistrationAccountConflict),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderNotDraft),
            4003 => Ok(ErrorCode::IllegalTransition),
            4004 => Ok(ErrorCode::OrderEmpty),
            4005 => Ok(ErrorCode::OrderItemNotFound),
            4006 => Ok(ErrorCode::InvalidStatus),
            4007 => Ok(ErrorCode::OrderNotPlaced),

            // Payment
            5001 => Ok(ErrorCode::PaymentVerificationFailed),
            5002 => Ok(ErrorCode::PaymentAmountMismatch),
            5003 => Ok(ErrorCode::OrderAlreadyPaid),
            5004 => Ok(ErrorCode::GatewayUnavailable),
            5005 => Ok(ErrorCode::GatewayTimeout),
            5006 => Ok(ErrorCode::GatewayBadResponse),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::StorageUnavailable),
            9004 => Ok(ErrorCode::NetworkError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::FailedPrecondition.code(), 9);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::PermissionDenied.code(), 2001);
        assert_eq!(ErrorCode::RegistrationAlreadyProcessed.code(), 3002);
        assert_eq!(ErrorCode::IllegalTransition.code(), 4003);
        assert_eq!(ErrorCode::GatewayTimeout.code(), 5005);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_error_code_roundtrip_through_u16() {
        for code in [
            ErrorCode::InvalidArgument,
            ErrorCode::TokenInvalid,
            ErrorCode::NotOrderOwner,
            ErrorCode::BranchInactive,
            ErrorCode::RegistrationAccountConflict,
            ErrorCode::OrderEmpty,
            ErrorCode::PaymentAmountMismatch,
            ErrorCode::StorageUnavailable,
        ] {
            let raw: u16 = code.into();
            assert_eq!(ErrorCode::try_from(raw), Ok(code));
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert_eq!(ErrorCode::try_from(6001), Err(InvalidErrorCode(6001)));
    }

    #[test]
    fn test_display_format() {
        assert_eq!(ErrorCode::OrderNotFound.to_string(), "E4001");
        assert_eq!(ErrorCode::InvalidArgument.to_string(), "E0002");
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&ErrorCode::IllegalTransition).unwrap();
        assert_eq!(json, "4003");
        let code: ErrorCode = serde_json::from_str("3002").unwrap();
        assert_eq!(code, ErrorCode::RegistrationAlreadyProcessed);
    }
}
