//! Identity / claims provider
//!
//! The service only consumes identities: it verifies bearer tokens, looks up
//! or creates accounts by email during registration approval, and writes the
//! `role` / `branchId` custom claims. [`LocalIdentityProvider`] is the shipped
//! implementation (HS256 tokens, accounts in the document store).

pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::Role;
use thiserror::Error;

use crate::store::StoreError;

pub use local::LocalIdentityProvider;

/// Claims extracted from a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub branch_id: Option<String>,
}

/// Account as known to the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUser {
    pub uid: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub display_name: Option<String>,
}

/// Custom claims written on approval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomClaims {
    pub role: Role,
    pub branch_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    Expired,

    #[error("an account with email {0} already exists")]
    EmailExists(String),

    #[error("account not found: {0}")]
    UserNotFound(String),

    #[error("identity store error: {0}")]
    Store(#[from] StoreError),

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<IdentityError> for AppError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidToken(msg) => {
                tracing::debug!(error = %msg, "Token rejected");
                AppError::invalid_token("Invalid or malformed token")
            }
            IdentityError::Expired => AppError::token_expired(),
            IdentityError::EmailExists(email) => {
                AppError::already_exists(ErrorCode::AlreadyExists, email)
            }
            IdentityError::UserNotFound(uid) => AppError::not_found(ErrorCode::NotFound, uid),
            other => {
                tracing::error!(error = %other, "Identity provider failure");
                AppError::new(ErrorCode::IdentityProviderError)
            }
        }
    }
}

/// External identity service
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<VerifiedToken, IdentityError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<IdentityUser>, IdentityError>;

    async fn create_user(&self, user: NewUser) -> Result<IdentityUser, IdentityError>;

    async fn set_custom_claims(&self, uid: &str, claims: CustomClaims) -> Result<(), IdentityError>;
}
