//! Authenticated caller

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::error::{AppError, ErrorCode};
use shared::models::Role;

use crate::identity::VerifiedToken;
use crate::state::AppState;

/// Caller identity taken from a verified bearer token
///
/// Authorization decisions use these claims only, never the cached profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub uid: String,
    pub email: Option<String>,
    pub role: Role,
    pub branch_id: Option<String>,
}

impl From<VerifiedToken> for CurrentUser {
    fn from(token: VerifiedToken) -> Self {
        Self {
            uid: token.subject_id,
            email: token.email,
            role: Role::from_claim(token.role.as_deref()),
            branch_id: token.branch_id.filter(|b| !b.trim().is_empty()),
        }
    }
}

impl CurrentUser {
    pub fn is_hq(&self) -> bool {
        self.role == Role::Hq
    }

    pub fn require_hq(&self) -> Result<(), AppError> {
        if self.is_hq() {
            Ok(())
        } else {
            Err(AppError::with_message(ErrorCode::RoleRequired, "HQ role required")
                .with_detail("role", self.role.as_str()))
        }
    }

    /// Branch id of a BRANCH caller
    pub fn require_branch(&self) -> Result<&str, AppError> {
        if self.role != Role::Branch {
            return Err(
                AppError::with_message(ErrorCode::RoleRequired, "BRANCH role required")
                    .with_detail("role", self.role.as_str()),
            );
        }
        self.branch_id
            .as_deref()
            .ok_or_else(|| AppError::new(ErrorCode::BranchNotAssigned))
    }
}

/// Pull the token out of `Authorization: Bearer <token>`
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(AppError::not_authenticated)?;

        let token = bearer_token(header)
            .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?;

        let verified = state.identity.verify_token(token).await.map_err(|e| {
            tracing::warn!(error = %e, uri = %parts.uri, "Authentication failed");
            AppError::from(e)
        })?;

        let user = CurrentUser::from(verified);
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
