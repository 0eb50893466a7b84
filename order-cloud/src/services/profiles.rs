//! User profile cache maintenance

use shared::error::AppError;
use shared::models::UserProfile;
use shared::util::now_millis;

use crate::auth::CurrentUser;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{Collection, DocumentStore};

/// Tokens kept per user; the oldest is dropped beyond this
pub const MAX_DEVICE_TOKENS: usize = 10;

const MAX_TOKEN_LEN: usize = 4096;

#[derive(Clone)]
pub struct ProfileService {
    store: DocumentStore,
}

impl ProfileService {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Remember a push token for the caller's devices
    pub async fn register_device_token(&self, caller: &CurrentUser, token: &str) -> ServiceResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::required("token").into());
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(AppError::invalid_argument("token is too long").into());
        }
        let now = now_millis();

        self.store.transaction(|txn| {
            let mut profile = txn
                .get::<UserProfile>(Collection::Users, &caller.uid)?
                .unwrap_or_else(|| UserProfile {
                    uid: caller.uid.clone(),
                    email: caller.email.clone().unwrap_or_default(),
                    name: String::new(),
                    role: caller.role,
                    branch_id: caller.branch_id.clone(),
                    branch_name: None,
                    device_tokens: Vec::new(),
                    updated_at: now,
                });

            if !profile.device_tokens.iter().any(|t| t == token) {
                profile.device_tokens.push(token.to_string());
                let excess = profile.device_tokens.len().saturating_sub(MAX_DEVICE_TOKENS);
                profile.device_tokens.drain(..excess);
            }
            profile.updated_at = now;
            txn.set(Collection::Users, &caller.uid, &profile)?;
            Ok::<_, ServiceError>(())
        })?;

        tracing::debug!(uid = %caller.uid, "Device token registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::Harness;

    #[tokio::test]
    async fn test_tokens_deduplicated_and_capped() {
        let h = Harness::new();
        let user = h.branch_user("u1", "BR_1");

        h.profiles.register_device_token(&user, "t0").await.unwrap();
        h.profiles.register_device_token(&user, " t0 ").await.unwrap();
        for i in 1..=MAX_DEVICE_TOKENS {
            h.profiles.register_device_token(&user, &format!("t{i}")).await.unwrap();
        }

        let profile: UserProfile = h.store.get(Collection::Users, "u1").unwrap().unwrap();
        assert_eq!(profile.device_tokens.len(), MAX_DEVICE_TOKENS);
        assert_eq!(profile.device_tokens[0], "t1");
        assert_eq!(profile.branch_id.as_deref(), Some("BR_1"));

        assert!(h.profiles.register_device_token(&user, "  ").await.is_err());
    }
}
