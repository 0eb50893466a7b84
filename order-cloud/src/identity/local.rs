//! HS256 identity provider backed by the document store

use async_trait::async_trait;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::models::Role;
use shared::util::{normalize_email, now_millis};

use super::{CustomClaims, IdentityError, IdentityProvider, IdentityUser, NewUser, VerifiedToken};
use crate::store::{Collection, DocumentStore, Query};

const TOKEN_EXPIRY_HOURS: i64 = 24;

/// JWT claims shared with the sign-in service
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

#[derive(Clone)]
pub struct LocalIdentityProvider {
    store: DocumentStore,
    secret: String,
}

impl LocalIdentityProvider {
    pub fn new(store: DocumentStore, secret: impl Into<String>) -> Self {
        Self {
            store,
            secret: secret.into(),
        }
    }

    /// Mint a token carrying the account's current claims
    pub fn issue_token(&self, uid: &str) -> Result<String, IdentityError> {
        let account: IdentityUser = self
            .store
            .get(Collection::Accounts, uid)?
            .ok_or_else(|| IdentityError::UserNotFound(uid.to_string()))?;

        let now = chrono::Utc::now();
        let claims = TokenClaims {
            sub: account.uid,
            email: Some(account.email),
            role: account.role.map(|r| r.as_str().to_string()),
            branch_id: account.branch_id,
            exp: (now + chrono::Duration::hours(TOKEN_EXPIRY_HOURS)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| IdentityError::Signing(e.to_string()))
    }

    /// Ensure every listed email has an HQ account
    pub async fn bootstrap_hq(&self, emails: &[String]) -> Result<(), IdentityError> {
        for email in emails {
            let user = match self.get_user_by_email(email).await? {
                Some(user) => user,
                None => {
                    self.create_user(NewUser {
                        email: email.clone(),
                        display_name: None,
                    })
                    .await?
                }
            };
            if user.role != Some(Role::Hq) {
                self.set_custom_claims(
                    &user.uid,
                    CustomClaims {
                        role: Role::Hq,
                        branch_id: None,
                    },
                )
                .await?;
                tracing::info!(uid = %user.uid, email = %user.email, "HQ account bootstrapped");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<VerifiedToken, IdentityError> {
        let data = jsonwebtoken::decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => IdentityError::Expired,
            _ => IdentityError::InvalidToken(e.to_string()),
        })?;

        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(IdentityError::InvalidToken("empty subject".into()));
        }
        Ok(VerifiedToken {
            subject_id: claims.sub,
            email: claims.email,
            role: claims.role,
            branch_id: claims.branch_id,
        })
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<IdentityUser>, IdentityError> {
        let query = Query::new(Collection::Accounts)
            .filter_eq("email", normalize_email(email))
            .limit(1);
        let mut found: Vec<IdentityUser> = self.store.query(&query)?;
        Ok(found.pop())
    }

    async fn create_user(&self, user: NewUser) -> Result<IdentityUser, IdentityError> {
        let email = normalize_email(&user.email);
        let now = now_millis();
        let account = IdentityUser {
            uid: uuid::Uuid::new_v4().simple().to_string(),
            email: email.clone(),
            display_name: user.display_name,
            role: None,
            branch_id: None,
            created_at: now,
            updated_at: now,
        };

        // email uniqueness is checked in the same write transaction as the insert
        self.store.transaction(|txn| {
            let query = Query::new(Collection::Accounts)
                .filter_eq("email", email.as_str())
                .limit(1);
            let existing: Vec<IdentityUser> = txn.query(&query)?;
            if !existing.is_empty() {
                return Err(IdentityError::EmailExists(email.clone()));
            }
            txn.create(Collection::Accounts, &account.uid, &account)?;
            Ok(())
        })?;

        tracing::info!(uid = %account.uid, email = %account.email, "Identity account created");
        Ok(account)
    }

    async fn set_custom_claims(&self, uid: &str, claims: CustomClaims) -> Result<(), IdentityError> {
        self.store.transaction(|txn| {
            let mut account: IdentityUser = txn
                .get(Collection::Accounts, uid)?
                .ok_or_else(|| IdentityError::UserNotFound(uid.to_string()))?;
            account.role = Some(claims.role);
            account.branch_id = claims.branch_id.clone();
            account.updated_at = now_millis();
            txn.set(Collection::Accounts, uid, &account)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LocalIdentityProvider {
        LocalIdentityProvider::new(DocumentStore::open_in_memory().unwrap(), "test-secret")
    }

    #[tokio::test]
    async fn test_create_then_lookup_by_email() {
        let idp = provider();
        let created = idp
            .create_user(NewUser {
                email: " Kim@Example.com ".into(),
                display_name: Some("Kim".into()),
            })
            .await
            .unwrap();
        assert_eq!(created.email, "kim@example.com");

        let found = idp.get_user_by_email("KIM@example.com").await.unwrap().unwrap();
        assert_eq!(found.uid, created.uid);
        assert!(idp.get_user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let idp = provider();
        let new = NewUser {
            email: "a@b.com".into(),
            display_name: None,
        };
        idp.create_user(new.clone()).await.unwrap();
        let err = idp.create_user(new).await.unwrap_err();
        assert!(matches!(err, IdentityError::EmailExists(_)));
    }

    #[tokio::test]
    async fn test_token_carries_claims() {
        let idp = provider();
        let user = idp
            .create_user(NewUser {
                email: "a@b.com".into(),
                display_name: None,
            })
            .await
            .unwrap();
        idp.set_custom_claims(
            &user.uid,
            CustomClaims {
                role: Role::Branch,
                branch_id: Some("BR_1".into()),
            },
        )
        .await
        .unwrap();

        let token = idp.issue_token(&user.uid).unwrap();
        let verified = idp.verify_token(&token).await.unwrap();
        assert_eq!(verified.subject_id, user.uid);
        assert_eq!(verified.role.as_deref(), Some("BRANCH"));
        assert_eq!(verified.branch_id.as_deref(), Some("BR_1"));
    }

    #[tokio::test]
    async fn test_rejects_foreign_and_expired_tokens() {
        let idp = provider();
        let other = LocalIdentityProvider::new(DocumentStore::open_in_memory().unwrap(), "other");
        let user = other
            .create_user(NewUser {
                email: "a@b.com".into(),
                display_name: None,
            })
            .await
            .unwrap();
        let token = other.issue_token(&user.uid).unwrap();
        assert!(matches!(
            idp.verify_token(&token).await,
            Err(IdentityError::InvalidToken(_))
        ));

        let past = (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp() as usize;
        let expired = jsonwebtoken::encode(
            &Header::default(),
            &TokenClaims {
                sub: "u1".into(),
                email: None,
                role: None,
                branch_id: None,
                exp: past,
                iat: past,
            },
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(matches!(idp.verify_token(&expired).await, Err(IdentityError::Expired)));
    }

    #[tokio::test]
    async fn test_bootstrap_hq_is_idempotent() {
        let idp = provider();
        let emails = vec!["boss@hq.com".to_string()];
        idp.bootstrap_hq(&emails).await.unwrap();
        idp.bootstrap_hq(&emails).await.unwrap();

        let user = idp.get_user_by_email("boss@hq.com").await.unwrap().unwrap();
        assert_eq!(user.role, Some(Role::Hq));
        let all: Vec<IdentityUser> = idp
            .store
            .query(&Query::new(Collection::Accounts))
            .unwrap();
        assert_eq!(all.len(), 1);
    }
}
