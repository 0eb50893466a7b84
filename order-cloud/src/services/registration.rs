//! Registration workflow
//!
//! ```text
//! submit ──► PENDING ──approve──► APPROVED
//!               │  ▲
//!          reject  └──reset── (any)
//!               ▼
//!           REJECTED
//! ```
//!
//! Approval is a saga, not one transaction: identity account, claims, branch
//! record and profile cache are written in order, each step idempotent, and
//! the registration flips to APPROVED last inside a transaction that
//! re-checks PENDING. A half-finished approval is retried by calling approve
//! again (the registration is still PENDING) or undone by `reset`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, json};
use shared::error::{AppError, ErrorCode};
use shared::models::{
    ApprovalOverrides, Branch, BranchStatus, GeoLocation, Registration, RegistrationStatus,
    RegistrationSubmit, Role,
};
use shared::util::{non_blank, normalize_email, now_millis};

use crate::auth::CurrentUser;
use crate::error::{ServiceError, ServiceResult};
use crate::identity::{CustomClaims, IdentityError, IdentityProvider, IdentityUser, NewUser};
use crate::notify::{HQ_TOPIC, Notification, Notifier, Target, branch_topic};
use crate::store::{Collection, Direction, DocumentStore, Query, StoreError};

/// Result of a successful approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResult {
    pub uid: String,
    pub branch_id: String,
}

#[derive(Clone)]
pub struct RegistrationService {
    store: DocumentStore,
    identity: Arc<dyn IdentityProvider>,
    notifier: Notifier,
}

fn registration_event(doc_id: &str, status: RegistrationStatus) -> String {
    format!("registration:{doc_id}:{status}")
}

/// Branch id for an approval: operator override, else `BR_<docId>`
pub fn resolve_branch_id(doc_id: &str, overrides: &ApprovalOverrides) -> Result<String, AppError> {
    match non_blank(overrides.branch_code.clone()) {
        Some(code) if code.contains('/') => Err(AppError::invalid_argument(
            "branchCode must not contain '/'",
        )),
        Some(code) => Ok(code),
        None => Ok(format!("BR_{doc_id}")),
    }
}

impl RegistrationService {
    pub fn new(store: DocumentStore, identity: Arc<dyn IdentityProvider>, notifier: Notifier) -> Self {
        Self {
            store,
            identity,
            notifier,
        }
    }

    /// Branch self-signup; the normalized email is the document id
    pub async fn submit(&self, input: RegistrationSubmit) -> ServiceResult<String> {
        let email = normalize_email(&input.email);
        if email.is_empty() {
            return Err(AppError::required("email").into());
        }
        if !email.contains('@') || email.contains('/') {
            return Err(AppError::invalid_argument("email is malformed")
                .with_detail("field", "email")
                .into());
        }
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::required("name").into());
        }
        let branch_name = input.branch_name.trim().to_string();
        if branch_name.is_empty() {
            return Err(AppError::required("branchName").into());
        }

        let now = now_millis();
        let registration = Registration {
            id: email.clone(),
            email: email.clone(),
            name,
            branch_name,
            branch_code: non_blank(input.branch_code),
            phone: non_blank(input.phone),
            memo: non_blank(input.memo),
            status: RegistrationStatus::Pending,
            created_at: now,
            updated_at: now,
            approved_at: None,
            approved_by: None,
            reject_reason: None,
            rejected_at: None,
            rejected_by: None,
        };

        self.store
            .create(Collection::Registrations, &email, &registration)
            .map_err(|e| match e {
                StoreError::AlreadyExists { .. } => {
                    ServiceError::App(AppError::already_exists(ErrorCode::RegistrationExists, &email))
                }
                other => ServiceError::Store(other),
            })?;

        tracing::info!(doc_id = %email, branch_name = %registration.branch_name, "Registration submitted");

        self.notifier
            .dispatch(
                Target::Topic(HQ_TOPIC.into()),
                Notification::new(
                    "registration_submitted",
                    registration_event(&email, RegistrationStatus::Pending),
                    "New branch registration",
                    format!("{} ({})", registration.branch_name, registration.email),
                )
                .with("docId", &email),
            )
            .await;

        Ok(email)
    }

    /// HQ review queue, newest first
    pub async fn list(
        &self,
        caller: &CurrentUser,
        status: Option<RegistrationStatus>,
    ) -> ServiceResult<Vec<Registration>> {
        caller.require_hq()?;
        let mut query = Query::new(Collection::Registrations).order_by("createdAt", Direction::Desc);
        if let Some(status) = status {
            query = query.filter_eq("status", status.as_str());
        }
        Ok(self.store.query(&query)?)
    }

    pub async fn approve(
        &self,
        caller: &CurrentUser,
        doc_id: &str,
        overrides: ApprovalOverrides,
    ) -> ServiceResult<ApprovalResult> {
        caller.require_hq()?;

        let registration: Registration = self
            .store
            .get(Collection::Registrations, doc_id)?
            .ok_or_else(|| AppError::not_found(ErrorCode::RegistrationNotFound, doc_id))?;
        if registration.status != RegistrationStatus::Pending {
            return Err(already_processed(&registration).into());
        }

        let branch_id = resolve_branch_id(doc_id, &overrides)?;
        if let Some(point) = &overrides.location {
            if !point.is_valid() {
                return Err(AppError::invalid_argument("location is out of range")
                    .with_detail("field", "location")
                    .into());
            }
        }

        // 1. identity account (lookup before create)
        let user = self.resolve_account(&registration).await?;
        check_account_claimable(&user, &branch_id)?;

        // 2. claims
        self.identity
            .set_custom_claims(
                &user.uid,
                CustomClaims {
                    role: Role::Branch,
                    branch_id: Some(branch_id.clone()),
                },
            )
            .await
            .map_err(AppError::from)?;

        // 3. branch record
        let now = now_millis();
        let branch_name = non_blank(overrides.branch_name.clone())
            .unwrap_or_else(|| registration.branch_name.clone());
        let branch_patch = branch_patch(&registration, &overrides, &branch_id, &branch_name, now);
        self.store.transaction(|txn| {
            let exists = txn.get::<Value>(Collection::Branches, &branch_id)?.is_some();
            let mut patch = branch_patch;
            if !exists {
                patch.insert("createdAt".into(), json!(now));
            }
            let merged = txn.merge(Collection::Branches, &branch_id, Value::Object(patch))?;
            // shape check so a bad merge never commits
            serde_json::from_value::<Branch>(merged).map_err(StoreError::from)?;
            Ok::<_, StoreError>(())
        })?;

        // 4. profile cache
        self.store.merge(
            Collection::Users,
            &user.uid,
            json!({
                "uid": user.uid,
                "email": registration.email,
                "name": registration.name,
                "role": Role::Branch,
                "branchId": branch_id,
                "branchName": branch_name,
                "updatedAt": now,
            }),
        )?;

        // 5. registration flips last, re-checking PENDING
        let approver = caller.uid.clone();
        self.store.transaction(|txn| {
            let mut current: Registration = txn
                .get(Collection::Registrations, doc_id)?
                .ok_or_else(|| AppError::not_found(ErrorCode::RegistrationNotFound, doc_id))?;
            if current.status != RegistrationStatus::Pending {
                return Err(ServiceError::App(already_processed(&current)));
            }
            current.status = RegistrationStatus::Approved;
            current.approved_at = Some(now);
            current.approved_by = Some(approver.clone());
            current.updated_at = now;
            txn.set(Collection::Registrations, doc_id, &current)?;
            Ok(())
        })?;

        tracing::info!(
            doc_id = %doc_id,
            uid = %user.uid,
            branch_id = %branch_id,
            approved_by = %caller.uid,
            "Registration approved"
        );

        // approvedAt keeps a re-approval after reset distinct from the first
        let event_id = format!("{}:{now}", registration_event(doc_id, RegistrationStatus::Approved));
        let notification = Notification::new(
            "registration_approved",
            event_id,
            "Registration approved",
            format!("{branch_name} is now active"),
        )
        .with("docId", doc_id)
        .with("branchId", &branch_id);
        self.notifier
            .dispatch(Target::Topic(HQ_TOPIC.into()), notification.clone())
            .await;
        self.notifier
            .dispatch(Target::Topic(branch_topic(&branch_id)), notification)
            .await;

        Ok(ApprovalResult {
            uid: user.uid,
            branch_id,
        })
    }

    async fn resolve_account(&self, registration: &Registration) -> Result<IdentityUser, AppError> {
        if let Some(user) = self.identity.get_user_by_email(&registration.email).await? {
            return Ok(user);
        }
        let created = self
            .identity
            .create_user(NewUser {
                email: registration.email.clone(),
                display_name: Some(registration.name.clone()),
            })
            .await;
        match created {
            Ok(user) => Ok(user),
            // lost a race with a concurrent approval; the account is there now
            Err(IdentityError::EmailExists(_)) => self
                .identity
                .get_user_by_email(&registration.email)
                .await?
                .ok_or_else(|| AppError::new(ErrorCode::IdentityProviderError)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn reject(
        &self,
        caller: &CurrentUser,
        doc_id: &str,
        reason: Option<String>,
    ) -> ServiceResult<()> {
        caller.require_hq()?;
        let now = now_millis();
        let reason = non_blank(reason);

        self.store.transaction(|txn| {
            let mut registration: Registration = txn
                .get(Collection::Registrations, doc_id)?
                .ok_or_else(|| AppError::not_found(ErrorCode::RegistrationNotFound, doc_id))?;
            if registration.status != RegistrationStatus::Pending {
                return Err(ServiceError::App(already_processed(&registration)));
            }
            registration.status = RegistrationStatus::Rejected;
            registration.reject_reason = reason.clone();
            registration.rejected_at = Some(now);
            registration.rejected_by = Some(caller.uid.clone());
            registration.updated_at = now;
            txn.set(Collection::Registrations, doc_id, &registration)?;
            Ok(())
        })?;

        tracing::info!(doc_id = %doc_id, rejected_by = %caller.uid, "Registration rejected");

        self.notifier
            .dispatch(
                Target::Topic(HQ_TOPIC.into()),
                Notification::new(
                    "registration_rejected",
                    registration_event(doc_id, RegistrationStatus::Rejected),
                    "Registration rejected",
                    reason.unwrap_or_else(|| doc_id.to_string()),
                )
                .with("docId", doc_id),
            )
            .await;
        Ok(())
    }

    /// Put a registration back to PENDING regardless of its current state
    pub async fn reset(&self, caller: &CurrentUser, doc_id: &str) -> ServiceResult<()> {
        caller.require_hq()?;
        let now = now_millis();
        let previous = self.store.transaction(|txn| {
            let mut registration: Registration = txn
                .get(Collection::Registrations, doc_id)?
                .ok_or_else(|| AppError::not_found(ErrorCode::RegistrationNotFound, doc_id))?;
            let previous = registration.status;
            registration.status = RegistrationStatus::Pending;
            registration.updated_at = now;
            txn.set(Collection::Registrations, doc_id, &registration)?;
            Ok::<_, ServiceError>(previous)
        })?;

        tracing::info!(doc_id = %doc_id, from = %previous, reset_by = %caller.uid, "Registration reset");
        Ok(())
    }
}

fn already_processed(registration: &Registration) -> AppError {
    AppError::precondition(
        ErrorCode::RegistrationAlreadyProcessed,
        format!("Registration is already {}", registration.status),
    )
    .with_detail("status", registration.status.as_str())
}

/// An approval may only claim an account that is unassigned or already this branch's
fn check_account_claimable(user: &IdentityUser, branch_id: &str) -> Result<(), AppError> {
    let conflict = match user.role {
        Some(Role::Hq) => true,
        Some(Role::Branch) => user.branch_id.as_deref() != Some(branch_id),
        _ => false,
    };
    if conflict {
        let role = user.role.map(|r| r.as_str()).unwrap_or_default();
        return Err(AppError::precondition(
            ErrorCode::RegistrationAccountConflict,
            format!("{} already has a {role} account", user.email),
        )
        .with_detail("role", role)
        .with_detail("branchId", user.branch_id.clone().unwrap_or_default()));
    }
    Ok(())
}

/// Merge patch for the branch record; absent overrides leave stored fields alone
fn branch_patch(
    registration: &Registration,
    overrides: &ApprovalOverrides,
    branch_id: &str,
    branch_name: &str,
    now: i64,
) -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert("branchId".into(), json!(branch_id));
    patch.insert("name".into(), json!(branch_name));
    patch.insert("active".into(), json!(true));
    patch.insert("status".into(), json!(BranchStatus::Active));
    patch.insert("updatedAt".into(), json!(now));

    let contact = non_blank(overrides.contact_name.clone()).or_else(|| Some(registration.name.clone()));
    if let Some(contact) = contact {
        patch.insert("contactName".into(), json!(contact));
    }
    if let Some(phone) = non_blank(overrides.phone.clone()).or_else(|| registration.phone.clone()) {
        patch.insert("phone".into(), json!(phone));
    }
    if let Some(address) = &overrides.address {
        patch.insert("address".into(), json!(address));
    }
    if let Some(point) = overrides.location {
        patch.insert("location".into(), json!(GeoLocation::from(point)));
    }
    patch
}
