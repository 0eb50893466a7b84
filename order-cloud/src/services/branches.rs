//! HQ branch administration

use shared::error::{AppError, ErrorCode};
use shared::models::{Branch, BranchUpdate, GeoLocation};
use shared::util::{non_blank, now_millis};

use crate::auth::CurrentUser;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{Collection, DocumentStore};

#[derive(Clone)]
pub struct BranchService {
    store: DocumentStore,
}

impl BranchService {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Activate or deactivate; deactivated branches cannot open new drafts
    pub async fn set_active(&self, caller: &CurrentUser, branch_id: &str, active: bool) -> ServiceResult<Branch> {
        caller.require_hq()?;
        let branch = self.modify(branch_id, |branch| {
            branch.set_active(active);
            Ok(())
        })?;
        tracing::info!(branch_id = %branch_id, active, operator = %caller.uid, "Branch activation changed");
        Ok(branch)
    }

    /// Profile edit; absent fields are left as stored
    pub async fn update(&self, caller: &CurrentUser, branch_id: &str, update: BranchUpdate) -> ServiceResult<Branch> {
        caller.require_hq()?;
        if let Some(point) = &update.location {
            if !point.is_valid() {
                return Err(AppError::invalid_argument("location is out of range")
                    .with_detail("field", "location")
                    .into());
            }
        }
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::required("name").into());
        }

        let branch = self.modify(branch_id, |branch| {
            if let Some(name) = non_blank(update.name.clone()) {
                branch.name = name;
            }
            if let Some(contact) = update.contact_name.clone() {
                branch.contact_name = non_blank(Some(contact));
            }
            if let Some(phone) = update.phone.clone() {
                branch.phone = non_blank(Some(phone));
            }
            if let Some(address) = update.address.clone() {
                branch.address = address;
            }
            if let Some(point) = update.location {
                branch.location = Some(GeoLocation::from(point));
            }
            Ok(())
        })?;
        tracing::info!(branch_id = %branch_id, operator = %caller.uid, "Branch profile updated");
        Ok(branch)
    }

    fn modify<F>(&self, branch_id: &str, f: F) -> ServiceResult<Branch>
    where
        F: FnOnce(&mut Branch) -> Result<(), AppError>,
    {
        let now = now_millis();
        self.store.transaction(|txn| {
            let mut branch: Branch = txn
                .get(Collection::Branches, branch_id)?
                .ok_or_else(|| AppError::not_found(ErrorCode::BranchNotFound, branch_id))?;
            f(&mut branch)?;
            branch.updated_at = now;
            txn.set(Collection::Branches, branch_id, &branch)?;
            Ok::<_, ServiceError>(branch)
        })
    }
}
