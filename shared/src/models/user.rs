//! User profile cache

use serde::{Deserialize, Serialize};

use super::role::Role;

/// Display-layer copy of identity claims plus branch info
///
/// Never consulted for access control; token claims decide that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    /// Push tokens registered by the user's devices
    #[serde(default)]
    pub device_tokens: Vec<String>,
    #[serde(default)]
    pub updated_at: i64,
}
