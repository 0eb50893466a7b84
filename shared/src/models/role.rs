//! Role Model

use serde::{Deserialize, Serialize};

/// Role carried in the identity provider's `role` claim
///
/// The claim is the only source of truth for authorization. The copy in
/// [`super::UserProfile`] is for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Headquarters operator
    Hq,
    /// Branch (store) user
    Branch,
    /// No role claim present
    #[default]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Hq => "HQ",
            Role::Branch => "BRANCH",
            Role::Unknown => "UNKNOWN",
        }
    }

    /// Parse a raw claim value; anything unrecognized is `Unknown`
    pub fn from_claim(claim: Option<&str>) -> Self {
        match claim {
            Some("HQ") => Role::Hq,
            Some("BRANCH") => Role::Branch,
            _ => Role::Unknown,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
