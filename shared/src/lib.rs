//! Shared types for the franchise order hub
//!
//! Domain documents (registrations, branches, user profiles, orders) and the
//! unified error system used by order-cloud and its clients.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
