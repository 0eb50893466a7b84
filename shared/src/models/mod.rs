//! Data models
//!
//! Documents stored by order-cloud and returned over the RPC API.
//! JSON field names are camelCase; timestamps are Unix milliseconds.

pub mod branch;
pub mod order;
pub mod registration;
pub mod role;
pub mod user;

// Re-exports
pub use branch::*;
pub use order::*;
pub use registration::*;
pub use role::*;
pub use user::*;
