//! Request authentication

pub mod current_user;

pub use current_user::{CurrentUser, bearer_token};
