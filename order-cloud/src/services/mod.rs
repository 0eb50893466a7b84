//! Orchestration services
//!
//! Each service owns clones of the store and the collaborators it needs and
//! is cheap to clone into handlers.

pub mod branches;
pub mod orders;
pub mod payments;
pub mod profiles;
pub mod registration;

#[cfg(test)]
pub(crate) mod test_support;

pub use branches::BranchService;
pub use orders::OrderService;
pub use payments::PaymentService;
pub use profiles::ProfileService;
pub use registration::RegistrationService;
