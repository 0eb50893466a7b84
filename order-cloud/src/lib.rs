//! order-cloud: franchise order hub backend
//!
//! Branches register and get approved by HQ, build and place supply orders,
//! and pay through a card gateway whose webhook and client-side verification
//! both feed the same idempotent payment state machine.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod notify;
pub mod services;
pub mod state;
pub mod store;
