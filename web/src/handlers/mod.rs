//! HTTP request handlers.

pub mod health;
pub mod pages;

pub use health::{health_check, readiness};
pub use pages::not_found;
