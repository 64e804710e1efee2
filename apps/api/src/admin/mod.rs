//! Back-office endpoints for the configured admin account.

pub mod handlers;
pub mod queries;
