//! Job applications: submission (single-shot or chunked), review, and status changes.

pub mod handlers;
pub mod repository;
pub mod service;
pub mod upload;
