//! Two-party messaging between seekers and employers.

pub mod handlers;
pub mod repository;
pub mod service;
