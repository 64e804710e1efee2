pub mod account;
pub mod alert;
pub mod application;
pub mod chat;
pub mod job;
