//! Job postings: CRUD, filtered listing, and hot / warm matching.

pub mod handlers;
pub mod matching;
pub mod queries;
