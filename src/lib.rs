//! maskcmp: incremental GT comparison cache (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod backend;
pub mod cache;
pub mod compare;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod env;
pub mod models;
