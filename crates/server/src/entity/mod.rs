//! Database records.
//!
//! Each module holds a plain sea-orm model; reads and writes go through
//! [`crate::store::Repository`].

pub mod application;
pub mod bootstrap_migration;
pub mod grant;
pub mod resource_server;
pub mod user;
