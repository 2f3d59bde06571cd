//! # CrewTask Shared Library
//!
//! Domain models, lifecycle managers, and shared infrastructure for the
//! CrewTask multi-tenant task-assignment backend.
//!
//! ## Module Organization
//!
//! - `models`: database models and per-entity CRUD
//! - `lifecycle`: the identity and assignment lifecycle managers
//! - `auth`: credential hashing, token issuing/verification, request context
//! - `db`: connection pool and migrations
//! - `notify`: best-effort notification dispatch
//! - `error`: the unified domain error type

pub mod auth;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod notify;

/// Current version of the CrewTask shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
