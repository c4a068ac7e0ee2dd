//! mpath - org chart and manager-hierarchy authorization service
//!
//! People belong to one organization and point at their manager. This crate
//! answers "may this caller see that person?" by walking the manager chain,
//! and scopes task and notification queries to what the caller may see.

pub mod access;
pub mod config;
pub mod db;
pub mod directory;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod hierarchy;
pub mod middleware;
pub mod orgchart;
pub mod routes;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use hierarchy::{HierarchyError, HierarchyResolver, ManagerLookup, MemoryDirectory, PersonId};
pub use state::AppState;
