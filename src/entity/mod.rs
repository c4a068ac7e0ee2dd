//! Entity module - SeaORM entity definitions
//!
//! One file per table. Every table except `organization` is scoped by
//! `organization_id`.

pub mod feedback;
pub mod notification;
pub mod op_log;
pub mod organization;
pub mod person;
pub mod task;
