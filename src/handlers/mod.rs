//! Request handlers module

pub mod audit;
pub mod feedback;
pub mod notifications;
pub mod people;
pub mod tasks;

/// Current Unix timestamp in seconds
pub(crate) fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
