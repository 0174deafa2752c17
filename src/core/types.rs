//! Common types used across pactum modules.

use uuid::Uuid;

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

/// Generate a fresh record identifier.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}
