//! # flowmon-core
//!
//! Core logic for Flowmon - carrier data-quota monitoring.
//!
//! This crate provides:
//! - Database operations (`db` module)
//! - Account and credential models (`models` module)
//! - The monitoring engine and account service (`services` module)
//! - Unified error handling (`error` module)

pub mod db;
pub mod error;
pub mod models;
pub mod services;

// Re-exports for convenience
pub use db::Database;
pub use error::{Error, Result};

// Re-export commonly used types from models
pub use models::{AccountRow, Credential, CredentialMode};

// Re-export commonly used types from services
pub use services::monitor::{
    compute_diff, normalize, Bucket, BucketKey, BucketSet, DiffSet, LogDispatcher, MonitorError,
    NotificationDispatcher, Package, QuotaClient, RawReport, SessionBroker, SessionClient,
    Snapshot, SnapshotStore, UsageDelta, UsageMonitor, DEFAULT_WORKER_LIMIT, RETENTION_DAYS,
};
pub use services::AccountStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_version_format() {
        let v = version();
        // Should be semver format: x.y.z
        let parts: Vec<&str> = v.split('.').collect();
        assert_eq!(parts.len(), 3, "Version should be in x.y.z format");
    }
}
