//! Typed failures for the monitoring engine
//!
//! Every fatal cycle error carries the upstream diagnostics (HTTP status,
//! carrier result code/message) so operator logs are actionable. None of
//! these are retried internally beyond the broker's single
//! re-authentication pass.

use thiserror::Error;

/// Errors produced by the usage monitoring engine
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Network, TLS or timeout failure; surfaced to the scheduler, never retried here
    #[error("Transport error: {0}")]
    Transport(String),

    /// Login handshake produced no session cookie
    #[error("Authentication failed (HTTP {status}): {message}")]
    AuthenticationFailed { status: u16, message: String },

    /// Carrier rejected the quota query; an expired cookie and a transient
    /// upstream error are indistinguishable here, by observed carrier behavior
    #[error("Session invalid or query failed (code {code}): {message}")]
    SessionInvalidOrQueryFailed { code: String, message: String },

    /// Cookie-only account whose cookie no longer works; manual intervention needed
    #[error("Session expired and the account has no credentials to renew it")]
    SessionExpired,

    /// Top-level response shape was unusable (item-level problems are skipped instead)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Snapshot persistence failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl MonitorError {
    /// Whether this failure should trigger the broker's one re-authentication
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, MonitorError::SessionInvalidOrQueryFailed { .. })
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MonitorError::Transport("request timed out".to_string())
        } else if err.is_connect() {
            MonitorError::Transport(format!("connection failed: {}", err))
        } else {
            MonitorError::Transport(err.to_string())
        }
    }
}
