//! Account and credential models
//!
//! A `Credential` is what the monitoring engine consumes: the subscriber
//! number plus whatever material is available to open a session with the
//! carrier. Accounts with full credentials (app id + online token) can
//! re-authenticate on their own; cookie-only accounts ride on a captured
//! session cookie until it dies.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Credential Mode
// ============================================================================

/// How an account can authenticate against the carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    /// App id + online token; can mint a fresh session cookie at will
    Full,
    /// Pre-captured session cookie with no renewal capability
    CookieOnly,
}

impl std::fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialMode::Full => write!(f, "full"),
            CredentialMode::CookieOnly => write!(f, "cookie_only"),
        }
    }
}

impl std::str::FromStr for CredentialMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(CredentialMode::Full),
            "cookie_only" | "cookie-only" | "cookie" => Ok(CredentialMode::CookieOnly),
            _ => Err(format!("Unknown credential mode: {}", s)),
        }
    }
}

// ============================================================================
// Credential
// ============================================================================

/// Per-account credential record consumed by the monitoring engine
///
/// `account_id` is the subscriber phone number; the report normalizer also
/// uses it to pick the account's own line out of shared-pool device lists.
/// `cached_cookie` is the only mutable part: the session broker refreshes
/// it when a re-authentication succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Subscriber phone number
    pub account_id: String,
    /// Authentication capability of this account
    pub mode: CredentialMode,
    /// Opaque application id (full mode only)
    pub app_id: Option<String>,
    /// Opaque login secret (full mode only)
    pub online_token: Option<String>,
    /// Last known good session cookie, if any
    pub cached_cookie: Option<String>,
}

impl Credential {
    /// Create a full credential (self-renewing)
    pub fn full(
        account_id: impl Into<String>,
        app_id: impl Into<String>,
        online_token: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            mode: CredentialMode::Full,
            app_id: Some(app_id.into()),
            online_token: Some(online_token.into()),
            cached_cookie: None,
        }
    }

    /// Create a cookie-only credential
    pub fn cookie_only(account_id: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            mode: CredentialMode::CookieOnly,
            app_id: None,
            online_token: None,
            cached_cookie: Some(cookie.into()),
        }
    }

    /// Set the cached session cookie
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cached_cookie = Some(cookie.into());
        self
    }
}

// ============================================================================
// Database Row
// ============================================================================

/// Database row representation of an account
///
/// Maps directly to the `accounts` table schema.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    /// Subscriber phone number (primary key)
    pub account_id: String,
    /// Credential mode ("full" or "cookie_only")
    pub mode: String,
    /// Opaque application id
    pub app_id: Option<String>,
    /// Opaque login secret
    pub online_token: Option<String>,
    /// Last known session cookie
    pub cached_cookie: Option<String>,
    /// Row creation time (ISO 8601)
    pub created_at: String,
}

impl AccountRow {
    /// Convert database row to a Credential
    ///
    /// Returns `None` if the stored mode string is unrecognized.
    pub fn to_credential(&self) -> Option<Credential> {
        let mode = self.mode.parse::<CredentialMode>().ok()?;
        Some(Credential {
            account_id: self.account_id.clone(),
            mode,
            app_id: self.app_id.clone(),
            online_token: self.online_token.clone(),
            cached_cookie: self.cached_cookie.clone(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
