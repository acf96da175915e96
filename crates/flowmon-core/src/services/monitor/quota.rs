//! Quota client - usage report query
//!
//! Sends the important-data query with a session cookie and unwraps the
//! carrier's JSON envelope. A successful call needs both HTTP 200 and the
//! "0000" sentinel in `resultCode`; anything else is treated as a stale
//! or rejected session so the broker can decide whether to re-login.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, redirect, Client};
use serde::Deserialize;

use super::broker::ReportFetcher;
use super::error::MonitorError;
use super::report::RawReport;
use super::session::REQUEST_TIMEOUT_SECS;

// ============================================================================
// Constants
// ============================================================================

/// Carrier usage query endpoint
pub const QUERY_URL: &str = "https://appfuwu.189.cn:9021/query/qryImportantData";

/// Envelope result code for a successful query
pub const RESULT_OK: &str = "0000";

// ============================================================================
// Envelope
// ============================================================================

/// Carrier response envelope around the usage report
#[derive(Debug, Deserialize)]
pub struct QueryEnvelope {
    #[serde(rename = "resultCode", default)]
    pub result_code: String,
    #[serde(rename = "resultMsg", default)]
    pub result_msg: String,
    #[serde(rename = "responseData", default)]
    pub response_data: Option<ResponseData>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseData {
    #[serde(default)]
    pub data: Option<RawReport>,
}

impl QueryEnvelope {
    /// Unwrap the envelope into a report
    ///
    /// A non-OK sentinel means the session was rejected or the query
    /// failed upstream; an OK sentinel without a payload is a parse-level
    /// defect rather than a session problem.
    pub fn into_report(self) -> Result<RawReport, MonitorError> {
        if self.result_code != RESULT_OK {
            return Err(MonitorError::SessionInvalidOrQueryFailed {
                code: self.result_code,
                message: self.result_msg,
            });
        }
        self.response_data
            .and_then(|d| d.data)
            .ok_or_else(|| MonitorError::Parse("envelope is OK but carries no report".to_string()))
    }
}

// ============================================================================
// QuotaClient
// ============================================================================

/// Client for the carrier usage query
pub struct QuotaClient {
    client: Client,
    query_url: String,
}

impl QuotaClient {
    /// Create a quota client against the production query endpoint
    pub fn new() -> Self {
        Self::with_query_url(QUERY_URL)
    }

    /// Create a quota client against a custom endpoint (tests)
    pub fn with_query_url(query_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .max_tls_version(reqwest::tls::Version::TLS_1_2)
            .redirect(redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            client,
            query_url: query_url.into(),
        }
    }
}

impl Default for QuotaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportFetcher for QuotaClient {
    async fn fetch(&self, account_id: &str, cookie: &str) -> Result<RawReport, MonitorError> {
        log::debug!("[monitor:quota] querying usage report");

        // Form-urlencoded, same as the login endpoint; the carrier rejects
        // JSON bodies here.
        let params = [("phoneNum", account_id), ("queryFlag", "0")];

        let response = self
            .client
            .post(&self.query_url)
            .header(header::COOKIE, cookie)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            // Non-200 on this endpoint means the session was bounced
            log::debug!("[monitor:quota] query returned HTTP {}", status);
            return Err(MonitorError::SessionInvalidOrQueryFailed {
                code: status.as_u16().to_string(),
                message: format!("query endpoint returned HTTP {}", status),
            });
        }

        let text = response.text().await?;
        let envelope: QueryEnvelope = serde_json::from_str(&text).map_err(|_| {
            // Expired sessions get an HTML login page back, not JSON
            MonitorError::SessionInvalidOrQueryFailed {
                code: "non-json".to_string(),
                message: "query response was not a JSON envelope".to_string(),
            }
        })?;

        envelope.into_report()
    }
}

// ============================================================================
// Tests
// ============================================================================
