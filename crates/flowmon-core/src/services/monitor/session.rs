//! Session client - carrier login handshake
//!
//! Performs the form-urlencoded login POST with the account's app id and
//! online token, follows the redirect chain manually and harvests every
//! `Set-Cookie` header along the way. The device/client emulation fields
//! are a fixed protocol contract: the upstream endpoint rejects requests
//! without them, and their values are not user-controlled.
//!
//! The upstream server negotiates only TLS 1.2, so the client pins it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, redirect, Client, StatusCode, Url};

use super::broker::Authenticator;
use super::error::MonitorError;

// ============================================================================
// Constants
// ============================================================================

/// Carrier login endpoint
pub const LOGIN_URL: &str = "https://appgologin.189.cn:9031/login/client/userLoginNormal";

/// HTTP request timeout in seconds (applies to each hop)
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Redirect chain bound when harvesting cookies
const MAX_REDIRECTS: usize = 5;

// Fixed device/client emulation fields (opaque protocol contract)
const LOGIN_TYPE: &str = "4";
const CLIENT_TYPE: &str = "#9.6.1#channel50#iPhone 14 Pro#";
const SHOP_ID: &str = "20002";
const SOURCE_SYSTEM: &str = "COP";

// ============================================================================
// SessionClient
// ============================================================================

/// Client for the carrier login handshake
pub struct SessionClient {
    client: Client,
    login_url: String,
}

impl SessionClient {
    /// Create a session client against the production login endpoint
    pub fn new() -> Self {
        Self::with_login_url(LOGIN_URL)
    }

    /// Create a session client against a custom endpoint (tests)
    pub fn with_login_url(login_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .max_tls_version(reqwest::tls::Version::TLS_1_2)
            // Redirects are followed manually so Set-Cookie headers on
            // intermediate hops are not lost.
            .redirect(redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            client,
            login_url: login_url.into(),
        }
    }

    /// Pull cookie pairs out of a response, attributes stripped
    fn collect_cookies(response: &reqwest::Response, cookies: &mut Vec<String>) {
        for value in response.headers().get_all(header::SET_COOKIE) {
            if let Ok(text) = value.to_str() {
                if let Some(pair) = text.split(';').next() {
                    let pair = pair.trim();
                    if !pair.is_empty() {
                        cookies.push(pair.to_string());
                    }
                }
            }
        }
    }

    /// Next hop URL from a redirect response, resolved against the current URL
    fn redirect_target(current: &str, response: &reqwest::Response) -> Option<String> {
        let location = response.headers().get(header::LOCATION)?.to_str().ok()?;
        let base = Url::parse(current).ok()?;
        let target = base.join(location).ok()?;
        Some(target.to_string())
    }
}

impl Default for SessionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for SessionClient {
    async fn login(&self, app_id: &str, online_token: &str) -> Result<String, MonitorError> {
        log::info!("[monitor:session] performing login handshake");

        let params = [
            ("appId", app_id),
            ("onlineToken", online_token),
            ("loginType", LOGIN_TYPE),
            ("clientType", CLIENT_TYPE),
            ("shopId", SHOP_ID),
            ("sourceSystem", SOURCE_SYSTEM),
        ];

        let mut url = self.login_url.clone();
        let mut cookies: Vec<String> = Vec::new();
        let mut status = StatusCode::OK;

        for hop in 0..=MAX_REDIRECTS {
            let request = if hop == 0 {
                self.client.post(&url).form(&params)
            } else {
                // Carry cookies gathered so far across the chain
                let mut request = self.client.get(&url);
                if !cookies.is_empty() {
                    request = request.header(header::COOKIE, cookies.join("; "));
                }
                request
            };

            let response = request.send().await?;
            status = response.status();
            Self::collect_cookies(&response, &mut cookies);

            if !status.is_redirection() {
                break;
            }
            match Self::redirect_target(&url, &response) {
                Some(next) => {
                    log::debug!("[monitor:session] following redirect to {}", next);
                    url = next;
                }
                None => break,
            }
        }

        if cookies.is_empty() {
            log::warn!(
                "[monitor:session] login yielded no Set-Cookie (HTTP {})",
                status
            );
            return Err(MonitorError::AuthenticationFailed {
                status: status.as_u16(),
                message: "login response carried no Set-Cookie header".to_string(),
            });
        }

        log::info!(
            "[monitor:session] login succeeded, {} cookie(s) collected",
            cookies.len()
        );
        Ok(cookies.join("; "))
    }
}

// ============================================================================
// Tests
// ============================================================================
