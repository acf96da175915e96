//! Session broker
//!
//! Decides when to reuse a cached cookie and when to re-login. The state
//! machine is deliberately small:
//!
//! ```text
//!   TryCached(cookie) --session invalid--> Reauthenticate
//!   Reauthenticate    --login ok--------> RetryOnce(fresh cookie)
//!   RetryOnce(cookie) --session invalid--> error (no second login)
//! ```
//!
//! Per fetch there is at most one login and at most one retry. Transport
//! errors propagate as-is from any state; only a session-invalid result
//! triggers re-authentication. Cookie-only accounts cannot re-login, so
//! a rejected cookie surfaces as `SessionExpired` for the operator.

use async_trait::async_trait;

use super::error::MonitorError;
use super::report::RawReport;
use crate::models::{Credential, CredentialMode};

// ============================================================================
// Provider traits
// ============================================================================

/// Performs the carrier login handshake
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange account credentials for a session cookie string
    async fn login(&self, app_id: &str, online_token: &str) -> Result<String, MonitorError>;
}

/// Fetches the raw usage report for an authenticated session
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    async fn fetch(&self, account_id: &str, cookie: &str) -> Result<RawReport, MonitorError>;
}

// ============================================================================
// Broker
// ============================================================================

/// Result of a brokered fetch
#[derive(Debug)]
pub struct BrokerOutcome {
    /// The cookie the successful fetch was made with
    pub cookie: String,
    pub report: RawReport,
    /// True when a fresh login produced the cookie, so the caller should
    /// persist it for the next cycle
    pub cookie_updated: bool,
}

enum BrokerState {
    TryCached(String),
    Reauthenticate,
    RetryOnce(String),
}

/// Session-aware report fetcher
pub struct SessionBroker<A, F> {
    authenticator: A,
    fetcher: F,
}

impl<A: Authenticator, F: ReportFetcher> SessionBroker<A, F> {
    pub fn new(authenticator: A, fetcher: F) -> Self {
        Self {
            authenticator,
            fetcher,
        }
    }

    async fn authenticate(&self, credential: &Credential) -> Result<String, MonitorError> {
        if credential.mode == CredentialMode::CookieOnly {
            log::warn!(
                "[monitor:broker] cookie rejected for cookie-only account, manual refresh needed"
            );
            return Err(MonitorError::SessionExpired);
        }
        match (&credential.app_id, &credential.online_token) {
            (Some(app_id), Some(token)) => self.authenticator.login(app_id, token).await,
            _ => Err(MonitorError::AuthenticationFailed {
                status: 0,
                message: "account has no app id / online token to re-login with".to_string(),
            }),
        }
    }

    /// Fetch a report, re-authenticating at most once on session rejection
    pub async fn fetch(&self, credential: &Credential) -> Result<BrokerOutcome, MonitorError> {
        let mut state = match &credential.cached_cookie {
            Some(cookie) if !cookie.is_empty() => BrokerState::TryCached(cookie.clone()),
            _ => BrokerState::Reauthenticate,
        };

        loop {
            state = match state {
                BrokerState::TryCached(cookie) => {
                    match self.fetcher.fetch(&credential.account_id, &cookie).await {
                        Ok(report) => {
                            return Ok(BrokerOutcome {
                                cookie,
                                report,
                                cookie_updated: false,
                            })
                        }
                        Err(e) if e.is_session_invalid() => {
                            log::info!(
                                "[monitor:broker] cached session rejected, re-authenticating"
                            );
                            BrokerState::Reauthenticate
                        }
                        Err(e) => return Err(e),
                    }
                }
                BrokerState::Reauthenticate => {
                    let cookie = self.authenticate(credential).await?;
                    BrokerState::RetryOnce(cookie)
                }
                BrokerState::RetryOnce(cookie) => {
                    match self.fetcher.fetch(&credential.account_id, &cookie).await {
                        Ok(report) => {
                            return Ok(BrokerOutcome {
                                cookie,
                                report,
                                cookie_updated: true,
                            })
                        }
                        // A fresh session was rejected too; don't loop
                        Err(e) => return Err(e),
                    }
                }
            };
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockAuthenticator {
        calls: AtomicUsize,
        result: Result<String, MonitorError>,
    }

    impl MockAuthenticator {
        fn ok(cookie: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Ok(cookie.to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Err(MonitorError::AuthenticationFailed {
                    status: 403,
                    message: "bad token".to_string(),
                }),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Authenticator for MockAuthenticator {
        async fn login(&self, _app_id: &str, _token: &str) -> Result<String, MonitorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(cookie) => Ok(cookie.clone()),
                Err(MonitorError::AuthenticationFailed { status, message }) => {
                    Err(MonitorError::AuthenticationFailed {
                        status: *status,
                        message: message.clone(),
                    })
                }
                Err(_) => Err(MonitorError::SessionExpired),
            }
        }
    }

    /// Returns the scripted results in order, recording each cookie seen
    struct MockFetcher {
        responses: Mutex<Vec<Result<RawReport, MonitorError>>>,
        cookies_seen: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        fn scripted(responses: Vec<Result<RawReport, MonitorError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                cookies_seen: Mutex::new(Vec::new()),
            }
        }

        fn session_invalid() -> MonitorError {
            MonitorError::SessionInvalidOrQueryFailed {
                code: "9999".to_string(),
                message: "session expired".to_string(),
            }
        }

        fn report() -> RawReport {
            serde_json::from_str(r#"{ "mainPackageName": "5G Plus" }"#).unwrap()
        }
    }

    #[async_trait]
    impl ReportFetcher for MockFetcher {
        async fn fetch(&self, _account_id: &str, cookie: &str) -> Result<RawReport, MonitorError> {
            self.cookies_seen.lock().unwrap().push(cookie.to_string());
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn full_credential(cookie: Option<&str>) -> Credential {
        let cred = Credential::full("13812345678", "app-1", "token-1");
        match cookie {
            Some(c) => cred.with_cookie(c),
            None => cred,
        }
    }

    #[tokio::test]
    async fn test_cached_cookie_success_skips_login() {
        let auth = MockAuthenticator::ok("fresh=1");
        let fetcher = MockFetcher::scripted(vec![Ok(MockFetcher::report())]);
        let broker = SessionBroker::new(auth, fetcher);

        let outcome = broker
            .fetch(&full_credential(Some("cached=1")))
            .await
            .unwrap();
        assert_eq!(outcome.cookie, "cached=1");
        assert!(!outcome.cookie_updated);
        assert_eq!(broker.authenticator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_cookie_triggers_exactly_one_login() {
        let auth = MockAuthenticator::ok("fresh=1");
        let fetcher = MockFetcher::scripted(vec![
            Err(MockFetcher::session_invalid()),
            Ok(MockFetcher::report()),
        ]);
        let broker = SessionBroker::new(auth, fetcher);

        let outcome = broker
            .fetch(&full_credential(Some("stale=1")))
            .await
            .unwrap();
        assert_eq!(outcome.cookie, "fresh=1");
        assert!(outcome.cookie_updated);
        assert_eq!(broker.authenticator.call_count(), 1);
        assert_eq!(
            *broker.fetcher.cookies_seen.lock().unwrap(),
            vec!["stale=1".to_string(), "fresh=1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_cached_cookie_logs_in_first() {
        let auth = MockAuthenticator::ok("fresh=1");
        let fetcher = MockFetcher::scripted(vec![Ok(MockFetcher::report())]);
        let broker = SessionBroker::new(auth, fetcher);

        let outcome = broker.fetch(&full_credential(None)).await.unwrap();
        assert_eq!(outcome.cookie, "fresh=1");
        assert!(outcome.cookie_updated);
        assert_eq!(broker.authenticator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fresh_session_rejected_does_not_login_again() {
        let auth = MockAuthenticator::ok("fresh=1");
        let fetcher = MockFetcher::scripted(vec![
            Err(MockFetcher::session_invalid()),
            Err(MockFetcher::session_invalid()),
        ]);
        let broker = SessionBroker::new(auth, fetcher);

        let err = broker
            .fetch(&full_credential(Some("stale=1")))
            .await
            .unwrap_err();
        assert!(err.is_session_invalid());
        // One login, two fetches, no third attempt
        assert_eq!(broker.authenticator.call_count(), 1);
        assert_eq!(broker.fetcher.cookies_seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_does_not_reauthenticate() {
        let auth = MockAuthenticator::ok("fresh=1");
        let fetcher = MockFetcher::scripted(vec![Err(MonitorError::Transport(
            "connection reset".to_string(),
        ))]);
        let broker = SessionBroker::new(auth, fetcher);

        let err = broker
            .fetch(&full_credential(Some("cached=1")))
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Transport(_)));
        assert_eq!(broker.authenticator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cookie_only_rejection_is_session_expired() {
        let auth = MockAuthenticator::ok("fresh=1");
        let fetcher = MockFetcher::scripted(vec![Err(MockFetcher::session_invalid())]);
        let broker = SessionBroker::new(auth, fetcher);

        let cred = Credential::cookie_only("13812345678", "manual=1");
        let err = broker.fetch(&cred).await.unwrap_err();
        assert!(matches!(err, MonitorError::SessionExpired));
        // No login path exists for this account
        assert_eq!(broker.authenticator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_login_failure_propagates() {
        let auth = MockAuthenticator::failing();
        let fetcher = MockFetcher::scripted(vec![Err(MockFetcher::session_invalid())]);
        let broker = SessionBroker::new(auth, fetcher);

        let err = broker
            .fetch(&full_credential(Some("stale=1")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MonitorError::AuthenticationFailed { status: 403, .. }
        ));
    }

    #[tokio::test]
    async fn test_full_mode_without_token_cannot_reauthenticate() {
        let auth = MockAuthenticator::ok("fresh=1");
        let fetcher = MockFetcher::scripted(vec![Err(MockFetcher::session_invalid())]);
        let broker = SessionBroker::new(auth, fetcher);

        let mut cred = full_credential(Some("stale=1"));
        cred.online_token = None;
        let err = broker.fetch(&cred).await.unwrap_err();
        assert!(matches!(
            err,
            MonitorError::AuthenticationFailed { status: 0, .. }
        ));
        assert_eq!(broker.authenticator.call_count(), 0);
    }
}
