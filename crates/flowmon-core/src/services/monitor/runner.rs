//! Monitoring cycle runner
//!
//! Drives the full per-account cycle:
//!
//! ```text
//! credential -> broker (session + query) -> normalize -> buckets
//!            -> diff vs latest snapshot -> save -> prune -> notify
//! ```
//!
//! Cycles for different accounts run concurrently under a semaphore;
//! cycles for the same account are serialized through a per-account lock
//! so two overlapping polls can never interleave their load/save pair.
//! Each cycle is wrapped in an overall timeout so one hung connection
//! cannot stall a whole polling round.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use super::broker::{Authenticator, ReportFetcher, SessionBroker};
use super::buckets::BucketSet;
use super::delta::compute_diff;
use super::error::MonitorError;
use super::report::normalize;
use super::store::{Snapshot, SnapshotStore, RETENTION_DAYS};
use crate::models::Credential;
use crate::services::accounts::AccountStore;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for one account's full cycle, seconds
pub const CYCLE_TIMEOUT_SECS: u64 = 60;

/// Default number of accounts polled concurrently
pub const DEFAULT_WORKER_LIMIT: usize = 4;

// ============================================================================
// Notification
// ============================================================================

/// Receives the outcome of each completed cycle
///
/// Implementations must not block; they run inline on the cycle task.
pub trait NotificationDispatcher: Send + Sync {
    fn on_snapshot(&self, snapshot: &Snapshot);
    fn on_failure(&self, account_id: &str, error: &MonitorError);
}

/// Dispatcher that reports outcomes through the log
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn on_snapshot(&self, snapshot: &Snapshot) {
        let traffic = snapshot.diff.all_traffic;
        log::info!(
            "[monitor:runner] {} used {:.1} KB since last check ({:.1} KB today)",
            snapshot.account_id,
            traffic.used,
            traffic.today
        );
    }

    fn on_failure(&self, account_id: &str, error: &MonitorError) {
        log::warn!("[monitor:runner] cycle failed for {}: {}", account_id, error);
    }
}

// ============================================================================
// UsageMonitor
// ============================================================================

/// Orchestrates monitoring cycles across all accounts
pub struct UsageMonitor<A, F> {
    broker: SessionBroker<A, F>,
    store: SnapshotStore,
    accounts: AccountStore,
    dispatcher: Box<dyn NotificationDispatcher>,
    worker_limit: usize,
    cycle_timeout: Duration,
    // One lock per account id, created lazily
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<A: Authenticator + 'static, F: ReportFetcher + 'static> UsageMonitor<A, F> {
    pub fn new(
        broker: SessionBroker<A, F>,
        store: SnapshotStore,
        accounts: AccountStore,
    ) -> Self {
        Self {
            broker,
            store,
            accounts,
            dispatcher: Box::new(LogDispatcher),
            worker_limit: DEFAULT_WORKER_LIMIT,
            cycle_timeout: Duration::from_secs(CYCLE_TIMEOUT_SECS),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Box<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_worker_limit(mut self, limit: usize) -> Self {
        self.worker_limit = limit.max(1);
        self
    }

    #[cfg(test)]
    fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = timeout;
        self
    }

    async fn account_lock(&self, account_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run one full monitoring cycle for an account
    ///
    /// Serialized per account and bounded by the cycle timeout. On success
    /// the new snapshot is returned; the outcome is also handed to the
    /// dispatcher either way.
    pub async fn run_cycle(&self, credential: &Credential) -> Result<Snapshot, MonitorError> {
        let lock = self.account_lock(&credential.account_id).await;
        let _guard = lock.lock().await;

        let result = tokio::time::timeout(self.cycle_timeout, self.cycle_inner(credential))
            .await
            .unwrap_or_else(|_| {
                Err(MonitorError::Transport(format!(
                    "cycle exceeded {}s",
                    self.cycle_timeout.as_secs()
                )))
            });

        match &result {
            Ok(snapshot) => self.dispatcher.on_snapshot(snapshot),
            Err(e) => self.dispatcher.on_failure(&credential.account_id, e),
        }
        result
    }

    async fn cycle_inner(&self, credential: &Credential) -> Result<Snapshot, MonitorError> {
        log::debug!("[monitor:runner] starting cycle for {}", credential.account_id);

        let outcome = self.broker.fetch(credential).await?;
        let packages = normalize(&outcome.report, &credential.account_id);
        let buckets = BucketSet::from_packages(&packages);

        let now = chrono::Utc::now().timestamp();
        let previous = self.store.load_latest(&credential.account_id).await?;
        let diff = compute_diff(&buckets, now, previous.as_ref());

        let snapshot = Snapshot::new(
            &credential.account_id,
            now,
            &outcome.report.main_package_name,
            buckets,
            diff,
            packages,
        );
        self.store.save(&snapshot).await?;
        self.store
            .prune(&credential.account_id, now - RETENTION_DAYS * 86_400)
            .await?;

        if outcome.cookie_updated {
            // Keep the fresh cookie for the next cycle; a write failure
            // only costs one extra login later.
            if let Err(e) = self
                .accounts
                .update_cookie(&credential.account_id, &outcome.cookie)
                .await
            {
                log::warn!(
                    "[monitor:runner] could not persist refreshed cookie for {}: {}",
                    credential.account_id,
                    e
                );
            }
        }

        Ok(snapshot)
    }

    /// Run cycles for many accounts with bounded concurrency
    ///
    /// Returns one (account id, outcome) pair per input credential, in
    /// completion order.
    pub async fn run_all(
        self: Arc<Self>,
        credentials: Vec<Credential>,
    ) -> Vec<(String, Result<Snapshot, MonitorError>)> {
        let semaphore = Arc::new(Semaphore::new(self.worker_limit));
        let mut tasks = JoinSet::new();

        for credential in credentials {
            let monitor = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire().await;
                let result = monitor.run_cycle(&credential).await;
                (credential.account_id, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => results.push(pair),
                Err(e) => log::warn!("[monitor:runner] cycle task panicked: {}", e),
            }
        }
        results
    }
}

// ============================================================================
// Tests
// ============================================================================
