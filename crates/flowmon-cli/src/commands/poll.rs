//! Poll command
//!
//! Runs a monitoring cycle for one or all registered accounts and prints
//! the resulting usage deltas.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{format_kb, print_error, print_info, print_rows};
use flowmon_core::{
    AccountStore, QuotaClient, SessionBroker, SessionClient, Snapshot, SnapshotStore, UsageMonitor,
};

/// Poll result row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct PollRow {
    #[tabled(rename = "Account")]
    pub account: String,
    #[tabled(rename = "Package")]
    pub package: String,
    #[tabled(rename = "Used")]
    pub used: String,
    #[tabled(rename = "Today")]
    pub today: String,
    #[tabled(rename = "Remain")]
    pub remain: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

impl PollRow {
    fn ok(snapshot: &Snapshot) -> Self {
        let traffic = snapshot.diff.all_traffic;
        Self {
            account: snapshot.account_id.clone(),
            package: snapshot.main_package.clone(),
            used: format_kb(traffic.used),
            today: format_kb(traffic.today),
            remain: format_kb(snapshot.buckets.all_traffic().remain),
            status: "ok".to_string(),
        }
    }

    fn failed(account: &str, error: impl std::fmt::Display) -> Self {
        Self {
            account: account.to_string(),
            package: "-".to_string(),
            used: "-".to_string(),
            today: "-".to_string(),
            remain: "-".to_string(),
            status: format!("failed: {}", error),
        }
    }
}

pub async fn execute(ctx: &Context, account: Option<String>, concurrency: usize) -> Result<()> {
    let store = AccountStore::new(ctx.db.pool.clone());

    let credentials = match account {
        Some(id) => vec![store.get(&id).await?],
        None => store.list().await?,
    };

    if credentials.is_empty() {
        print_info("No accounts registered. Add one with `flowmon account add`.", ctx.quiet);
        return Ok(());
    }

    print_info(
        &format!("Polling {} account(s)...", credentials.len()),
        ctx.quiet,
    );

    let monitor = Arc::new(
        UsageMonitor::new(
            SessionBroker::new(SessionClient::new(), QuotaClient::new()),
            SnapshotStore::new(ctx.db.pool.clone()),
            AccountStore::new(ctx.db.pool.clone()),
        )
        .with_worker_limit(concurrency),
    );

    let results = monitor.run_all(credentials).await;

    let mut rows = Vec::with_capacity(results.len());
    let mut failures = 0;
    for (account_id, result) in &results {
        match result {
            Ok(snapshot) => rows.push(PollRow::ok(snapshot)),
            Err(e) => {
                failures += 1;
                rows.push(PollRow::failed(account_id, e));
            }
        }
    }
    rows.sort_by(|a, b| a.account.cmp(&b.account));

    print_rows(&rows, ctx.format, "No results.")?;

    if failures > 0 {
        print_error(&format!("{} account(s) failed", failures));
    }
    Ok(())
}
