//! Snapshot inspection commands
//!
//! `latest` shows the newest snapshot per account; `history` lists an
//! account's snapshots over a time window.

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{format_kb, print_rows};
use flowmon_core::{AccountStore, Snapshot, SnapshotStore};

/// Snapshot row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct SnapshotRow {
    #[tabled(rename = "Account")]
    pub account: String,
    #[tabled(rename = "Date")]
    pub date: String,
    #[tabled(rename = "Time")]
    pub time: String,
    #[tabled(rename = "Package")]
    pub package: String,
    #[tabled(rename = "Used")]
    pub used: String,
    #[tabled(rename = "Today")]
    pub today: String,
    #[tabled(rename = "Remain")]
    pub remain: String,
}

impl From<&Snapshot> for SnapshotRow {
    fn from(snapshot: &Snapshot) -> Self {
        let time = chrono::DateTime::<chrono::Utc>::from_timestamp(snapshot.timestamp, 0)
            .map(|dt| dt.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let traffic = snapshot.diff.all_traffic;

        Self {
            account: snapshot.account_id.clone(),
            date: snapshot.date.clone(),
            time,
            package: snapshot.main_package.clone(),
            used: format_kb(traffic.used),
            today: format_kb(traffic.today),
            remain: format_kb(snapshot.buckets.all_traffic().remain),
        }
    }
}

pub async fn latest(ctx: &Context, account: Option<String>) -> Result<()> {
    let accounts = AccountStore::new(ctx.db.pool.clone());
    let store = SnapshotStore::new(ctx.db.pool.clone());

    let ids: Vec<String> = match account {
        Some(id) => vec![id],
        None => accounts
            .list()
            .await?
            .into_iter()
            .map(|c| c.account_id)
            .collect(),
    };

    let mut rows = Vec::new();
    for id in &ids {
        if let Some(snapshot) = store.load_latest(id).await? {
            rows.push(SnapshotRow::from(&snapshot));
        }
    }

    print_rows(&rows, ctx.format, "No snapshots recorded yet.")
}

pub async fn history(ctx: &Context, account: &str, days: i64) -> Result<()> {
    let store = SnapshotStore::new(ctx.db.pool.clone());
    let snapshots = store.history(account, days).await?;
    let rows: Vec<SnapshotRow> = snapshots.iter().map(SnapshotRow::from).collect();
    print_rows(&rows, ctx.format, "No snapshots in this window.")
}
