//! Prune command
//!
//! Deletes stored snapshots older than the retention window for every
//! registered account.

use anyhow::Result;

use super::Context;
use crate::output::print_success;
use flowmon_core::{AccountStore, SnapshotStore};

pub async fn execute(ctx: &Context, days: i64) -> Result<()> {
    let accounts = AccountStore::new(ctx.db.pool.clone());
    let store = SnapshotStore::new(ctx.db.pool.clone());

    let cutoff = chrono::Utc::now().timestamp() - days * 86_400;

    let mut total = 0u64;
    for credential in accounts.list().await? {
        total += store.prune(&credential.account_id, cutoff).await?;
    }

    print_success(
        &format!("Pruned {} snapshot(s) older than {} days", total, days),
        ctx.quiet,
    );
    Ok(())
}
