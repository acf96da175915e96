//! Account management commands
//!
//! Register, list and remove monitored accounts, and patch in a manually
//! captured session cookie.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{print_rows, print_success};
use flowmon_core::{AccountStore, Credential};

#[derive(Subcommand)]
pub enum AccountAction {
    /// Register an account with full login credentials
    Add {
        /// Subscriber phone number
        account: String,

        /// Application id used for login
        #[arg(long)]
        app_id: String,

        /// Online token used for login
        #[arg(long)]
        token: String,
    },

    /// Register an account with only a captured session cookie
    AddCookie {
        /// Subscriber phone number
        account: String,

        /// Session cookie string ("name=value; name2=value2")
        #[arg(long)]
        cookie: String,
    },

    /// List all registered accounts
    List,

    /// Remove an account and its snapshot history
    Remove {
        /// Subscriber phone number
        account: String,
    },

    /// Replace the cached session cookie for an account
    SetCookie {
        /// Subscriber phone number
        account: String,

        /// Session cookie string
        #[arg(long)]
        cookie: String,
    },
}

/// Account row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct AccountTableRow {
    #[tabled(rename = "Account")]
    pub account: String,
    #[tabled(rename = "Mode")]
    pub mode: String,
    #[tabled(rename = "Cookie")]
    pub cookie: String,
}

pub async fn execute(ctx: &Context, action: AccountAction) -> Result<()> {
    let store = AccountStore::new(ctx.db.pool.clone());

    match action {
        AccountAction::Add {
            account,
            app_id,
            token,
        } => {
            store
                .upsert(&Credential::full(&account, app_id, token))
                .await?;
            print_success(&format!("Registered account {}", account), ctx.quiet);
            Ok(())
        }
        AccountAction::AddCookie { account, cookie } => {
            store
                .upsert(&Credential::cookie_only(&account, cookie))
                .await?;
            print_success(
                &format!("Registered cookie-only account {}", account),
                ctx.quiet,
            );
            Ok(())
        }
        AccountAction::List => list_accounts(ctx, &store).await,
        AccountAction::Remove { account } => {
            store.remove(&account).await?;
            print_success(&format!("Removed account {}", account), ctx.quiet);
            Ok(())
        }
        AccountAction::SetCookie { account, cookie } => {
            // Fails if the account does not exist; update_cookie alone
            // would silently update zero rows.
            store.get(&account).await?;
            store.update_cookie(&account, &cookie).await?;
            print_success(&format!("Updated cookie for {}", account), ctx.quiet);
            Ok(())
        }
    }
}

async fn list_accounts(ctx: &Context, store: &AccountStore) -> Result<()> {
    let accounts = store.list().await?;
    let rows: Vec<AccountTableRow> = accounts
        .into_iter()
        .map(|cred| AccountTableRow {
            account: cred.account_id,
            mode: cred.mode.to_string(),
            cookie: match cred.cached_cookie {
                Some(_) => "cached".to_string(),
                None => "-".to_string(),
            },
        })
        .collect();

    print_rows(&rows, ctx.format, "No accounts registered.")
}
