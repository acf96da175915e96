//! Account management service
//!
//! CRUD over the `accounts` table. Rows with an unparseable mode string
//! are skipped on list with a warning rather than failing the whole call.

use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::models::{AccountRow, Credential};

/// Storage layer for monitored accounts
pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace an account's credential record
    ///
    /// The cached cookie is preserved only through the credential itself;
    /// upserting with `cached_cookie: None` clears any stored cookie.
    pub async fn upsert(&self, credential: &Credential) -> Result<()> {
        if credential.account_id.is_empty() {
            return Err(Error::validation("account id cannot be empty"));
        }

        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, mode, app_id, online_token, cached_cookie, updated_at)
            VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(account_id) DO UPDATE SET
                mode = excluded.mode,
                app_id = excluded.app_id,
                online_token = excluded.online_token,
                cached_cookie = excluded.cached_cookie,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&credential.account_id)
        .bind(credential.mode.to_string())
        .bind(&credential.app_id)
        .bind(&credential.online_token)
        .bind(&credential.cached_cookie)
        .execute(&self.pool)
        .await?;

        log::info!("[accounts] upserted account {}", credential.account_id);
        Ok(())
    }

    /// All registered accounts, ordered by account id
    pub async fn list(&self) -> Result<Vec<Credential>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT account_id, mode, app_id, online_token, cached_cookie, created_at
            FROM accounts
            ORDER BY account_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut credentials = Vec::with_capacity(rows.len());
        for row in rows {
            match row.to_credential() {
                Some(cred) => credentials.push(cred),
                None => log::warn!(
                    "[accounts] skipping account {} with unknown mode '{}'",
                    row.account_id,
                    row.mode
                ),
            }
        }
        Ok(credentials)
    }

    /// Look up one account by id
    pub async fn get(&self, account_id: &str) -> Result<Credential> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT account_id, mode, app_id, online_token, cached_cookie, created_at
            FROM accounts
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.and_then(|r| r.to_credential())
            .ok_or_else(|| Error::not_found(format!("account {} not found", account_id)))
    }

    /// Remove an account and its stored snapshots
    pub async fn remove(&self, account_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM usage_snapshots WHERE account_id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        let result = sqlx::query("DELETE FROM accounts WHERE account_id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("account {} not found", account_id)));
        }

        log::info!("[accounts] removed account {}", account_id);
        Ok(())
    }

    /// Persist a refreshed session cookie for an account
    pub async fn update_cookie(&self, account_id: &str, cookie: &str) -> Result<()> {
        sqlx::query(
            "UPDATE accounts SET cached_cookie = ?, updated_at = CURRENT_TIMESTAMP WHERE account_id = ?",
        )
        .bind(cookie)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        log::debug!("[accounts] refreshed cached cookie for {}", account_id);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::CredentialMode;

    async fn test_store() -> (tempfile::TempDir, AccountStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).await.unwrap();
        (dir, AccountStore::new(db.pool))
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let (_dir, store) = test_store().await;

        let cred = Credential::full("13812345678", "app-1", "secret");
        store.upsert(&cred).await.unwrap();

        let loaded = store.get("13812345678").await.unwrap();
        assert_eq!(loaded.mode, CredentialMode::Full);
        assert_eq!(loaded.app_id.as_deref(), Some("app-1"));
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let (_dir, store) = test_store().await;

        store
            .upsert(&Credential::full("13812345678", "app-1", "secret"))
            .await
            .unwrap();
        store
            .upsert(&Credential::cookie_only("13812345678", "JSESSIONID=abc"))
            .await
            .unwrap();

        let loaded = store.get("13812345678").await.unwrap();
        assert_eq!(loaded.mode, CredentialMode::CookieOnly);
        assert!(loaded.app_id.is_none());
        assert_eq!(loaded.cached_cookie.as_deref(), Some("JSESSIONID=abc"));

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_account_id_rejected() {
        let (_dir, store) = test_store().await;
        let mut cred = Credential::full("x", "app", "token");
        cred.account_id = String::new();
        assert!(store.upsert(&cred).await.is_err());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, store) = test_store().await;
        assert!(store.get("10000000000").await.is_err());
    }

    #[tokio::test]
    async fn test_remove() {
        let (_dir, store) = test_store().await;
        store
            .upsert(&Credential::full("13812345678", "app-1", "secret"))
            .await
            .unwrap();
        store.remove("13812345678").await.unwrap();
        assert!(store.get("13812345678").await.is_err());
        assert!(store.remove("13812345678").await.is_err());
    }

    #[tokio::test]
    async fn test_update_cookie() {
        let (_dir, store) = test_store().await;
        store
            .upsert(&Credential::full("13812345678", "app-1", "secret"))
            .await
            .unwrap();
        store.update_cookie("13812345678", "fresh=1").await.unwrap();

        let loaded = store.get("13812345678").await.unwrap();
        assert_eq!(loaded.cached_cookie.as_deref(), Some("fresh=1"));
    }

    #[tokio::test]
    async fn test_list_ordering() {
        let (_dir, store) = test_store().await;
        store
            .upsert(&Credential::full("13900001111", "b", "b"))
            .await
            .unwrap();
        store
            .upsert(&Credential::full("13812345678", "a", "a"))
            .await
            .unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all[0].account_id, "13812345678");
        assert_eq!(all[1].account_id, "13900001111");
    }
}
