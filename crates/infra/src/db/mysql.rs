//! MySQL-backed account and credential store.
//!
//! Works against the destination platform's existing tables:
//!
//! - `pro_accounts(id, domainId, fullName, email, createdDate, lastLoginDate, isAdmin, isDeleted, …)`
//! - `pro_tokens(userId, tokenType, token, expirationDate)`
//!
//! Neither table carries a uniqueness constraint on the columns looked up
//! here; callers must read before they write.
//!
//! ## Thread Safety
//!
//! The store owns a small Tokio runtime and blocks on each query, so it can
//! be shared by plain worker threads. It must not be called from inside an
//! async context.

use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::Row;
use tokio::runtime::Runtime;
use tracing::{debug, instrument};

use padmigrate_core::AccountId;
use padmigrate_migration::StoreError;
use padmigrate_migration::ports::{AccountStore, NewAccount};

pub struct MySqlAccountStore {
    pool: MySqlPool,
    runtime: Runtime,
}

impl MySqlAccountStore {
    /// Connect to `database_url` with at most `max_connections` pooled
    /// connections.
    pub fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("padmigrate-mysql")
            .enable_all()
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let pool = runtime
            .block_on(
                MySqlPoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect(database_url),
            )
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { pool, runtime })
    }
}

impl AccountStore for MySqlAccountStore {
    #[instrument(skip(self), err)]
    fn find_account(&self, email: &str, domain_id: i64) -> Result<Option<AccountId>, StoreError> {
        let row = self
            .runtime
            .block_on(
                sqlx::query(
                    "SELECT CAST(id AS SIGNED) AS id FROM pro_accounts \
                     WHERE email = ? AND domainId = ? LIMIT 1",
                )
                .bind(email)
                .bind(domain_id)
                .fetch_optional(&self.pool),
            )
            .map_err(|e| StoreError::Lookup(e.to_string()))?;

        row.map(|row| row.try_get::<i64, _>("id").map(AccountId::new))
            .transpose()
            .map_err(|e| StoreError::Lookup(e.to_string()))
    }

    #[instrument(skip(self, account), fields(domain_id = account.domain_id), err)]
    fn insert_account(&self, account: &NewAccount) -> Result<AccountId, StoreError> {
        let result = self
            .runtime
            .block_on(
                sqlx::query(
                    "INSERT INTO pro_accounts \
                     (domainId, fullName, email, createdDate, lastLoginDate, isAdmin, isDeleted) \
                     VALUES (?, ?, ?, NOW(), NOW(), 0, 0)",
                )
                .bind(account.domain_id)
                .bind(&account.display_name)
                .bind(&account.email)
                .execute(&self.pool),
            )
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        let id = i64::try_from(result.last_insert_id())
            .map_err(|e| StoreError::Persistence(format!("account id out of range: {e}")))?;
        debug!(account_id = id, "pro_accounts row inserted");
        Ok(AccountId::new(id))
    }

    #[instrument(skip(self), err)]
    fn find_credential(
        &self,
        account_id: AccountId,
        token_type: i32,
    ) -> Result<Option<String>, StoreError> {
        let row = self
            .runtime
            .block_on(
                sqlx::query(
                    "SELECT token FROM pro_tokens WHERE userId = ? AND tokenType = ? LIMIT 1",
                )
                .bind(account_id.get())
                .bind(token_type)
                .fetch_optional(&self.pool),
            )
            .map_err(|e| StoreError::Lookup(e.to_string()))?;

        row.map(|row| row.try_get::<String, _>("token"))
            .transpose()
            .map_err(|e| StoreError::Lookup(e.to_string()))
    }

    #[instrument(skip(self, token), err)]
    fn insert_credential(
        &self,
        account_id: AccountId,
        token_type: i32,
        token: &str,
    ) -> Result<(), StoreError> {
        self.runtime
            .block_on(
                sqlx::query(
                    "INSERT INTO pro_tokens (userId, tokenType, token, expirationDate) \
                     VALUES (?, ?, ?, NULL)",
                )
                .bind(account_id.get())
                .bind(token_type)
                .bind(token)
                .execute(&self.pool),
            )
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        Ok(())
    }
}

impl std::fmt::Debug for MySqlAccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlAccountStore")
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}
