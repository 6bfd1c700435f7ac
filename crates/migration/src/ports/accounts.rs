//! Account and credential persistence.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use padmigrate_core::AccountId;

use crate::error::StoreError;

/// Row data for a new destination account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub domain_id: i64,
    pub display_name: String,
    pub email: String,
}

/// Relational account/credential store.
///
/// Uniqueness is not enforced here; callers read before they write.
pub trait AccountStore: Send + Sync {
    /// Find the account for `(email, domain_id)`.
    fn find_account(&self, email: &str, domain_id: i64) -> Result<Option<AccountId>, StoreError>;

    /// Insert a new account row and return its id.
    fn insert_account(&self, account: &NewAccount) -> Result<AccountId, StoreError>;

    /// Find the API token for `(account_id, token_type)`.
    fn find_credential(
        &self,
        account_id: AccountId,
        token_type: i32,
    ) -> Result<Option<String>, StoreError>;

    /// Persist an API token for `(account_id, token_type)`.
    fn insert_credential(
        &self,
        account_id: AccountId,
        token_type: i32,
        token: &str,
    ) -> Result<(), StoreError>;
}

/// In-memory account store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<(String, i64), (AccountId, NewAccount)>>,
    credentials: RwLock<HashMap<(AccountId, i32), String>>,
    next_id: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing account (not counted as a write).
    pub fn with_account(self, email: &str, domain_id: i64, account_id: AccountId) -> Self {
        let account = NewAccount {
            domain_id,
            display_name: email.to_string(),
            email: email.to_string(),
        };
        self.accounts
            .write()
            .unwrap()
            .insert((email.to_string(), domain_id), (account_id, account));
        self
    }

    /// Number of insert calls performed so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Stored account row, if any.
    pub fn account(&self, email: &str, domain_id: i64) -> Option<NewAccount> {
        self.accounts
            .read()
            .unwrap()
            .get(&(email.to_string(), domain_id))
            .map(|(_, row)| row.clone())
    }
}

impl AccountStore for InMemoryAccountStore {
    fn find_account(&self, email: &str, domain_id: i64) -> Result<Option<AccountId>, StoreError> {
        let accounts = self.accounts.read().unwrap();
        Ok(accounts
            .get(&(email.to_string(), domain_id))
            .map(|(id, _)| *id))
    }

    fn insert_account(&self, account: &NewAccount) -> Result<AccountId, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let id = AccountId::new(1000 + self.next_id.fetch_add(1, Ordering::SeqCst) as i64);
        self.accounts.write().unwrap().insert(
            (account.email.clone(), account.domain_id),
            (id, account.clone()),
        );
        Ok(id)
    }

    fn find_credential(
        &self,
        account_id: AccountId,
        token_type: i32,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .credentials
            .read()
            .unwrap()
            .get(&(account_id, token_type))
            .cloned())
    }

    fn insert_credential(
        &self,
        account_id: AccountId,
        token_type: i32,
        token: &str,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.credentials
            .write()
            .unwrap()
            .insert((account_id, token_type), token.to_string());
        Ok(())
    }
}
