//! Destination account and API credential provisioning.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{debug, info, instrument};

use padmigrate_core::AccountId;

use crate::error::StoreError;
use crate::ports::{AccountStore, NewAccount};

/// Token class of credentials issued for the migration tool.
pub const MIGRATION_TOKEN_TYPE: i32 = 4;

/// Length of generated API secrets.
pub const TOKEN_LENGTH: usize = 32;

/// A resolved value and whether this call created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned<T> {
    pub value: T,
    pub created: bool,
}

/// Account and credential for one destination email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioning {
    pub account_id: AccountId,
    pub account_created: bool,
    pub secret: String,
}

/// Idempotent get-or-create over the account store.
///
/// Calls for the same email are serialized within this process; the store
/// itself has no uniqueness constraint to fall back on.
pub struct AccountProvisioner {
    accounts: Arc<dyn AccountStore>,
    domain_id: i64,
    email_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AccountProvisioner {
    pub fn new(accounts: Arc<dyn AccountStore>, domain_id: i64) -> Self {
        Self {
            accounts,
            domain_id,
            email_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the account and credential for `email` under one lock.
    pub fn provision(&self, email: &str, display_name: &str) -> Result<Provisioning, StoreError> {
        let lease = self.email_lease(email);
        let _guard = lease.lock();

        let account = self.resolve_account(email, display_name)?;
        let secret = self.resolve_credential(account.value)?;
        Ok(Provisioning {
            account_id: account.value,
            account_created: account.created,
            secret,
        })
    }

    /// Return the account for `email`, creating it on first sight.
    pub fn get_or_create_account(
        &self,
        email: &str,
        display_name: &str,
    ) -> Result<Provisioned<AccountId>, StoreError> {
        let lease = self.email_lease(email);
        let _guard = lease.lock();
        self.resolve_account(email, display_name)
    }

    /// Return the migration-tool secret for `account_id`, generating and
    /// persisting one on first use.
    pub fn get_or_create_credential(&self, account_id: AccountId) -> Result<String, StoreError> {
        self.resolve_credential(account_id)
    }

    #[instrument(skip(self, display_name), fields(domain_id = self.domain_id))]
    fn resolve_account(
        &self,
        email: &str,
        display_name: &str,
    ) -> Result<Provisioned<AccountId>, StoreError> {
        if let Some(account_id) = self.accounts.find_account(email, self.domain_id)? {
            debug!(%account_id, "account exists");
            return Ok(Provisioned {
                value: account_id,
                created: false,
            });
        }

        let account_id = self.accounts.insert_account(&NewAccount {
            domain_id: self.domain_id,
            display_name: display_name.to_string(),
            email: email.to_string(),
        })?;
        info!(%account_id, "account created");
        Ok(Provisioned {
            value: account_id,
            created: true,
        })
    }

    fn resolve_credential(&self, account_id: AccountId) -> Result<String, StoreError> {
        if let Some(token) = self
            .accounts
            .find_credential(account_id, MIGRATION_TOKEN_TYPE)?
        {
            return Ok(token);
        }

        let token = generate_token();
        self.accounts
            .insert_credential(account_id, MIGRATION_TOKEN_TYPE, &token)?;
        info!(%account_id, "api credential issued");
        Ok(token)
    }

    fn email_lease(&self, email: &str) -> EmailLease<'_> {
        let key = email.trim().to_ascii_lowercase();
        let lock = self
            .email_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();
        EmailLease {
            locks: &self.email_locks,
            key,
            lock,
        }
    }

    #[cfg(test)]
    fn tracked_emails(&self) -> usize {
        self.email_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Shared handle on one email's lock. The map entry goes away with the last
/// lease.
struct EmailLease<'a> {
    locks: &'a Mutex<HashMap<String, Arc<Mutex<()>>>>,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl EmailLease<'_> {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for EmailLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(std::mem::take(&mut self.lock));
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::InMemoryAccountStore;
    use padmigrate_core::DEFAULT_DOMAIN_ID;
    use std::thread;

    #[test]
    fn existing_account_is_returned_without_writes() {
        let store = Arc::new(InMemoryAccountStore::new().with_account(
            "jane@x.com",
            DEFAULT_DOMAIN_ID,
            AccountId::new(7),
        ));
        let provisioner = AccountProvisioner::new(store.clone(), DEFAULT_DOMAIN_ID);

        for _ in 0..3 {
            let account = provisioner
                .get_or_create_account("jane@x.com", "Jane Doe")
                .unwrap();
            assert_eq!(account.value, AccountId::new(7));
            assert!(!account.created);
        }
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn new_account_is_created_once() {
        let store = Arc::new(InMemoryAccountStore::new());
        let provisioner = AccountProvisioner::new(store.clone(), DEFAULT_DOMAIN_ID);

        let first = provisioner
            .get_or_create_account("jane@x.com", "Jane Doe")
            .unwrap();
        let second = provisioner
            .get_or_create_account("jane@x.com", "Someone Else")
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.value, second.value);
        assert_eq!(store.writes(), 1);
        assert_eq!(
            store.account("jane@x.com", DEFAULT_DOMAIN_ID).unwrap().display_name,
            "Jane Doe"
        );
    }

    #[test]
    fn credential_is_stable_and_persisted_once() {
        let store = Arc::new(InMemoryAccountStore::new());
        let provisioner = AccountProvisioner::new(store.clone(), DEFAULT_DOMAIN_ID);
        let account_id = AccountId::new(11);

        let first = provisioner.get_or_create_credential(account_id).unwrap();
        let second = provisioner.get_or_create_credential(account_id).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), TOKEN_LENGTH);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn concurrent_provisioning_for_one_email_creates_one_account() {
        let store = Arc::new(InMemoryAccountStore::new());
        let provisioner = Arc::new(AccountProvisioner::new(store.clone(), DEFAULT_DOMAIN_ID));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provisioner = provisioner.clone();
                thread::spawn(move || provisioner.provision("jane@x.com", "Jane").unwrap())
            })
            .collect();
        let results: Vec<Provisioning> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|p| p.account_created).count(), 1);
        assert!(results.windows(2).all(|w| w[0].account_id == w[1].account_id));
        assert!(results.windows(2).all(|w| w[0].secret == w[1].secret));
        // one account row + one credential row
        assert_eq!(store.writes(), 2);
        assert_eq!(provisioner.tracked_emails(), 0);
    }

    #[test]
    fn email_locks_are_released_after_each_call() {
        let store = Arc::new(InMemoryAccountStore::new());
        let provisioner = AccountProvisioner::new(store, DEFAULT_DOMAIN_ID);

        for n in 0..5 {
            let email = format!("user{n}@x.com");
            provisioner.provision(&email, "User").unwrap();
            provisioner.get_or_create_account(&email, "User").unwrap();
        }

        assert_eq!(provisioner.tracked_emails(), 0);
    }
}
