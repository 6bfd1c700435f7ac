//! Account → public client id lookup.

use std::collections::HashMap;

use padmigrate_core::{AccountId, ClientId};

use crate::error::StoreError;

/// Read-only mapping maintained outside this system (one table per
/// encryption key).
pub trait ClientIdLookup: Send + Sync {
    fn client_id(&self, account_id: AccountId) -> Result<Option<ClientId>, StoreError>;
}

/// Fixed lookup table for tests/dev.
#[derive(Debug, Default, Clone)]
pub struct InMemoryClientIds {
    entries: HashMap<AccountId, ClientId>,
}

impl InMemoryClientIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, account_id: AccountId, client_id: ClientId) -> Self {
        self.entries.insert(account_id, client_id);
        self
    }
}

impl ClientIdLookup for InMemoryClientIds {
    fn client_id(&self, account_id: AccountId) -> Result<Option<ClientId>, StoreError> {
        Ok(self.entries.get(&account_id).cloned())
    }
}
