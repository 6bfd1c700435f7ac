//! File-backed account → client id table.
//!
//! One table exists per encryption key, stored as
//! `<dir>/<encryption_key>` with one `"<account_id> <client_id>"` pair per
//! line. The file is maintained elsewhere and re-read on every lookup.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use padmigrate_core::{AccountId, ClientId};
use padmigrate_migration::StoreError;
use padmigrate_migration::ports::ClientIdLookup;

#[derive(Debug, Clone)]
pub struct FileClientIdTable {
    path: PathBuf,
}

impl FileClientIdTable {
    pub fn new(dir: impl AsRef<Path>, encryption_key: &str) -> Self {
        Self {
            path: dir.as_ref().join(encryption_key),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Find `account_id` in table text. Malformed lines are ignored.
fn lookup(table: &str, account_id: AccountId) -> Option<ClientId> {
    table.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let id = fields.next()?.parse::<AccountId>().ok()?;
        let client_id = fields.next()?;
        if id != account_id {
            return None;
        }
        ClientId::new(client_id).ok()
    })
}

impl ClientIdLookup for FileClientIdTable {
    fn client_id(&self, account_id: AccountId) -> Result<Option<ClientId>, StoreError> {
        let table = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                StoreError::Lookup(format!("client id table {} is missing", self.path.display()))
            }
            _ => StoreError::Lookup(format!(
                "client id table {} unreadable: {e}",
                self.path.display()
            )),
        })?;

        let found = lookup(&table, account_id);
        debug!(%account_id, found = found.is_some(), "client id lookup");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "1 c-one\n\n42   c-forty-two\nnot-a-number c-x\n7\n1000 c-thousand\n";

    #[test]
    fn finds_matching_row() {
        assert_eq!(
            lookup(TABLE, AccountId::new(42)),
            Some(ClientId::new("c-forty-two").unwrap())
        );
        assert_eq!(
            lookup(TABLE, AccountId::new(1000)),
            Some(ClientId::new("c-thousand").unwrap())
        );
    }

    #[test]
    fn absent_or_incomplete_row_is_none() {
        assert_eq!(lookup(TABLE, AccountId::new(5)), None);
        assert_eq!(lookup(TABLE, AccountId::new(7)), None);
    }

    #[test]
    fn table_is_read_from_key_named_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("key-2024"), TABLE).unwrap();
        let table = FileClientIdTable::new(dir.path(), "key-2024");

        assert_eq!(
            table.client_id(AccountId::new(1)).unwrap(),
            Some(ClientId::new("c-one").unwrap())
        );
        assert_eq!(table.client_id(AccountId::new(2)).unwrap(), None);
    }

    #[test]
    fn missing_table_is_a_lookup_error() {
        let dir = tempfile::tempdir().unwrap();
        let table = FileClientIdTable::new(dir.path(), "absent");

        let err = table.client_id(AccountId::new(1)).unwrap_err();
        assert!(matches!(err, StoreError::Lookup(msg) if msg.contains("missing")));
    }
}
