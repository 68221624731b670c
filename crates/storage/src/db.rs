//! redb-backed store: one ACID `kv` table in an embedded database.
//!
//! Every `set` is its own committed write transaction; `set_many`
//! batches the group into a single transaction, which is the one-flush
//! optimization the custodian uses when sealing an identity.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use fabvault_common::{Error, Result};

use crate::KeyStore;

const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open (or create) the database at `path`. The table is created
    /// up front so read transactions never observe a missing table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::store)?;
        }
        let db = Database::create(path).map_err(Error::store)?;

        let write_txn = db.begin_write().map_err(Error::store)?;
        {
            let _ = write_txn.open_table(KV).map_err(Error::store)?;
        }
        write_txn.commit().map_err(Error::store)?;

        Ok(RedbStore { db })
    }
}

impl KeyStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read().map_err(Error::store)?;
        let table = read_txn.open_table(KV).map_err(Error::store)?;
        let value = table
            .get(key)
            .map_err(Error::store)?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(Error::store)?;
        {
            let mut table = write_txn.open_table(KV).map_err(Error::store)?;
            for (key, value) in entries {
                table.insert(*key, *value).map_err(Error::store)?;
            }
        }
        write_txn.commit().map_err(Error::store)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(Error::store)?;
        {
            let mut table = write_txn.open_table(KV).map_err(Error::store)?;
            table.remove(key).map_err(Error::store)?;
        }
        write_txn.commit().map_err(Error::store)?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let read_txn = self.db.begin_read().map_err(Error::store)?;
        let table = read_txn.open_table(KV).map_err(Error::store)?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(Error::store)? {
            let (key, _) = entry.map_err(Error::store)?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }

    fn clear(&self) -> Result<()> {
        let keys = self.keys()?;
        let write_txn = self.db.begin_write().map_err(Error::store)?;
        {
            let mut table = write_txn.open_table(KV).map_err(Error::store)?;
            for key in &keys {
                table.remove(key.as_str()).map_err(Error::store)?;
            }
        }
        write_txn.commit().map_err(Error::store)?;
        Ok(())
    }
}
