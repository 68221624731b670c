//! # Fabvault Storage Crate
//!
//! Opaque key/value persistence consumed by the identity custodian.
//! The custodian never cares where sealed material lives; it talks to
//! the [`KeyStore`] contract and any conforming backend will do.
//!
//! ## Backends
//! - [`FileStore`]: single JSON document on disk, written atomically
//!   with owner-only permissions
//! - [`RedbStore`]: embedded ACID database, one key/value table
//! - [`MemoryStore`]: process-local map for tests
//!
//! All backends round-trip binary values losslessly and make each
//! `set` atomic per key: a crash mid-write leaves the old value or the
//! new one, never torn bytes.

pub mod db;
pub mod file;
pub mod mem;

pub use db::RedbStore;
pub use file::FileStore;
pub use mem::MemoryStore;

use fabvault_common::Result;

/// Contract every persistence backend satisfies.
///
/// `set` must be durable by the time it returns. `set_many` exists so a
/// backend can flush a group of writes once; the default simply loops.
pub trait KeyStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;

    fn clear(&self) -> Result<()>;
}
