//! File-backed store: one JSON document mapping keys to base64 values.
//!
//! Writes go to a temp file that is fsynced and renamed over the
//! target, so readers observe the old document or the new one and
//! nothing in between. On Unix the document is owner-only (0600); it
//! holds AEAD ciphertext and salts, not plaintext keys, but there is no
//! reason to share it.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use parking_lot::Mutex;

use fabvault_common::{Error, Result};

use crate::KeyStore;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl FileStore {
    /// Open the store at `path`, loading the existing document if one
    /// is present. Parent directories are created as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::store)?;
        }

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => decode_document(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::store(e)),
        };

        Ok(FileStore {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Serialize the map and atomically replace the document.
    fn flush(&self, entries: &BTreeMap<String, Vec<u8>>) -> Result<()> {
        let encoded: BTreeMap<&str, String> = entries
            .iter()
            .map(|(k, v)| (k.as_str(), general_purpose::STANDARD.encode(v)))
            .collect();
        let raw = serde_json::to_string_pretty(&encoded).map_err(Error::store)?;

        let tmp = self.path.with_extension("tmp");
        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)
                .map_err(Error::store)?;
            restrict_permissions(&f)?;
            f.write_all(raw.as_bytes()).map_err(Error::store)?;
            f.sync_all().map_err(Error::store)?;
        }
        fs::rename(&tmp, &self.path).map_err(Error::store)?;
        Ok(())
    }
}

fn decode_document(raw: &str) -> Result<BTreeMap<String, Vec<u8>>> {
    let encoded: BTreeMap<String, String> = serde_json::from_str(raw)
        .map_err(|e| Error::store(format!("store document is not valid JSON: {e}")))?;
    let mut entries = BTreeMap::new();
    for (key, value) in encoded {
        let bytes = general_purpose::STANDARD
            .decode(value)
            .map_err(|e| Error::store(format!("value for '{key}' is not valid base64: {e}")))?;
        entries.insert(key, bytes);
    }
    Ok(entries)
}

#[cfg(unix)]
fn restrict_permissions(f: &File) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    f.set_permissions(fs::Permissions::from_mode(0o600))
        .map_err(Error::store)
}

#[cfg(not(unix))]
fn restrict_permissions(_f: &File) -> Result<()> {
    Ok(())
}

impl KeyStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_vec());
        self.flush(&entries)
    }

    fn set_many(&self, pairs: &[(&str, &[u8])]) -> Result<()> {
        let mut entries = self.entries.lock();
        for (key, value) in pairs {
            entries.insert((*key).to_string(), value.to_vec());
        }
        self.flush(&entries)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.clear();
        self.flush(&entries)
    }
}
