//! Sealing and unsealing of the private key PEM.
//!
//! The sealed record is four key/value entries written together:
//! AES-256-GCM ciphertext of the key PEM, the user certificate, the
//! PBKDF2 salt and the AEAD IV. All four present is a sealed identity;
//! all four absent is an empty slot; anything in between is corruption.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use zeroize::Zeroizing;

use fabvault_common::{Error, Result};
use fabvault_storage::KeyStore;

/// PBKDF2-HMAC-SHA256 iteration count. Fixed: changing it invalidates
/// every sealed record in the field.
pub const PBKDF2_ITERATIONS: u32 = 250_000;

pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 12;

/// KeyStore keys of the password slot.
pub const KEY_ENCRYPTED_PRIVATE_KEY: &str = "pbe-fabric-encrypted-private-key";
pub const KEY_USER_CERTIFICATE: &str = "pbe-fabric-user-certificate";
pub const KEY_KDF_SALT: &str = "pbe-fabric-key-derivation-salt";
pub const KEY_ENCRYPTION_IV: &str = "pbe-fabric-encryption-iv";

/// KeyStore key of the hardware slot overlay.
pub const KEY_HW_CREDENTIAL_ID: &str = "hw-fabric-credential-id";

/// The persisted form of a password-sealed identity.
#[derive(Clone)]
pub struct SealedIdentity {
    pub encrypted_key: Vec<u8>,
    pub certificate_pem: String,
    pub salt: [u8; SALT_LEN],
    pub iv: [u8; IV_LEN],
}

impl std::fmt::Debug for SealedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedIdentity")
            .field("encrypted_key_len", &self.encrypted_key.len())
            .field("certificate_len", &self.certificate_pem.len())
            .finish_non_exhaustive()
    }
}

impl SealedIdentity {
    /// Load the sealed record. `Ok(None)` when no field is present,
    /// `StoreCorrupt` when only some are.
    pub fn load(store: &dyn KeyStore) -> Result<Option<Self>> {
        let fields = (
            store.get(KEY_ENCRYPTED_PRIVATE_KEY)?,
            store.get(KEY_USER_CERTIFICATE)?,
            store.get(KEY_KDF_SALT)?,
            store.get(KEY_ENCRYPTION_IV)?,
        );
        let (encrypted_key, certificate, salt, iv) = match fields {
            (None, None, None, None) => return Ok(None),
            (Some(k), Some(c), Some(s), Some(i)) => (k, c, s, i),
            _ => {
                return Err(Error::StoreCorrupt(
                    "sealed record is only partially present".to_string(),
                ))
            }
        };

        let salt: [u8; SALT_LEN] = salt.as_slice().try_into().map_err(|_| {
            Error::StoreCorrupt(format!("salt has {} bytes, expected {SALT_LEN}", salt.len()))
        })?;
        let iv: [u8; IV_LEN] = iv.as_slice().try_into().map_err(|_| {
            Error::StoreCorrupt(format!("iv has {} bytes, expected {IV_LEN}", iv.len()))
        })?;
        let certificate_pem = String::from_utf8(certificate)
            .map_err(|_| Error::StoreCorrupt("certificate is not valid UTF-8".to_string()))?;

        Ok(Some(SealedIdentity {
            encrypted_key,
            certificate_pem,
            salt,
            iv,
        }))
    }

    /// Persist all four fields in one flush.
    pub fn store(&self, store: &dyn KeyStore) -> Result<()> {
        store.set_many(&[
            (KEY_ENCRYPTED_PRIVATE_KEY, self.encrypted_key.as_slice()),
            (KEY_USER_CERTIFICATE, self.certificate_pem.as_bytes()),
            (KEY_KDF_SALT, self.salt.as_slice()),
            (KEY_ENCRYPTION_IV, self.iv.as_slice()),
        ])
    }

    /// Remove the record. Absent fields are ignored so a partially
    /// written record can still be erased.
    pub fn erase(store: &dyn KeyStore) -> Result<()> {
        store.delete(KEY_ENCRYPTED_PRIVATE_KEY)?;
        store.delete(KEY_USER_CERTIFICATE)?;
        store.delete(KEY_KDF_SALT)?;
        store.delete(KEY_ENCRYPTION_IV)?;
        Ok(())
    }
}

/// Derive the 256-bit sealing key from a secret and salt.
pub fn derive_key(secret: &[u8], salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(secret, salt, PBKDF2_ITERATIONS, key.as_mut());
    key
}

/// AEAD-encrypt `plaintext` under `key`/`iv`.
pub fn seal(key: &[u8; 32], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::input(format!("cipher init failed: {e}")))?;
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|_| Error::input("encryption failed"))
}

/// AEAD-decrypt. Authentication failure means the derived key was
/// wrong, which means the password was.
pub fn open(key: &[u8; 32], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::input(format!("cipher init failed: {e}")))?;
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| Error::BadPassword)
}
