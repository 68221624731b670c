//! The identity custodian: one password-sealed slot, an opaque signing
//! capability and the lifecycle operations around them.
//!
//! The slot state machine:
//!
//! ```text
//!   [Empty]    -- create_password_identity --> [Unlocked]
//!   [Empty]    -- import_identity          --> [Unlocked]
//!   [Sealed]   -- unlock_identity (ok)     --> [Unlocked]
//!   [Sealed]   -- unlock_identity (bad)    --> [Sealed]    (error surfaced)
//!   [Unlocked] -- delete_identity          --> [Empty]
//!   [Unlocked] -- sign                     --> [Unlocked]
//!   {any}      -- delete_all               --> [Empty]
//! ```
//!
//! All slot access goes through one async mutex, so signatures are
//! serialized and no reader observes a half-installed key.

use std::sync::Arc;

use p256::ecdsa::signature::Signer as _;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::Mutex;
use tracing::debug;
use zeroize::Zeroizing;

use fabvault_common::{Error, Result};
use fabvault_storage::KeyStore;

use crate::export;
use crate::mnemonic;
use crate::sealed::{self, SealedIdentity, IV_LEN, KEY_HW_CREDENTIAL_ID, SALT_LEN};
use crate::sss;

const MIN_PASSWORD_LEN: usize = 8;
const MIN_PASSWORD_SCORE: u8 = 3;

#[derive(Default)]
struct Slot {
    signing_key: Option<SigningKey>,
    cert_pem: Option<String>,
    key_pem: Option<Zeroizing<String>>,
}

impl Slot {
    fn clear(&mut self) {
        self.signing_key = None;
        self.cert_pem = None;
        self.key_pem = None;
    }
}

/// Capability to sign with the custodian's unlocked key. The key
/// itself is not reachable through this handle.
#[derive(Clone)]
pub struct SignCapability {
    slot: Arc<Mutex<Slot>>,
}

impl std::fmt::Debug for SignCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignCapability").finish_non_exhaustive()
    }
}

impl SignCapability {
    /// Produce the raw 64-byte (R‖S) ECDSA-P256/SHA-256 signature.
    pub async fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let slot = self.slot.lock().await;
        let key = slot.signing_key.as_ref().ok_or(Error::NotUnlocked)?;
        let signature: Signature = key.sign(message);
        Ok(signature.to_bytes().to_vec())
    }
}

/// Value object handed to the gateway client: the user certificate
/// plus the capability to sign as that user.
#[derive(Clone)]
pub struct AppIdentity {
    pub cert_pem: String,
    signer: SignCapability,
}

impl std::fmt::Debug for AppIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppIdentity")
            .field("cert_pem_len", &self.cert_pem.len())
            .finish_non_exhaustive()
    }
}

impl AppIdentity {
    /// Sign through the custodian that issued this identity.
    pub async fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.signer.sign(message).await
    }

    pub fn sign_capability(&self) -> &SignCapability {
        &self.signer
    }
}

/// Result of creating (or re-importing) a password identity.
pub struct CreatedIdentity {
    pub identity: AppIdentity,
    /// The secret that seals the record: the generated mnemonic, or
    /// the caller's password when one was supplied.
    pub recovery_phrase: Zeroizing<String>,
    /// Base64 threshold shares of the recovery phrase (3 of 5).
    pub recovery_shares: Vec<String>,
}

impl std::fmt::Debug for CreatedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedIdentity")
            .field("identity", &self.identity)
            .field("recovery_shares", &self.recovery_shares.len())
            .finish_non_exhaustive()
    }
}

/// Owner of the private key and mediator of all sealed persistence.
pub struct Custodian {
    store: Arc<dyn KeyStore>,
    slot: Arc<Mutex<Slot>>,
}

impl std::fmt::Debug for Custodian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Custodian").finish_non_exhaustive()
    }
}

impl Custodian {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Custodian {
            store,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Seal a fresh password identity and unlock it.
    ///
    /// With no password a 12-word mnemonic becomes the sealing secret;
    /// a supplied password must be at least 8 characters and score 3
    /// of 4 on the strength estimator. Returns the unlocked identity,
    /// the secret and its threshold shares.
    pub async fn create_password_identity(
        &self,
        cert_pem: &str,
        key_pem: &str,
        password: Option<&str>,
    ) -> Result<CreatedIdentity> {
        let signing_key = parse_signing_key(key_pem)?;

        let secret: Zeroizing<String> = match password {
            Some(p) => {
                check_password_strength(p)?;
                Zeroizing::new(p.to_string())
            }
            None => mnemonic::generate_recovery_phrase()?,
        };

        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut iv);

        let kdf_key = sealed::derive_key(secret.as_bytes(), &salt);
        let encrypted_key = sealed::seal(&kdf_key, &iv, key_pem.as_bytes())?;

        SealedIdentity {
            encrypted_key,
            certificate_pem: cert_pem.to_string(),
            salt,
            iv,
        }
        .store(&*self.store)?;
        debug!("password identity sealed");

        let recovery_shares = sss::split_secret_base64(secret.as_bytes())?;

        let identity = self
            .install(signing_key, cert_pem.to_string(), key_pem.to_string())
            .await;

        Ok(CreatedIdentity {
            identity,
            recovery_phrase: secret,
            recovery_shares,
        })
    }

    /// Unseal the stored identity. A failed unlock leaves the slot
    /// untouched.
    pub async fn unlock_identity(&self, password: &str) -> Result<AppIdentity> {
        let sealed_record = SealedIdentity::load(&*self.store)?
            .ok_or_else(|| Error::input("no sealed identity to unlock"))?;

        let kdf_key = sealed::derive_key(password.as_bytes(), &sealed_record.salt);
        let key_bytes = sealed::open(&kdf_key, &sealed_record.iv, &sealed_record.encrypted_key)?;

        let key_pem = String::from_utf8(key_bytes.to_vec())
            .map_err(|_| Error::StoreCorrupt("decrypted key is not valid UTF-8".to_string()))?;
        let signing_key = parse_signing_key(&key_pem)
            .map_err(|_| Error::StoreCorrupt("decrypted key is not a valid P-256 key".to_string()))?;

        debug!("identity unlocked");
        Ok(self
            .install(signing_key, sealed_record.certificate_pem, key_pem)
            .await)
    }

    /// Unlock directly from caller-supplied PEM material. Persists
    /// nothing.
    pub async fn import_identity(&self, cert_pem: &str, key_pem: &str) -> Result<AppIdentity> {
        let signing_key = parse_signing_key(key_pem)?;
        Ok(self
            .install(signing_key, cert_pem.to_string(), key_pem.to_string())
            .await)
    }

    /// Raw 64-byte signature with the unlocked key.
    pub async fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        SignCapability {
            slot: self.slot.clone(),
        }
        .sign(message)
        .await
    }

    /// Drop the in-memory key without touching sealed storage.
    pub async fn lock(&self) {
        self.slot.lock().await.clear();
    }

    /// Erase the sealed record and drop the in-memory key.
    pub async fn delete_identity(&self) -> Result<()> {
        SealedIdentity::erase(&*self.store)?;
        self.slot.lock().await.clear();
        debug!("password identity deleted");
        Ok(())
    }

    /// Wipe everything this custodian persisted, the hardware slot
    /// included, and drop the in-memory key.
    pub async fn delete_all(&self) -> Result<()> {
        self.store.clear()?;
        self.slot.lock().await.clear();
        debug!("custodian storage cleared");
        Ok(())
    }

    /// Whether a sealed password identity is present.
    pub fn password_identity_exists(&self) -> Result<bool> {
        Ok(SealedIdentity::load(&*self.store)?.is_some())
    }

    /// Certificate of the currently unlocked identity, if any.
    pub async fn unlocked_certificate(&self) -> Option<String> {
        self.slot.lock().await.cert_pem.clone()
    }

    /// Encrypt the unlocked identity for transfer. The only path key
    /// material may leave the custodian.
    pub async fn export_identity(
        &self,
        label: &str,
        msp_id: &str,
        password: &str,
    ) -> Result<String> {
        let (cert_pem, key_pem) = {
            let slot = self.slot.lock().await;
            match (&slot.cert_pem, &slot.key_pem) {
                (Some(cert), Some(key)) => (cert.clone(), key.clone()),
                _ => return Err(Error::NotUnlocked),
            }
        };
        export::encode_blob(label, msp_id, &cert_pem, &key_pem, password)
    }

    /// Decrypt an export blob and re-run the create flow with the
    /// recovered material under the same password.
    pub async fn import_exported_identity(
        &self,
        blob: &str,
        password: &str,
    ) -> Result<CreatedIdentity> {
        let payload = export::decode_blob(blob, password)?;
        self.create_password_identity(&payload.certificate, &payload.private_key, Some(password))
            .await
    }

    /// Store the attestation-credential id of the hardware slot. The
    /// hardware slot is an overlay: the ceremony's output is used as
    /// the password for [`Custodian::unlock_identity`].
    pub fn set_hardware_credential(&self, credential_id: &[u8]) -> Result<()> {
        self.store.set(KEY_HW_CREDENTIAL_ID, credential_id)
    }

    pub fn hardware_credential(&self) -> Result<Option<Vec<u8>>> {
        self.store.get(KEY_HW_CREDENTIAL_ID)
    }

    pub fn clear_hardware_credential(&self) -> Result<()> {
        self.store.delete(KEY_HW_CREDENTIAL_ID)
    }

    async fn install(
        &self,
        signing_key: SigningKey,
        cert_pem: String,
        key_pem: String,
    ) -> AppIdentity {
        let mut slot = self.slot.lock().await;
        slot.signing_key = Some(signing_key);
        slot.cert_pem = Some(cert_pem.clone());
        slot.key_pem = Some(Zeroizing::new(key_pem));
        AppIdentity {
            cert_pem,
            signer: SignCapability {
                slot: self.slot.clone(),
            },
        }
    }
}

fn parse_signing_key(key_pem: &str) -> Result<SigningKey> {
    // Keys arrive as either SEC1 ("EC PRIVATE KEY") or PKCS#8
    // ("PRIVATE KEY") PEM; try SEC1 first.
    let secret = match p256::SecretKey::from_sec1_pem(key_pem) {
        Ok(secret) => secret,
        Err(_) => p256::SecretKey::from_pkcs8_pem(key_pem)
            .map_err(|_| Error::input("private key is not a valid P-256 PEM"))?,
    };
    Ok(SigningKey::from(secret))
}

fn check_password_strength(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::input(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let estimate = zxcvbn::zxcvbn(password, &[])
        .map_err(|_| Error::input("password must not be empty"))?;
    if estimate.score() < MIN_PASSWORD_SCORE {
        return Err(Error::input(format!(
            "password is too weak (score {} of 4, need {MIN_PASSWORD_SCORE})",
            estimate.score()
        )));
    }
    Ok(())
}
