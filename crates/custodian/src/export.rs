//! Password-encrypted identity export.
//!
//! The one sanctioned way key material leaves the custodian: a JSON
//! payload AEAD-encrypted under a PBKDF2-derived key and framed as
//! `salt ‖ iv ‖ ciphertext`, base64-encoded.

use base64::{engine::general_purpose, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use fabvault_common::{Error, Result};

use crate::sealed::{self, IV_LEN, SALT_LEN};

/// Payload of an export blob.
#[derive(Clone, Serialize, Deserialize)]
pub struct ExportedIdentity {
    pub label: String,
    pub msp_id: String,
    pub certificate: String,
    pub private_key: String,
}

impl std::fmt::Debug for ExportedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportedIdentity")
            .field("label", &self.label)
            .field("msp_id", &self.msp_id)
            .finish_non_exhaustive()
    }
}

/// Build an export blob.
pub fn encode_blob(
    label: &str,
    msp_id: &str,
    certificate: &str,
    private_key: &str,
    password: &str,
) -> Result<String> {
    if password.is_empty() {
        return Err(Error::input("export password must not be empty"));
    }

    let payload = ExportedIdentity {
        label: label.to_string(),
        msp_id: msp_id.to_string(),
        certificate: certificate.to_string(),
        private_key: private_key.to_string(),
    };
    let json = Zeroizing::new(serde_json::to_vec(&payload).map_err(Error::input)?);

    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = sealed::derive_key(password.as_bytes(), &salt);
    let ciphertext = sealed::seal(&key, &iv, &json)?;

    let mut framed = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    framed.extend_from_slice(&salt);
    framed.extend_from_slice(&iv);
    framed.extend_from_slice(&ciphertext);
    Ok(general_purpose::STANDARD.encode(framed))
}

/// Decrypt an export blob and validate that both PEM fields are
/// present.
pub fn decode_blob(blob: &str, password: &str) -> Result<ExportedIdentity> {
    let framed = general_purpose::STANDARD
        .decode(blob.trim())
        .map_err(|_| Error::input("export blob is not valid base64"))?;
    if framed.len() <= SALT_LEN + IV_LEN {
        return Err(Error::input("export blob is truncated"));
    }

    let salt = &framed[..SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&framed[SALT_LEN..SALT_LEN + IV_LEN]);
    let ciphertext = &framed[SALT_LEN + IV_LEN..];

    let key = sealed::derive_key(password.as_bytes(), salt);
    let json = sealed::open(&key, &iv, ciphertext)?;

    let payload: ExportedIdentity = serde_json::from_slice(&json)
        .map_err(|_| Error::input("export payload is not the expected JSON shape"))?;
    if payload.certificate.trim().is_empty() {
        return Err(Error::input("export payload is missing the certificate"));
    }
    if payload.private_key.trim().is_empty() {
        return Err(Error::input("export payload is missing the private key"));
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trips_under_the_right_password() {
        let blob = encode_blob("backup", "Org1MSP", "CERT", "KEY", "open sesame").expect("encode");
        let payload = decode_blob(&blob, "open sesame").expect("decode");
        assert_eq!(payload.label, "backup");
        assert_eq!(payload.msp_id, "Org1MSP");
        assert_eq!(payload.certificate, "CERT");
        assert_eq!(payload.private_key, "KEY");
    }

    #[test]
    fn wrong_password_is_a_bad_password_error() {
        let blob = encode_blob("backup", "Org1MSP", "CERT", "KEY", "password-a").expect("encode");
        let err = decode_blob(&blob, "password-b").unwrap_err();
        assert!(matches!(err, Error::BadPassword));
    }

    #[test]
    fn malformed_blobs_are_input_errors() {
        assert!(matches!(
            decode_blob("@@not-base64@@", "pw").unwrap_err(),
            Error::InputInvalid(_)
        ));
        let short = general_purpose::STANDARD.encode([0u8; 10]);
        assert!(matches!(
            decode_blob(&short, "pw").unwrap_err(),
            Error::InputInvalid(_)
        ));
    }

    #[test]
    fn missing_pem_fields_are_rejected() {
        let blob = encode_blob("backup", "Org1MSP", "CERT", "", "open sesame");
        // Encoding succeeds; validation happens on decode.
        let err = decode_blob(&blob.expect("encode"), "open sesame").unwrap_err();
        assert!(matches!(err, Error::InputInvalid(_)));
    }

    #[test]
    fn debug_output_hides_key_material() {
        let payload = ExportedIdentity {
            label: "l".into(),
            msp_id: "m".into(),
            certificate: "CERT".into(),
            private_key: "SUPER-SECRET".into(),
        };
        let rendered = format!("{payload:?}");
        assert!(!rendered.contains("SUPER-SECRET"));
    }

    #[test]
    fn empty_export_password_is_rejected() {
        let err = encode_blob("l", "m", "CERT", "KEY", "").unwrap_err();
        assert!(matches!(err, Error::InputInvalid(_)));
    }
}
