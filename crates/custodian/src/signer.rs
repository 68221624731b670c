//! Signature encoding: raw 64-byte (R‖S) ECDSA output to the ASN.1 DER
//! form Fabric accepts, with S normalized to the lower half of the
//! P-256 group order.
//!
//! This is the only signature encoding in the workspace; every signed
//! message goes through [`encode_der_low_s`].

use p256::ecdsa::Signature;

use fabvault_common::{Error, Result};

use crate::custodian::AppIdentity;

/// Normalize S and emit `SEQUENCE { INTEGER r, INTEGER s }` with
/// minimal integer encoding.
pub fn encode_der_low_s(raw: &[u8]) -> Result<Vec<u8>> {
    let signature = Signature::from_slice(raw)
        .map_err(|e| Error::input(format!("raw signature is not 64 bytes of (R,S): {e}")))?;
    let normalized = signature.normalize_s().unwrap_or(signature);
    Ok(normalized.to_der().as_bytes().to_vec())
}

/// Sign `message` through the identity's capability and DER-encode the
/// result.
pub async fn sign_and_encode(identity: &AppIdentity, message: &[u8]) -> Result<Vec<u8>> {
    let raw = identity.sign(message).await?;
    encode_der_low_s(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::{Signer as _, Verifier as _};
    use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

    /// n/2 for P-256, big-endian.
    const HALF_ORDER: [u8; 32] = [
        0x7f, 0xff, 0xff, 0xff, 0x80, 0x00, 0x00, 0x00, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xde, 0x73, 0x7d, 0x56, 0xd3, 0x8b, 0xcf, 0x42, 0x79, 0xdc, 0xe5, 0x61, 0x7e, 0x31,
        0x92, 0xa8,
    ];

    /// n for P-256, big-endian.
    const ORDER: [u8; 32] = [
        0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xbc, 0xe6, 0xfa, 0xad, 0xa7, 0x17, 0x9e, 0x84, 0xf3, 0xb9, 0xca, 0xc2, 0xfc, 0x63,
        0x25, 0x51,
    ];

    fn order_minus(s: &[u8; 32]) -> [u8; 32] {
        let mut out = [0u8; 32];
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let mut diff = ORDER[i] as i16 - s[i] as i16 - borrow;
            if diff < 0 {
                diff += 256;
                borrow = 1;
            } else {
                borrow = 0;
            }
            out[i] = diff as u8;
        }
        out
    }

    /// Split a DER `SEQUENCE { INTEGER, INTEGER }` into the integer
    /// content bytes.
    fn der_integers(der: &[u8]) -> Vec<Vec<u8>> {
        assert_eq!(der[0], 0x30, "outer tag must be SEQUENCE");
        assert_eq!(der[1] as usize + 2, der.len(), "short-form length");

        let mut integers = Vec::new();
        let mut idx = 2;
        while idx < der.len() {
            assert_eq!(der[idx], 0x02, "inner tag must be INTEGER");
            let len = der[idx + 1] as usize;
            integers.push(der[idx + 2..idx + 2 + len].to_vec());
            idx += 2 + len;
        }
        assert_eq!(integers.len(), 2);
        integers
    }

    fn raw_signature(key: &SigningKey, message: &[u8]) -> [u8; 64] {
        let signature: Signature = key.sign(message);
        signature.to_bytes().as_slice().try_into().unwrap()
    }

    #[test]
    fn encoded_signature_verifies_and_s_is_low() {
        let key = SigningKey::random(&mut rand::rngs::OsRng);
        let verifier = VerifyingKey::from(&key);
        let message = b"payload to endorse";

        let der = encode_der_low_s(&raw_signature(&key, message)).expect("encode");
        let parsed = Signature::from_der(&der).expect("der parses");
        verifier.verify(message, &parsed).expect("verifies");

        let s: [u8; 32] = parsed.to_bytes()[32..].try_into().unwrap();
        assert!(s <= HALF_ORDER, "S must be in the lower half of the order");
    }

    #[test]
    fn high_s_input_is_normalized_to_the_same_valid_signature() {
        let key = SigningKey::random(&mut rand::rngs::OsRng);
        let verifier = VerifyingKey::from(&key);
        let message = b"normalize me";

        let raw = raw_signature(&key, message);
        let mut high = raw;
        let s: [u8; 32] = raw[32..].try_into().unwrap();
        high[32..].copy_from_slice(&order_minus(&s));

        let der = encode_der_low_s(&high).expect("encode");
        let parsed = Signature::from_der(&der).expect("der parses");
        verifier.verify(message, &parsed).expect("still verifies");

        let s: [u8; 32] = parsed.to_bytes()[32..].try_into().unwrap();
        assert!(s <= HALF_ORDER);
    }

    #[test]
    fn der_integers_are_minimally_encoded() {
        let key = SigningKey::random(&mut rand::rngs::OsRng);

        for i in 0u8..16 {
            let der = encode_der_low_s(&raw_signature(&key, &[i])).expect("encode");
            for integer in der_integers(&der) {
                assert!(!integer.is_empty());
                if integer[0] == 0x00 {
                    // A leading zero is only allowed to clear a set
                    // high bit on the next byte.
                    assert!(integer.len() > 1);
                    assert_ne!(integer[1] & 0x80, 0, "redundant 0x00 prefix");
                } else {
                    assert_eq!(integer[0] & 0x80, 0, "unpadded negative integer");
                }
            }
        }
    }

    #[test]
    fn wrong_length_input_is_rejected() {
        assert!(encode_der_low_s(&[0u8; 63]).is_err());
        assert!(encode_der_low_s(&[]).is_err());
    }
}
