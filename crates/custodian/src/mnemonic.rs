//! BIP-39 recovery phrase generation.
//!
//! When the caller supplies no password, the sealing secret is a
//! 12-word English mnemonic carrying 128 bits of entropy. The phrase
//! is the secret: its UTF-8 bytes feed the KDF and the share split.

use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use fabvault_common::{Error, Result};

const ENTROPY_LEN: usize = 16;

/// Generate a fresh 12-word mnemonic.
pub fn generate_recovery_phrase() -> Result<Zeroizing<String>> {
    let mut entropy = Zeroizing::new([0u8; ENTROPY_LEN]);
    OsRng.fill_bytes(entropy.as_mut());

    let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy.as_ref())
        .map_err(|e| Error::input(format!("mnemonic generation failed: {e}")))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_has_twelve_words() {
        let phrase = generate_recovery_phrase().expect("generate");
        assert_eq!(phrase.split_whitespace().count(), 12);
    }

    #[test]
    fn phrase_is_a_valid_mnemonic() {
        let phrase = generate_recovery_phrase().expect("generate");
        let parsed = Mnemonic::parse_in_normalized(Language::English, &phrase).expect("parse");
        assert_eq!(parsed.to_entropy().len(), ENTROPY_LEN);
    }

    #[test]
    fn phrases_are_unique() {
        let a = generate_recovery_phrase().expect("generate");
        let b = generate_recovery_phrase().expect("generate");
        assert_ne!(a.as_str(), b.as_str());
    }
}
