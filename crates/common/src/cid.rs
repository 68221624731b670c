//! SHA-256 helpers with deterministic hex output.
//!
//! Transaction ids are the lowercase hex digest of `nonce || creator`,
//! so the hex form is the canonical one throughout the workspace.

use sha2::{Digest, Sha256};

/// Compute SHA-256 and return the lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute SHA-256 over two concatenated segments without allocating
/// the joined buffer.
pub fn sha256_hex_concat(a: &[u8], b: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(a);
    hasher.update(b);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"some payload bytes";
        let h1 = sha256_hex(data);
        let h2 = sha256_hex(data);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn concat_matches_joined_buffer() {
        let joined = [b"left".as_slice(), b"right".as_slice()].concat();
        assert_eq!(sha256_hex_concat(b"left", b"right"), sha256_hex(&joined));
    }
}
