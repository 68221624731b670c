//! Error taxonomy for the fabvault workspace.
//!
//! One variant per failure kind a caller can act on. Messages never
//! contain key material, passwords or mnemonics; the custodian redacts
//! before converting.

use thiserror::Error;

/// Failure kinds surfaced by every public fabvault operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied input was rejected before any side effect:
    /// weak password, missing field, malformed share, unknown config key.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// A signature was requested while no identity is unlocked.
    #[error("no identity is unlocked")]
    NotUnlocked,

    /// The KDF-derived key failed AEAD authentication against the
    /// sealed record.
    #[error("password does not match the sealed identity")]
    BadPassword,

    /// The sealed record is partially present. All four fields are
    /// written together; anything else is corruption.
    #[error("sealed identity record is corrupt: {0}")]
    StoreCorrupt(String),

    /// The key/value store itself failed (I/O, database error).
    #[error("key store failure: {0}")]
    Store(String),

    /// The transport could not complete an RPC: connection refused,
    /// TLS failure, non-OK gRPC status without endorsement detail.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The chaincode or the endorsing peers rejected the proposal.
    #[error("endorsement failed: {0}")]
    Endorsement(String),

    /// The transaction was submitted but validated with a non-VALID
    /// code at commit time.
    #[error("transaction {tx_id} failed to commit with status {code}")]
    CommitFailed { tx_id: String, code: String },

    /// The caller cancelled the operation. Streams terminate cleanly
    /// instead of reporting this.
    #[error("operation cancelled")]
    Cancelled,

    /// The deliver stream broke protocol: non-normal close code or a
    /// frame that is not a binary DeliverResponse.
    #[error("deliver stream protocol error: {0}")]
    StreamProtocol(String),
}

impl Error {
    /// Shorthand for [`Error::InputInvalid`] from anything displayable.
    pub fn input(msg: impl std::fmt::Display) -> Self {
        Error::InputInvalid(msg.to_string())
    }

    /// Shorthand for [`Error::Store`] from a backend error.
    pub fn store(err: impl std::fmt::Display) -> Self {
        Error::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_failed_mentions_tx_id_and_code() {
        let err = Error::CommitFailed {
            tx_id: "ab12".to_string(),
            code: "MVCC_READ_CONFLICT".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ab12"));
        assert!(msg.contains("MVCC_READ_CONFLICT"));
    }

    #[test]
    fn helpers_wrap_messages() {
        assert!(matches!(Error::input("x"), Error::InputInvalid(_)));
        assert!(matches!(Error::store("x"), Error::Store(_)));
    }
}
