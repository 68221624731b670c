//! # Fabvault Custodian Crate
//!
//! Owns the signing private key. Everything else in the workspace holds
//! an [`AppIdentity`] whose only cryptographic operation is
//! `sign(bytes) -> bytes`; the key itself never crosses the crate
//! boundary except through the consensual password-protected export
//! flow.
//!
//! ## Modules
//! - [`custodian`]: the sealed slot, its lifecycle and the signing
//!   capability
//! - [`sealed`]: PBKDF2 + AES-256-GCM sealing of the key PEM
//! - [`signer`]: raw (R‖S) to DER with low-S normalization
//! - [`mnemonic`]: BIP-39 recovery phrase generation
//! - [`sss`]: threshold share splitting of the sealing secret
//! - [`export`]: password-encrypted identity export blobs
//!
//! ## Security Notes
//!
//! - Key material, passwords and mnemonics never reach `Debug` output,
//!   log events or error messages.
//! - All slot access is serialized behind one async mutex; no two
//!   signatures are produced concurrently from the same key handle.

pub mod custodian;
pub mod export;
pub mod mnemonic;
pub mod sealed;
pub mod signer;
pub mod sss;

pub use custodian::{AppIdentity, CreatedIdentity, Custodian, SignCapability};
pub use sealed::SealedIdentity;
pub use signer::{encode_der_low_s, sign_and_encode};
