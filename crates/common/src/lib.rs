//! # Fabvault Common Crate
//!
//! Shared plumbing for the fabvault workspace.
//!
//! ## Modules
//! - `error`: the error taxonomy every public operation reports through
//! - `config`: gateway client configuration (TOML + serde)
//! - `cid`: SHA-256 hex helpers used for transaction ids
//!
//! Every crate in the workspace returns [`Result`]; internal library
//! errors are converted into an [`Error`] kind at the crate boundary so
//! callers always observe a single kind plus a human-readable message.

pub mod cid;
pub mod config;
pub mod error;

pub use config::GatewayOptions;
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
