//! # Fabvault Proto Crate
//!
//! The data contract between fabvault and a Fabric network: the
//! protobuf messages exchanged with the gateway and the deliver
//! endpoint, plus deterministic builders for everything the client
//! signs.
//!
//! The message structs mirror Fabric's published schemas field-for-field
//! and are declared with prost derive attributes directly, so the crate
//! encodes and decodes the published wire format without a protobuf
//! compiler in the build.
//!
//! ## Modules
//!
//! - [`msp`]: serialized identity
//! - [`common`]: envelope, payload, headers, block
//! - [`peer`]: chaincode proposal structures, deliver responses
//! - [`orderer`]: seek window for the deliver stream
//! - [`gateway`]: the five gateway RPC message pairs
//! - [`rpc`]: google.rpc status envelope carried in gRPC trailers
//! - [`builder`]: transaction context and signable message builders
//!
//! Builders are pure functions of their inputs apart from the random
//! nonce and, for the deliver seek envelope only, the current time.

pub mod builder;
pub mod common;
pub mod gateway;
pub mod msp;
pub mod orderer;
pub mod peer;
pub mod rpc;

pub use builder::{
    build_chaincode_events_request, build_commit_status_request, build_proposal,
    build_seek_info_payload, serialized_identity, ProposalParams, SeekStart, TransactionArg,
    TransactionContext,
};
