//! # Fabvault Gateway Crate
//!
//! The public entry point of the workspace: a client for the Fabric
//! gateway RPCs and the peer deliver stream, built on the custodian's
//! signing capability.
//!
//! ## Modules
//! - [`client`]: the [`GatewayClient`] transaction lifecycle
//! - [`transport`]: transport contracts and the shared error shape
//! - [`grpc`]: tonic-backed gateway transport
//! - [`deliver`]: WebSocket-backed deliver transport
//! - [`events`]: event records and cancellable subscriptions
//! - [`parse`]: chaincode response payload parsing
//!
//! Transports are injected through traits so tests (and alternative
//! deployments) can replace them without touching the lifecycle code.

pub mod client;
pub mod deliver;
pub mod events;
pub mod grpc;
pub mod parse;
pub mod transport;

pub use client::{
    BlockEventsParams, CommitOutcome, GatewayClient, PreparedTransaction, SubmittedTransaction,
};
pub use events::{BlockRecord, BlockTransactionRecord, ChaincodeEventBatch, ChaincodeEventRecord, EventSubscription};
pub use parse::{parse_payload, EvaluatedTransaction};
pub use transport::{DeliverSession, DeliverTransport, EventStream, GatewayTransport, TransportError};
