//! Transport contracts.
//!
//! The gateway speaks five RPCs and the deliver proxy speaks binary
//! WebSocket frames; both are abstracted here so the transaction
//! lifecycle code never names a concrete network stack. Production
//! code wires in [`grpc::GrpcGateway`](crate::grpc::GrpcGateway) and
//! [`deliver::WsDeliver`](crate::deliver::WsDeliver); tests inject
//! scripted doubles.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use fabvault_proto::gateway::{
    ChaincodeEventsResponse, CommitStatusResponse, EndorseRequest, EndorseResponse, ErrorDetail,
    EvaluateRequest, EvaluateResponse, SignedChaincodeEventsRequest, SignedCommitStatusRequest,
    SubmitRequest, SubmitResponse,
};

/// Failure shape shared by all transports. `details` carries decoded
/// per-peer gateway details when the server attached any; the client
/// prefers those innermost messages over the outer status message.
#[derive(Clone, Debug)]
pub struct TransportError {
    /// gRPC status code value, when one applies.
    pub code: i32,
    pub message: String,
    pub details: Vec<ErrorDetail>,
    /// Set when a stream broke its framing contract rather than
    /// failing as an RPC.
    pub protocol_violation: bool,
}

impl TransportError {
    pub fn message_only(message: impl Into<String>) -> Self {
        TransportError {
            code: tonic::Code::Unknown as i32,
            message: message.into(),
            details: Vec::new(),
            protocol_violation: false,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        TransportError {
            protocol_violation: true,
            ..TransportError::message_only(message)
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

/// Server stream of chaincode event batches.
pub type EventStream =
    Pin<Box<dyn Stream<Item = Result<ChaincodeEventsResponse, TransportError>> + Send>>;

/// The five gateway RPCs. Implementations must be safe for concurrent
/// calls; the client shares one transport across transactions.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn evaluate(&self, request: EvaluateRequest)
        -> Result<EvaluateResponse, TransportError>;

    async fn endorse(&self, request: EndorseRequest) -> Result<EndorseResponse, TransportError>;

    async fn submit(&self, request: SubmitRequest) -> Result<SubmitResponse, TransportError>;

    async fn commit_status(
        &self,
        request: SignedCommitStatusRequest,
    ) -> Result<CommitStatusResponse, TransportError>;

    async fn chaincode_events(
        &self,
        request: SignedChaincodeEventsRequest,
    ) -> Result<EventStream, TransportError>;
}

/// Factory for deliver sessions against one peer endpoint.
#[async_trait]
pub trait DeliverTransport: Send + Sync {
    async fn open(
        &self,
        target: &str,
        hostname: &str,
    ) -> Result<Box<dyn DeliverSession>, TransportError>;
}

/// One open deliver stream: a single request frame up, binary
/// `DeliverResponse` frames down.
#[async_trait]
pub trait DeliverSession: Send {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Next binary frame. `None` means the stream closed cleanly.
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>, TransportError>>;

    /// Close the stream cleanly (WebSocket code 1000).
    async fn close(&mut self);
}
