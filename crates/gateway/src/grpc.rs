//! tonic-backed gateway transport.
//!
//! There is no generated client stub: the messages are hand-declared,
//! so the calls go straight through `tonic::client::Grpc` with a
//! `ProstCodec`, the same machinery generated code uses. The channel
//! is cheap to clone, which is what makes the transport safe for
//! concurrent RPCs.

use async_trait::async_trait;
use prost::Message;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};

use futures::StreamExt;

use fabvault_common::{Error, GatewayOptions, Result};
use fabvault_proto::gateway::{
    EndorseRequest, EndorseResponse, ErrorDetail, EvaluateRequest, EvaluateResponse,
    SignedChaincodeEventsRequest, SignedCommitStatusRequest, SubmitRequest, SubmitResponse,
};
use fabvault_proto::gateway::{ChaincodeEventsResponse, CommitStatusResponse};
use fabvault_proto::rpc::RpcStatus;

use crate::transport::{EventStream, GatewayTransport, TransportError};

const EVALUATE: &str = "/gateway.Gateway/Evaluate";
const ENDORSE: &str = "/gateway.Gateway/Endorse";
const SUBMIT: &str = "/gateway.Gateway/Submit";
const COMMIT_STATUS: &str = "/gateway.Gateway/CommitStatus";
const CHAINCODE_EVENTS: &str = "/gateway.Gateway/ChaincodeEvents";

#[derive(Clone)]
pub struct GrpcGateway {
    grpc: tonic::client::Grpc<Channel>,
}

impl GrpcGateway {
    /// Connect to the gateway described by `options`, pinning the TLS
    /// chain when a CA certificate is configured.
    pub async fn connect(options: &GatewayOptions) -> Result<Self> {
        let mut endpoint = Endpoint::from_shared(options.gateway_url.clone())
            .map_err(|e| Error::Transport(format!("invalid gateway url: {e}")))?;

        if let Some(ca_pem) = &options.tls_ca_cert {
            let mut tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(ca_pem));
            if let Some(server_name) = &options.tls_server_name {
                tls = tls.domain_name(server_name.clone());
            }
            endpoint = endpoint
                .tls_config(tls)
                .map_err(|e| Error::Transport(format!("tls configuration rejected: {e}")))?;
        }

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| Error::Transport(format!("cannot reach gateway: {e}")))?;
        Ok(Self::from_channel(channel))
    }

    pub fn from_channel(channel: Channel) -> Self {
        GrpcGateway {
            grpc: tonic::client::Grpc::new(channel),
        }
    }

    async fn unary<Req, Resp>(
        &self,
        path: &'static str,
        request: Req,
    ) -> std::result::Result<Resp, TransportError>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.grpc.clone();
        grpc.ready()
            .await
            .map_err(|e| TransportError::message_only(format!("gateway channel not ready: {e}")))?;

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        match grpc
            .unary(Request::new(request), PathAndQuery::from_static(path), codec)
            .await
        {
            Ok(response) => Ok(response.into_inner()),
            Err(status) => Err(status_to_transport_error(status)),
        }
    }
}

/// Decode the `google.rpc.Status` trailer, if present, so the per-peer
/// gateway details survive into the error shape.
fn status_to_transport_error(status: Status) -> TransportError {
    let mut details = Vec::new();
    if !status.details().is_empty() {
        if let Ok(rpc_status) = RpcStatus::decode(status.details()) {
            for any in rpc_status.details {
                if any.type_url.ends_with("gateway.ErrorDetail") {
                    if let Ok(detail) = ErrorDetail::decode(any.value.as_slice()) {
                        details.push(detail);
                    }
                }
            }
        }
    }
    TransportError {
        code: status.code() as i32,
        message: status.message().to_string(),
        details,
        protocol_violation: false,
    }
}

#[async_trait]
impl GatewayTransport for GrpcGateway {
    async fn evaluate(
        &self,
        request: EvaluateRequest,
    ) -> std::result::Result<EvaluateResponse, TransportError> {
        self.unary(EVALUATE, request).await
    }

    async fn endorse(
        &self,
        request: EndorseRequest,
    ) -> std::result::Result<EndorseResponse, TransportError> {
        self.unary(ENDORSE, request).await
    }

    async fn submit(
        &self,
        request: SubmitRequest,
    ) -> std::result::Result<SubmitResponse, TransportError> {
        self.unary(SUBMIT, request).await
    }

    async fn commit_status(
        &self,
        request: SignedCommitStatusRequest,
    ) -> std::result::Result<CommitStatusResponse, TransportError> {
        self.unary(COMMIT_STATUS, request).await
    }

    async fn chaincode_events(
        &self,
        request: SignedChaincodeEventsRequest,
    ) -> std::result::Result<EventStream, TransportError> {
        let mut grpc = self.grpc.clone();
        grpc.ready()
            .await
            .map_err(|e| TransportError::message_only(format!("gateway channel not ready: {e}")))?;

        let codec: ProstCodec<SignedChaincodeEventsRequest, ChaincodeEventsResponse> =
            ProstCodec::default();
        let response = grpc
            .server_streaming(
                Request::new(request),
                PathAndQuery::from_static(CHAINCODE_EVENTS),
                codec,
            )
            .await
            .map_err(status_to_transport_error)?;

        let stream = response
            .into_inner()
            .map(|item| item.map_err(status_to_transport_error));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_details_are_decoded_into_error_details() {
        let detail = ErrorDetail {
            address: "peer0:7051".to_string(),
            msp_id: "Org1MSP".to_string(),
            message: "chaincode said no".to_string(),
        };
        let rpc_status = RpcStatus {
            code: tonic::Code::Aborted as i32,
            message: "evaluate call failed".to_string(),
            details: vec![fabvault_proto::rpc::Any {
                type_url: "type.googleapis.com/gateway.ErrorDetail".to_string(),
                value: detail.encode_to_vec(),
            }],
        };
        let status = Status::with_details(
            tonic::Code::Aborted,
            "evaluate call failed",
            rpc_status.encode_to_vec().into(),
        );

        let err = status_to_transport_error(status);
        assert_eq!(err.code, tonic::Code::Aborted as i32);
        assert_eq!(err.details.len(), 1);
        assert_eq!(err.details[0].message, "chaincode said no");
    }

    #[test]
    fn plain_status_keeps_its_outer_message() {
        let err = status_to_transport_error(Status::unavailable("connection refused"));
        assert!(err.details.is_empty());
        assert_eq!(err.message, "connection refused");
        assert_eq!(err.code, tonic::Code::Unavailable as i32);
    }
}
