//! The gateway client: deterministic message construction, custodian
//! signing and the endorse → submit → wait-for-commit lifecycle.

use std::sync::Arc;

use futures::StreamExt;
use prost::Message;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use fabvault_common::{Error, GatewayOptions, Result};
use fabvault_custodian::{sign_and_encode, AppIdentity};
use fabvault_proto::builder::{
    build_chaincode_events_request, build_commit_status_request, build_proposal,
    build_seek_info_payload, serialized_identity, ProposalParams, SeekStart, TransactionContext,
};
use fabvault_proto::common::Envelope;
use fabvault_proto::gateway::{
    EndorseRequest, EvaluateRequest, SignedChaincodeEventsRequest, SignedCommitStatusRequest,
    SubmitRequest,
};
use fabvault_proto::peer::{deliver_response, DeliverResponse, SignedProposal, TxValidationCode};

use crate::deliver::WsDeliver;
use crate::events::{BlockRecord, ChaincodeEventBatch, EventSubscription, SUBSCRIPTION_BUFFER};
use crate::grpc::GrpcGateway;
use crate::parse::{decode_simulation_response, parse_payload, EvaluatedTransaction};
use crate::transport::{DeliverTransport, GatewayTransport, TransportError};

/// An endorsed transaction waiting to be submitted.
#[derive(Clone, Debug)]
pub struct PreparedTransaction {
    pub tx_id: String,
    /// The protobuf-serialized `Payload` assembled by the endorser.
    pub envelope_payload: Vec<u8>,
}

/// A committed transaction's validation outcome.
#[derive(Clone, Debug)]
pub struct CommitOutcome {
    pub tx_id: String,
    pub block_number: u64,
    /// Validation code name; always `VALID` on the success path.
    pub code: String,
}

/// Result of the full submit-and-commit lifecycle.
#[derive(Clone, Debug)]
pub struct SubmittedTransaction {
    pub tx_id: String,
    pub block_number: u64,
    /// Parsed simulation result from the endorsement, `null` when the
    /// endorser embedded none.
    pub result: serde_json::Value,
}

/// Parameters of a block-event subscription.
#[derive(Clone, Debug)]
pub struct BlockEventsParams {
    pub msp_id: String,
    pub channel_name: String,
    /// Peer deliver endpoint, passed to the proxy as `target`.
    pub peer_endpoint: String,
    /// TLS server name, passed to the proxy as `hostname`.
    pub hostname: String,
    pub start: SeekStart,
}

/// The single public entry point for Fabric transactions.
pub struct GatewayClient {
    transport: Arc<dyn GatewayTransport>,
    deliver: Option<Arc<dyn DeliverTransport>>,
    options: GatewayOptions,
}

impl GatewayClient {
    /// Connect over gRPC (and remember the deliver endpoint when one
    /// is configured).
    pub async fn connect(options: GatewayOptions) -> Result<Self> {
        let transport = GrpcGateway::connect(&options).await?;
        let deliver = options
            .ws_url
            .clone()
            .map(|url| Arc::new(WsDeliver::new(url)) as Arc<dyn DeliverTransport>);
        Ok(GatewayClient {
            transport: Arc::new(transport),
            deliver,
            options,
        })
    }

    /// Build a client over caller-supplied transports. This is the
    /// injection seam tests and alternative deployments use.
    pub fn with_transports(
        options: GatewayOptions,
        transport: Arc<dyn GatewayTransport>,
        deliver: Option<Arc<dyn DeliverTransport>>,
    ) -> Self {
        GatewayClient {
            transport,
            deliver,
            options,
        }
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// Simulate a transaction on the gateway's peers. Evaluate
    /// proposals never reach the ordering service.
    pub async fn evaluate_transaction(
        &self,
        params: &ProposalParams,
        identity: &AppIdentity,
    ) -> Result<EvaluatedTransaction> {
        let (ctx, proposed) = self.signed_proposal(params, identity).await?;
        debug!(tx_id = %ctx.tx_id, chaincode = %params.chaincode_name, "evaluating transaction");

        let response = self
            .transport
            .evaluate(EvaluateRequest {
                transaction_id: ctx.tx_id.clone(),
                channel_id: params.channel_name.clone(),
                proposed_transaction: Some(proposed),
                target_organizations: Vec::new(),
            })
            .await
            .map_err(classify)?;

        let result = response.result.unwrap_or_default();
        Ok(EvaluatedTransaction {
            tx_id: ctx.tx_id,
            status: result.status,
            message: result.message.clone(),
            parsed_data: parse_payload(&result.payload),
        })
    }

    /// Endorse a transaction and hand back the payload to be signed
    /// and submitted.
    pub async fn prepare_transaction(
        &self,
        params: &ProposalParams,
        identity: &AppIdentity,
    ) -> Result<PreparedTransaction> {
        let (ctx, proposed) = self.signed_proposal(params, identity).await?;
        debug!(tx_id = %ctx.tx_id, chaincode = %params.chaincode_name, "endorsing transaction");

        let response = self
            .transport
            .endorse(EndorseRequest {
                transaction_id: ctx.tx_id.clone(),
                channel_id: params.channel_name.clone(),
                proposed_transaction: Some(proposed),
                endorsing_organizations: Vec::new(),
            })
            .await
            .map_err(classify)?;

        let envelope = response
            .prepared_transaction
            .ok_or_else(|| Error::Transport("gateway returned no prepared transaction".into()))?;
        Ok(PreparedTransaction {
            tx_id: ctx.tx_id,
            envelope_payload: envelope.payload,
        })
    }

    /// Sign a prepared payload and hand it to the ordering service.
    /// Returns as soon as the gateway accepts.
    pub async fn submit_signed_transaction(
        &self,
        channel_name: &str,
        tx_id: &str,
        prepared_payload: &[u8],
        identity: &AppIdentity,
    ) -> Result<()> {
        let signature = sign_and_encode(identity, prepared_payload).await?;
        debug!(%tx_id, "submitting transaction");

        self.transport
            .submit(SubmitRequest {
                transaction_id: tx_id.to_string(),
                channel_id: channel_name.to_string(),
                prepared_transaction: Some(Envelope {
                    payload: prepared_payload.to_vec(),
                    signature,
                }),
            })
            .await
            .map_err(classify)?;
        Ok(())
    }

    /// Wait for the transaction's commit-time validation outcome.
    /// Non-VALID codes surface as [`Error::CommitFailed`].
    pub async fn commit_status(
        &self,
        msp_id: &str,
        channel_name: &str,
        tx_id: &str,
        identity: &AppIdentity,
    ) -> Result<CommitOutcome> {
        let creator = serialized_identity(msp_id, &identity.cert_pem);
        let request = build_commit_status_request(channel_name, tx_id, &creator);
        let signature = sign_and_encode(identity, &request).await?;

        let response = self
            .transport
            .commit_status(SignedCommitStatusRequest { request, signature })
            .await
            .map_err(classify)?;

        if response.result != TxValidationCode::Valid as i32 {
            return Err(Error::CommitFailed {
                tx_id: tx_id.to_string(),
                code: TxValidationCode::name_of(response.result),
            });
        }
        debug!(%tx_id, block = response.block_number, "transaction committed");
        Ok(CommitOutcome {
            tx_id: tx_id.to_string(),
            block_number: response.block_number,
            code: TxValidationCode::name_of(response.result),
        })
    }

    /// The full lifecycle: endorse, submit, wait for commit. Failures
    /// are annotated with the stage they occurred in.
    pub async fn submit_and_commit(
        &self,
        params: &ProposalParams,
        identity: &AppIdentity,
    ) -> Result<SubmittedTransaction> {
        let prepared = self
            .prepare_transaction(params, identity)
            .await
            .map_err(|e| annotate("endorse", e))?;

        let result = decode_simulation_response(&prepared.envelope_payload)
            .map(|response| parse_payload(&response.payload))
            .unwrap_or(serde_json::Value::Null);

        self.submit_signed_transaction(
            &params.channel_name,
            &prepared.tx_id,
            &prepared.envelope_payload,
            identity,
        )
        .await
        .map_err(|e| annotate("submit", e))?;

        let outcome = self
            .commit_status(&params.msp_id, &params.channel_name, &prepared.tx_id, identity)
            .await
            .map_err(|e| annotate("commit-status", e))?;

        Ok(SubmittedTransaction {
            tx_id: prepared.tx_id,
            block_number: outcome.block_number,
            result,
        })
    }

    /// Subscribe to chaincode events. The subscription ends cleanly on
    /// cancellation; restart by calling this again.
    pub async fn chaincode_events(
        &self,
        msp_id: &str,
        channel_name: &str,
        chaincode_name: &str,
        identity: &AppIdentity,
    ) -> Result<EventSubscription<ChaincodeEventBatch>> {
        let creator = serialized_identity(msp_id, &identity.cert_pem);
        let request = build_chaincode_events_request(channel_name, chaincode_name, &creator);
        let signature = sign_and_encode(identity, &request).await?;

        let stream = self
            .transport
            .chaincode_events(SignedChaincodeEventsRequest { request, signature })
            .await
            .map_err(classify)?;
        debug!(channel = %channel_name, chaincode = %chaincode_name, "chaincode event stream open");

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let child = token.clone();
        tokio::spawn(async move {
            let mut stream = stream;
            loop {
                let item = tokio::select! {
                    _ = child.cancelled() => break,
                    item = stream.next() => item,
                };
                let outgoing = match item {
                    Some(Ok(response)) => Ok(ChaincodeEventBatch::from(response)),
                    Some(Err(e)) => Err(classify(e)),
                    None => break,
                };
                let is_err = outgoing.is_err();
                let sent = tokio::select! {
                    _ = child.cancelled() => break,
                    sent = tx.send(outgoing) => sent,
                };
                if is_err || sent.is_err() {
                    break;
                }
            }
            debug!("chaincode event stream finished");
        });

        Ok(EventSubscription::new(rx, token))
    }

    /// Subscribe to filtered blocks over the deliver endpoint. Status
    /// records are logged and skipped; the socket closes with code
    /// 1000 on cancellation.
    pub async fn block_events(
        &self,
        params: &BlockEventsParams,
        identity: &AppIdentity,
    ) -> Result<EventSubscription<BlockRecord>> {
        let deliver = self.deliver.clone().ok_or_else(|| {
            Error::input("ws_url is not configured; block events need the deliver endpoint")
        })?;

        let creator = serialized_identity(&params.msp_id, &identity.cert_pem);
        let payload = build_seek_info_payload(&params.channel_name, &creator, params.start);
        let signature = sign_and_encode(identity, &payload).await?;
        let envelope = Envelope { payload, signature }.encode_to_vec();

        let mut session = deliver
            .open(&params.peer_endpoint, &params.hostname)
            .await
            .map_err(classify)?;
        session.send(envelope).await.map_err(classify)?;
        debug!(channel = %params.channel_name, peer = %params.peer_endpoint, "deliver stream open");

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let child = token.clone();
        tokio::spawn(async move {
            loop {
                // The arms must not touch the session themselves: the
                // receive branch holds the mutable borrow until the
                // select resolves.
                let received = tokio::select! {
                    _ = child.cancelled() => None,
                    frame = session.next_frame() => Some(frame),
                };
                let frame = match received {
                    Some(frame) => frame,
                    None => {
                        session.close().await;
                        break;
                    }
                };
                let outgoing = match frame {
                    Some(Ok(bytes)) => match DeliverResponse::decode(bytes.as_slice()) {
                        Ok(response) => match response.r#type {
                            Some(deliver_response::Type::FilteredBlock(block)) => {
                                Ok(BlockRecord::from(block))
                            }
                            Some(deliver_response::Type::Status(code)) => {
                                debug!(code, "deliver status record");
                                continue;
                            }
                            Some(deliver_response::Type::Block(_)) | None => {
                                warn!("ignoring unexpected deliver response variant");
                                continue;
                            }
                        },
                        Err(e) => Err(Error::StreamProtocol(format!(
                            "undecodable deliver frame: {e}"
                        ))),
                    },
                    Some(Err(e)) => Err(classify(e)),
                    None => break,
                };
                let is_err = outgoing.is_err();
                let sent = tokio::select! {
                    _ = child.cancelled() => {
                        session.close().await;
                        break;
                    }
                    sent = tx.send(outgoing) => sent,
                };
                if is_err || sent.is_err() {
                    session.close().await;
                    break;
                }
            }
            debug!("block event stream finished");
        });

        Ok(EventSubscription::new(rx, token))
    }

    async fn signed_proposal(
        &self,
        params: &ProposalParams,
        identity: &AppIdentity,
    ) -> Result<(TransactionContext, SignedProposal)> {
        let ctx = TransactionContext::generate(&params.msp_id, &identity.cert_pem);
        let proposal_bytes = build_proposal(params, &ctx).encode_to_vec();
        let signature = sign_and_encode(identity, &proposal_bytes).await?;
        Ok((
            ctx,
            SignedProposal {
                proposal_bytes,
                signature,
            },
        ))
    }
}

/// Map a transport failure onto the error taxonomy. Decoded gateway
/// details mean the chaincode or the endorsing peers rejected the
/// proposal, and their innermost message wins over the outer status.
fn classify(err: TransportError) -> Error {
    if err.protocol_violation {
        return Error::StreamProtocol(err.message);
    }
    if !err.details.is_empty() {
        let detail = err
            .details
            .iter()
            .map(|d| d.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return Error::Endorsement(detail);
    }
    Error::Transport(err.message)
}

fn annotate(stage: &str, err: Error) -> Error {
    match err {
        Error::Transport(msg) => Error::Transport(format!("{stage}: {msg}")),
        Error::Endorsement(msg) => Error::Endorsement(format!("{stage}: {msg}")),
        other => other,
    }
}
