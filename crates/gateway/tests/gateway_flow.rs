//! End-to-end client behavior against scripted transports.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use prost::Message;
use serde_json::json;

use fabvault_common::{Error, GatewayOptions};
use fabvault_custodian::{AppIdentity, Custodian};
use fabvault_gateway::{
    BlockEventsParams, DeliverSession, DeliverTransport, EventStream, GatewayClient,
    GatewayTransport, TransportError,
};
use fabvault_proto::builder::{ProposalParams, SeekStart, TransactionContext};
use fabvault_proto::common::{Envelope, Header, Payload, SignatureHeader};
use fabvault_proto::gateway::{
    ChaincodeEventsResponse, CommitStatusResponse, EndorseRequest, EndorseResponse, ErrorDetail,
    EvaluateRequest, EvaluateResponse, SignedChaincodeEventsRequest, SignedCommitStatusRequest,
    SubmitRequest, SubmitResponse,
};
use fabvault_proto::orderer::{seek_position, SeekInfo};
use fabvault_proto::peer::{
    deliver_response, ChaincodeEvent, DeliverResponse, FilteredBlock, Proposal, Response,
    TxValidationCode,
};
use fabvault_storage::MemoryStore;

use p256::ecdsa::signature::Verifier as _;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{EncodePrivateKey, LineEnding};

const CERT_PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIBtestcert\n-----END CERTIFICATE-----\n";

async fn test_identity() -> (AppIdentity, VerifyingKey) {
    let secret = p256::SecretKey::random(&mut rand::rngs::OsRng);
    let verifier = VerifyingKey::from(&SigningKey::from(secret.clone()));
    let key_pem = secret
        .to_pkcs8_pem(LineEnding::LF)
        .expect("encode key")
        .to_string();

    let custodian = Custodian::new(Arc::new(MemoryStore::new()));
    let identity = custodian
        .import_identity(CERT_PEM, &key_pem)
        .await
        .expect("import identity");
    (identity, verifier)
}

fn options() -> GatewayOptions {
    GatewayOptions::new("http://gateway.test:7051")
}

#[derive(Default)]
struct FakeTransport {
    evaluate_script: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
    prepared_payload: Mutex<Vec<u8>>,
    commit_result: Mutex<i32>,
    calls: Mutex<Vec<&'static str>>,
    evaluate_requests: Mutex<Vec<EvaluateRequest>>,
    submit_requests: Mutex<Vec<SubmitRequest>>,
    events_stream: Mutex<Option<EventStream>>,
}

impl FakeTransport {
    fn with_evaluate_payload(payload: &[u8]) -> Self {
        let fake = FakeTransport::default();
        fake.evaluate_script
            .lock()
            .unwrap()
            .push_back(Ok(payload.to_vec()));
        fake
    }
}

#[async_trait]
impl GatewayTransport for FakeTransport {
    async fn evaluate(
        &self,
        request: EvaluateRequest,
    ) -> Result<EvaluateResponse, TransportError> {
        self.calls.lock().unwrap().push("evaluate");
        self.evaluate_requests.lock().unwrap().push(request);
        let scripted = self
            .evaluate_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(b"{}".to_vec()));
        scripted.map(|payload| EvaluateResponse {
            result: Some(Response {
                status: 200,
                message: String::new(),
                payload,
            }),
        })
    }

    async fn endorse(&self, _request: EndorseRequest) -> Result<EndorseResponse, TransportError> {
        self.calls.lock().unwrap().push("endorse");
        Ok(EndorseResponse {
            prepared_transaction: Some(Envelope {
                payload: self.prepared_payload.lock().unwrap().clone(),
                signature: Vec::new(),
            }),
        })
    }

    async fn submit(&self, request: SubmitRequest) -> Result<SubmitResponse, TransportError> {
        self.calls.lock().unwrap().push("submit");
        self.submit_requests.lock().unwrap().push(request);
        Ok(SubmitResponse {})
    }

    async fn commit_status(
        &self,
        _request: SignedCommitStatusRequest,
    ) -> Result<CommitStatusResponse, TransportError> {
        self.calls.lock().unwrap().push("commit_status");
        Ok(CommitStatusResponse {
            result: *self.commit_result.lock().unwrap(),
            block_number: 7,
        })
    }

    async fn chaincode_events(
        &self,
        _request: SignedChaincodeEventsRequest,
    ) -> Result<EventStream, TransportError> {
        self.calls.lock().unwrap().push("chaincode_events");
        self.events_stream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransportError::message_only("no stream scripted"))
    }
}

fn client_with(fake: Arc<FakeTransport>) -> GatewayClient {
    GatewayClient::with_transports(options(), fake, None)
}

#[tokio::test]
async fn evaluate_round_trip_parses_the_asset_list() {
    let (identity, verifier) = test_identity().await;
    let assets = br#"[{"ID":"asset1","Color":"blue"},{"ID":"asset2","Color":"red"}]"#;
    let fake = Arc::new(FakeTransport::with_evaluate_payload(assets));
    let client = client_with(fake.clone());

    let params = ProposalParams::new("Org1MSP", "mychannel", "basic", "GetAllAssets");
    let evaluated = client
        .evaluate_transaction(&params, &identity)
        .await
        .expect("evaluate");

    assert_eq!(evaluated.status, 200);
    assert_eq!(evaluated.parsed_data.as_array().map(Vec::len), Some(2));
    assert_eq!(evaluated.tx_id.len(), 64);
    assert!(evaluated.tx_id.chars().all(|c| c.is_ascii_hexdigit()));

    // The proposal on the wire is signed with the identity's key, and
    // its transaction id is bound to the nonce and creator it carries.
    let requests = fake.evaluate_requests.lock().unwrap();
    let proposed = requests[0].proposed_transaction.as_ref().expect("proposal");
    let signature = Signature::from_der(&proposed.signature).expect("der signature");
    verifier
        .verify(&proposed.proposal_bytes, &signature)
        .expect("signature verifies");

    let proposal = Proposal::decode(proposed.proposal_bytes.as_slice()).expect("proposal");
    let header = Header::decode(proposal.header.as_slice()).expect("header");
    let signature_header =
        SignatureHeader::decode(header.signature_header.as_slice()).expect("signature header");
    let rebuilt =
        TransactionContext::from_parts(signature_header.nonce, signature_header.creator);
    assert_eq!(rebuilt.tx_id, evaluated.tx_id);
}

#[tokio::test]
async fn create_then_read_commits_and_parses_the_asset() {
    let (identity, verifier) = test_identity().await;
    let fake = Arc::new(FakeTransport::default());
    *fake.prepared_payload.lock().unwrap() = b"prepared-envelope-payload".to_vec();
    fake.evaluate_script.lock().unwrap().push_back(Ok(
        br#"{"ID":"test-asset-1","Color":"blue","Size":10,"Owner":"owner1","AppraisedValue":500}"#
            .to_vec(),
    ));
    let client = client_with(fake.clone());

    let create = ProposalParams::new("Org1MSP", "mychannel", "basic", "CreateAsset").with_args(
        vec![
            "test-asset-1".into(),
            "blue".into(),
            "10".into(),
            "owner1".into(),
            "500".into(),
        ],
    );
    let submitted = client
        .submit_and_commit(&create, &identity)
        .await
        .expect("submit and commit");
    assert_eq!(submitted.block_number, 7);

    let read = ProposalParams::new("Org1MSP", "mychannel", "basic", "ReadAsset")
        .with_args(vec!["test-asset-1".into()]);
    let evaluated = client
        .evaluate_transaction(&read, &identity)
        .await
        .expect("evaluate");
    assert_eq!(
        evaluated.parsed_data,
        json!({"ID":"test-asset-1","Color":"blue","Size":10,"Owner":"owner1","AppraisedValue":500})
    );

    // Lifecycle ordering: endorse before submit before commit status.
    assert_eq!(
        *fake.calls.lock().unwrap(),
        vec!["endorse", "submit", "commit_status", "evaluate"]
    );

    // The submitted envelope wraps the prepared payload with a fresh
    // DER signature over exactly those bytes.
    let submits = fake.submit_requests.lock().unwrap();
    let envelope = submits[0].prepared_transaction.as_ref().expect("envelope");
    assert_eq!(envelope.payload, b"prepared-envelope-payload");
    let signature = Signature::from_der(&envelope.signature).expect("der signature");
    verifier
        .verify(&envelope.payload, &signature)
        .expect("signature verifies");
}

#[tokio::test]
async fn endorsement_detail_wins_over_the_outer_status_message() {
    let (identity, _) = test_identity().await;
    let fake = Arc::new(FakeTransport::default());
    fake.evaluate_script
        .lock()
        .unwrap()
        .push_back(Err(TransportError {
            code: 10,
            message: "evaluate call failed".to_string(),
            details: vec![ErrorDetail {
                address: "peer0.org1:7051".to_string(),
                msp_id: "Org1MSP".to_string(),
                message:
                    "chaincode response 500, Function NonExistentFunction not found in contract"
                        .to_string(),
            }],
            protocol_violation: false,
        }));
    let client = client_with(fake);

    let params = ProposalParams::new("Org1MSP", "mychannel", "basic", "NonExistentFunction");
    let err = client
        .evaluate_transaction(&params, &identity)
        .await
        .unwrap_err();

    match &err {
        Error::Endorsement(msg) => {
            assert!(msg.contains("Function NonExistentFunction not found"), "{msg}")
        }
        other => panic!("expected an endorsement failure, got {other:?}"),
    }
}

#[tokio::test]
async fn plain_transport_failures_stay_transport_errors() {
    let (identity, _) = test_identity().await;
    let fake = Arc::new(FakeTransport::default());
    fake.evaluate_script
        .lock()
        .unwrap()
        .push_back(Err(TransportError::message_only("connection refused")));
    let client = client_with(fake);

    let params = ProposalParams::new("Org1MSP", "mychannel", "basic", "GetAllAssets");
    let err = client
        .evaluate_transaction(&params, &identity)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn commit_failure_carries_the_validation_code_and_tx_id() {
    let (identity, _) = test_identity().await;
    let fake = Arc::new(FakeTransport::default());
    *fake.commit_result.lock().unwrap() = TxValidationCode::MvccReadConflict as i32;
    let client = client_with(fake);

    let params = ProposalParams::new("Org1MSP", "mychannel", "basic", "CreateAsset")
        .with_args(vec!["a".into()]);
    let err = client.submit_and_commit(&params, &identity).await.unwrap_err();

    match &err {
        Error::CommitFailed { tx_id, code } => {
            assert_eq!(code, "MVCC_READ_CONFLICT");
            assert_eq!(tx_id.len(), 64);
            assert!(err.to_string().contains(tx_id.as_str()));
            assert!(err.to_string().contains("MVCC_READ_CONFLICT"));
        }
        other => panic!("expected a commit failure, got {other:?}"),
    }
}

#[tokio::test]
async fn chaincode_event_stream_yields_batches_then_ends() {
    let (identity, _) = test_identity().await;
    let fake = Arc::new(FakeTransport::default());
    let responses = vec![
        Ok(ChaincodeEventsResponse {
            block_number: 4,
            events: vec![ChaincodeEvent {
                chaincode_id: "basic".to_string(),
                tx_id: "tx-a".to_string(),
                event_name: "AssetCreated".to_string(),
                payload: b"asset1".to_vec(),
            }],
        }),
        Ok(ChaincodeEventsResponse {
            block_number: 5,
            events: Vec::new(),
        }),
    ];
    *fake.events_stream.lock().unwrap() = Some(Box::pin(futures::stream::iter(responses)));
    let client = client_with(fake);

    let mut subscription = client
        .chaincode_events("Org1MSP", "mychannel", "basic", &identity)
        .await
        .expect("subscribe");

    let first = subscription.next().await.expect("item").expect("batch");
    assert_eq!(first.block_number, 4);
    assert_eq!(first.events[0].event_name, "AssetCreated");

    let second = subscription.next().await.expect("item").expect("batch");
    assert_eq!(second.block_number, 5);

    assert!(subscription.next().await.is_none(), "stream ended");
}

#[tokio::test]
async fn cancelling_a_chaincode_event_stream_ends_it_without_an_error() {
    let (identity, _) = test_identity().await;
    let fake = Arc::new(FakeTransport::default());
    *fake.events_stream.lock().unwrap() = Some(Box::pin(futures::stream::pending()));
    let client = client_with(fake);

    let mut subscription = client
        .chaincode_events("Org1MSP", "mychannel", "basic", &identity)
        .await
        .expect("subscribe");

    subscription.cancel();
    let next = tokio::time::timeout(Duration::from_secs(2), subscription.next())
        .await
        .expect("terminates within the timeout");
    assert!(next.is_none(), "cancellation must not surface an error");
}

// ---------------------------------------------------------------------------
// Deliver stream fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DeliverState {
    sent: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
    opened_with: Mutex<Option<(String, String)>>,
}

struct FakeDeliver {
    frames: Mutex<Option<VecDeque<Result<Vec<u8>, TransportError>>>>,
    hang_when_drained: bool,
    state: Arc<DeliverState>,
}

impl FakeDeliver {
    fn new(
        frames: Vec<Result<Vec<u8>, TransportError>>,
        hang_when_drained: bool,
    ) -> (Arc<Self>, Arc<DeliverState>) {
        let state = Arc::new(DeliverState::default());
        let transport = Arc::new(FakeDeliver {
            frames: Mutex::new(Some(frames.into())),
            hang_when_drained,
            state: state.clone(),
        });
        (transport, state)
    }
}

#[async_trait]
impl DeliverTransport for FakeDeliver {
    async fn open(
        &self,
        target: &str,
        hostname: &str,
    ) -> Result<Box<dyn DeliverSession>, TransportError> {
        *self.state.opened_with.lock().unwrap() =
            Some((target.to_string(), hostname.to_string()));
        let frames = self
            .frames
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransportError::message_only("already opened"))?;
        Ok(Box::new(FakeSession {
            frames,
            hang_when_drained: self.hang_when_drained,
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    frames: VecDeque<Result<Vec<u8>, TransportError>>,
    hang_when_drained: bool,
    state: Arc<DeliverState>,
}

#[async_trait]
impl DeliverSession for FakeSession {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.state.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        match self.frames.pop_front() {
            Some(frame) => Some(frame),
            None if self.hang_when_drained => std::future::pending().await,
            None => None,
        }
    }

    async fn close(&mut self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}

fn block_params() -> BlockEventsParams {
    BlockEventsParams {
        msp_id: "Org1MSP".to_string(),
        channel_name: "mychannel".to_string(),
        peer_endpoint: "peer0.org1:7051".to_string(),
        hostname: "peer0.org1.example.com".to_string(),
        start: SeekStart::Newest,
    }
}

fn status_frame(code: i32) -> Vec<u8> {
    DeliverResponse {
        r#type: Some(deliver_response::Type::Status(code)),
    }
    .encode_to_vec()
}

fn filtered_block_frame(number: u64) -> Vec<u8> {
    DeliverResponse {
        r#type: Some(deliver_response::Type::FilteredBlock(FilteredBlock {
            channel_id: "mychannel".to_string(),
            number,
            filtered_transactions: Vec::new(),
        })),
    }
    .encode_to_vec()
}

#[tokio::test]
async fn block_events_send_the_seek_envelope_and_skip_status_records() {
    let (identity, verifier) = test_identity().await;
    let (deliver, state) = FakeDeliver::new(
        vec![Ok(status_frame(200)), Ok(filtered_block_frame(42))],
        false,
    );
    let fake = Arc::new(FakeTransport::default());
    let client = GatewayClient::with_transports(options(), fake, Some(deliver));

    let mut subscription = client
        .block_events(&block_params(), &identity)
        .await
        .expect("subscribe");

    let block = subscription.next().await.expect("item").expect("block");
    assert_eq!(block.number, 42);
    assert_eq!(block.channel_id, "mychannel");
    assert!(subscription.next().await.is_none(), "stream ended");

    let opened = state.opened_with.lock().unwrap().clone().expect("opened");
    assert_eq!(opened.0, "peer0.org1:7051");
    assert_eq!(opened.1, "peer0.org1.example.com");

    // The one request frame is a signed envelope whose payload seeks a
    // continuous filtered stream.
    let sent = state.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let envelope = Envelope::decode(sent[0].as_slice()).expect("envelope");
    let signature = Signature::from_der(&envelope.signature).expect("der signature");
    verifier
        .verify(&envelope.payload, &signature)
        .expect("signature verifies");

    let payload = Payload::decode(envelope.payload.as_slice()).expect("payload");
    let seek_info = SeekInfo::decode(payload.data.as_slice()).expect("seek info");
    match seek_info.stop.unwrap().r#type.unwrap() {
        seek_position::Type::Specified(stop) => assert_eq!(stop.number, 9_007_199_254_740_991),
        other => panic!("expected specified stop, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelling_block_events_closes_the_socket_cleanly() {
    let (identity, _) = test_identity().await;
    let (deliver, state) = FakeDeliver::new(vec![Ok(filtered_block_frame(1))], true);
    let fake = Arc::new(FakeTransport::default());
    let client = GatewayClient::with_transports(options(), fake, Some(deliver));

    let mut subscription = client
        .block_events(&block_params(), &identity)
        .await
        .expect("subscribe");
    let first = subscription.next().await.expect("item").expect("block");
    assert_eq!(first.number, 1);

    subscription.cancel();
    let next = tokio::time::timeout(Duration::from_secs(2), subscription.next())
        .await
        .expect("terminates within the timeout");
    assert!(next.is_none(), "cancellation must not surface an error");

    // The producer had a bounded moment to observe the cancellation.
    tokio::time::timeout(Duration::from_secs(2), async {
        while !state.closed.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("socket closed");
}

#[tokio::test]
async fn malformed_deliver_frames_surface_as_protocol_errors() {
    let (identity, _) = test_identity().await;
    let (deliver, _state) = FakeDeliver::new(
        vec![Ok(vec![0x0d, 0x01])], // truncated fixed32 field
        false,
    );
    let fake = Arc::new(FakeTransport::default());
    let client = GatewayClient::with_transports(options(), fake, Some(deliver));

    let mut subscription = client
        .block_events(&block_params(), &identity)
        .await
        .expect("subscribe");
    let err = subscription.next().await.expect("item").unwrap_err();
    assert!(matches!(err, Error::StreamProtocol(_)));
    assert!(subscription.next().await.is_none());
}

#[tokio::test]
async fn block_events_without_a_deliver_endpoint_are_rejected() {
    let (identity, _) = test_identity().await;
    let fake = Arc::new(FakeTransport::default());
    let client = GatewayClient::with_transports(options(), fake, None);

    let err = client
        .block_events(&block_params(), &identity)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InputInvalid(_)));
}
