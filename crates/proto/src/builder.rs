//! Builders for every byte sequence the client signs.
//!
//! Apart from nonce generation (and the timestamp on the deliver seek
//! envelope) these are pure functions: the same inputs always produce
//! the same bytes. The proposal builder in particular must be
//! deterministic for a fixed nonce, so the endorser-transaction channel
//! header carries no timestamp.

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use rand::rngs::OsRng;
use rand::RngCore;

use fabvault_common::cid::sha256_hex_concat;

use crate::common::{ChannelHeader, Header, HeaderType, Payload, SignatureHeader};
use crate::gateway::{ChaincodeEventsRequest, CommitStatusRequest};
use crate::msp::SerializedIdentity;
use crate::orderer::{
    seek_info::SeekBehavior, seek_position, SeekInfo, SeekNewest, SeekPosition, SeekSpecified,
};
use crate::peer::{
    chaincode_spec, ChaincodeHeaderExtension, ChaincodeId, ChaincodeInput,
    ChaincodeInvocationSpec, ChaincodeProposalPayload, ChaincodeSpec, Proposal,
};

/// Nonce length, bytes. One nonce is used exactly once per transaction.
pub const NONCE_LEN: usize = 24;

/// Stop position for a continuous deliver stream (2^53 − 1, the largest
/// block number the proxy's original consumers could represent).
pub const SEEK_STOP_MAX: u64 = 9_007_199_254_740_991;

/// Encode the creator identity the way peers deserialize it.
pub fn serialized_identity(msp_id: &str, cert_pem: &str) -> Vec<u8> {
    SerializedIdentity {
        mspid: msp_id.to_string(),
        id_bytes: cert_pem.as_bytes().to_vec(),
    }
    .encode_to_vec()
}

/// Per-transaction derived state: nonce, serialized creator and the
/// transaction id bound to both.
#[derive(Clone, Debug)]
pub struct TransactionContext {
    pub nonce: Vec<u8>,
    pub creator: Vec<u8>,
    pub tx_id: String,
}

impl TransactionContext {
    /// Generate a fresh context for one transaction.
    pub fn generate(msp_id: &str, cert_pem: &str) -> Self {
        let mut nonce = vec![0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let creator = serialized_identity(msp_id, cert_pem);
        Self::from_parts(nonce, creator)
    }

    /// Rebuild a context from known parts. The transaction id is a pure
    /// function of nonce and creator: `hex(SHA-256(nonce || creator))`.
    pub fn from_parts(nonce: Vec<u8>, creator: Vec<u8>) -> Self {
        let tx_id = sha256_hex_concat(&nonce, &creator);
        TransactionContext {
            nonce,
            creator,
            tx_id,
        }
    }
}

/// One chaincode invocation argument, either text or raw bytes. The
/// serialized form is identical; the distinction only spares callers a
/// conversion.
#[derive(Clone, Debug)]
pub enum TransactionArg {
    Str(String),
    Bytes(Vec<u8>),
}

impl TransactionArg {
    fn into_bytes(self) -> Vec<u8> {
        match self {
            TransactionArg::Str(s) => s.into_bytes(),
            TransactionArg::Bytes(b) => b,
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.clone().into_bytes()
    }
}

impl From<&str> for TransactionArg {
    fn from(value: &str) -> Self {
        TransactionArg::Str(value.to_string())
    }
}

impl From<String> for TransactionArg {
    fn from(value: String) -> Self {
        TransactionArg::Str(value)
    }
}

impl From<Vec<u8>> for TransactionArg {
    fn from(value: Vec<u8>) -> Self {
        TransactionArg::Bytes(value)
    }
}

/// What to invoke and as whom.
#[derive(Clone, Debug)]
pub struct ProposalParams {
    pub msp_id: String,
    pub channel_name: String,
    pub chaincode_name: String,
    pub function_name: String,
    pub args: Vec<TransactionArg>,
}

impl ProposalParams {
    pub fn new(
        msp_id: impl Into<String>,
        channel_name: impl Into<String>,
        chaincode_name: impl Into<String>,
        function_name: impl Into<String>,
    ) -> Self {
        ProposalParams {
            msp_id: msp_id.into(),
            channel_name: channel_name.into(),
            chaincode_name: chaincode_name.into(),
            function_name: function_name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<TransactionArg>) -> Self {
        self.args = args;
        self
    }
}

/// Build the endorser-transaction proposal for `params` under `ctx`.
///
/// Channel header: ENDORSER_TRANSACTION, version 1, epoch 0, no
/// timestamp, extension carrying the chaincode id. Invocation args are
/// `[function_name, params.args...]` in order. Chaincode type is
/// GOLANG unconditionally, matching what deployed peers expect.
pub fn build_proposal(params: &ProposalParams, ctx: &TransactionContext) -> Proposal {
    let chaincode_id = ChaincodeId {
        path: String::new(),
        name: params.chaincode_name.clone(),
        version: String::new(),
    };

    let mut args = Vec::with_capacity(params.args.len() + 1);
    args.push(params.function_name.clone().into_bytes());
    args.extend(params.args.iter().map(TransactionArg::to_bytes));

    let invocation = ChaincodeInvocationSpec {
        chaincode_spec: Some(ChaincodeSpec {
            r#type: chaincode_spec::Type::Golang as i32,
            chaincode_id: Some(chaincode_id.clone()),
            input: Some(ChaincodeInput {
                args,
                decorations: Default::default(),
                is_init: false,
            }),
            timeout: 0,
        }),
    };

    let extension = ChaincodeHeaderExtension {
        chaincode_id: Some(chaincode_id),
    }
    .encode_to_vec();

    let channel_header = ChannelHeader {
        r#type: HeaderType::EndorserTransaction as i32,
        version: 1,
        timestamp: None,
        channel_id: params.channel_name.clone(),
        tx_id: ctx.tx_id.clone(),
        epoch: 0,
        extension,
        tls_cert_hash: Vec::new(),
    };

    let signature_header = SignatureHeader {
        creator: ctx.creator.clone(),
        nonce: ctx.nonce.clone(),
    };

    let header = Header {
        channel_header: channel_header.encode_to_vec(),
        signature_header: signature_header.encode_to_vec(),
    };

    let payload = ChaincodeProposalPayload {
        input: invocation.encode_to_vec(),
        transient_map: Default::default(),
    };

    Proposal {
        header: header.encode_to_vec(),
        payload: payload.encode_to_vec(),
        extension: Vec::new(),
    }
}

/// Where a deliver stream starts.
#[derive(Clone, Copy, Debug)]
pub enum SeekStart {
    /// From the newest block the peer has.
    Newest,
    /// From a specific block number.
    Specified(u64),
}

impl Default for SeekStart {
    fn default() -> Self {
        SeekStart::Newest
    }
}

/// Build the payload of the DELIVER_SEEK_INFO envelope: a continuous
/// stream from `start` with BLOCK_UNTIL_READY behavior. The caller
/// signs these bytes and wraps payload + signature into an `Envelope`.
pub fn build_seek_info_payload(channel_name: &str, creator: &[u8], start: SeekStart) -> Vec<u8> {
    let start_position = match start {
        SeekStart::Newest => SeekPosition {
            r#type: Some(seek_position::Type::Newest(SeekNewest {})),
        },
        SeekStart::Specified(number) => SeekPosition {
            r#type: Some(seek_position::Type::Specified(SeekSpecified { number })),
        },
    };

    let seek_info = SeekInfo {
        start: Some(start_position),
        stop: Some(SeekPosition {
            r#type: Some(seek_position::Type::Specified(SeekSpecified {
                number: SEEK_STOP_MAX,
            })),
        }),
        behavior: SeekBehavior::BlockUntilReady as i32,
        error_response: 0,
    };

    let channel_header = ChannelHeader {
        r#type: HeaderType::DeliverSeekInfo as i32,
        version: 1,
        timestamp: Some(now_timestamp()),
        channel_id: channel_name.to_string(),
        tx_id: String::new(),
        epoch: 0,
        extension: Vec::new(),
        tls_cert_hash: Vec::new(),
    };

    let mut nonce = vec![0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let header = Header {
        channel_header: channel_header.encode_to_vec(),
        signature_header: SignatureHeader {
            creator: creator.to_vec(),
            nonce,
        }
        .encode_to_vec(),
    };

    Payload {
        header: Some(header),
        data: seek_info.encode_to_vec(),
    }
    .encode_to_vec()
}

/// Encode the commit-status request; the signature of the "signed
/// request" wrapper covers exactly these bytes.
pub fn build_commit_status_request(channel_name: &str, tx_id: &str, creator: &[u8]) -> Vec<u8> {
    CommitStatusRequest {
        transaction_id: tx_id.to_string(),
        channel_id: channel_name.to_string(),
        identity: creator.to_vec(),
    }
    .encode_to_vec()
}

/// Encode the chaincode-events request; the signature of the "signed
/// request" wrapper covers exactly these bytes.
pub fn build_chaincode_events_request(
    channel_name: &str,
    chaincode_name: &str,
    creator: &[u8],
) -> Vec<u8> {
    ChaincodeEventsRequest {
        channel_id: channel_name.to_string(),
        chaincode_id: chaincode_name.to_string(),
        identity: creator.to_vec(),
        start_position: None,
        after_transaction_id: String::new(),
    }
    .encode_to_vec()
}

fn now_timestamp() -> prost_types::Timestamp {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    prost_types::Timestamp {
        seconds: now.as_secs() as i64,
        nanos: now.subsec_nanos() as i32,
    }
}
