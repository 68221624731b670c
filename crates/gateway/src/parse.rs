//! Chaincode response payload parsing.
//!
//! Chaincode authors return whatever bytes they like; in practice that
//! is JSON, sometimes plain text, occasionally raw bytes. The parser
//! surfaces the richest interpretation that holds: JSON value, then
//! UTF-8 string, then a hex rendering.

use prost::Message;
use serde_json::Value;

use fabvault_proto::common::Payload;
use fabvault_proto::peer::{
    ChaincodeAction, ChaincodeActionPayload, ProposalResponsePayload, Response, Transaction,
};

/// The outcome of an evaluated transaction.
#[derive(Clone, Debug)]
pub struct EvaluatedTransaction {
    pub tx_id: String,
    /// Chaincode response status (200 on success).
    pub status: i32,
    pub message: String,
    pub parsed_data: Value,
}

/// Interpret a chaincode response payload.
pub fn parse_payload(payload: &[u8]) -> Value {
    match std::str::from_utf8(payload) {
        Ok(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => value,
            Err(_) => Value::String(text.to_string()),
        },
        Err(_) => Value::String(format!("(binary) 0x{}", hex::encode(payload))),
    }
}

/// Pull the simulated chaincode response out of an endorsed envelope
/// payload, when the gateway embedded one.
pub fn decode_simulation_response(envelope_payload: &[u8]) -> Option<Response> {
    let payload = Payload::decode(envelope_payload).ok()?;
    let transaction = Transaction::decode(payload.data.as_slice()).ok()?;
    let action = transaction.actions.first()?;
    let action_payload = ChaincodeActionPayload::decode(action.payload.as_slice()).ok()?;
    let endorsed = action_payload.action?;
    let response_payload =
        ProposalResponsePayload::decode(endorsed.proposal_response_payload.as_slice()).ok()?;
    let chaincode_action = ChaincodeAction::decode(response_payload.extension.as_slice()).ok()?;
    chaincode_action.response
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabvault_proto::common::Header;
    use fabvault_proto::peer::{ChaincodeEndorsedAction, TransactionAction};
    use serde_json::json;

    #[test]
    fn json_payloads_parse_to_structures() {
        let value = parse_payload(br#"[{"ID":"asset1"},{"ID":"asset2"}]"#);
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[0]["ID"], json!("asset1"));
    }

    #[test]
    fn non_json_utf8_stays_a_string() {
        let value = parse_payload(b"plain text result");
        assert_eq!(value, Value::String("plain text result".to_string()));
    }

    #[test]
    fn binary_payloads_render_as_hex() {
        let value = parse_payload(&[0xff, 0xfe, 0x00]);
        assert_eq!(value, Value::String("(binary) 0xfffe00".to_string()));
    }

    #[test]
    fn parsing_is_idempotent() {
        for payload in [
            br#"{"Owner":"owner1","Size":10}"#.as_slice(),
            br#"[1,2,3]"#.as_slice(),
            b"not json".as_slice(),
        ] {
            let once = parse_payload(payload);
            let twice = parse_payload(once.to_string().as_bytes());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn empty_payload_is_an_empty_string() {
        assert_eq!(parse_payload(b""), Value::String(String::new()));
    }

    #[test]
    fn simulation_response_is_recovered_from_an_endorsed_payload() {
        let response = Response {
            status: 200,
            message: String::new(),
            payload: br#"{"ok":true}"#.to_vec(),
        };
        let chaincode_action = ChaincodeAction {
            results: Vec::new(),
            events: Vec::new(),
            response: Some(response),
            chaincode_id: None,
        };
        let response_payload = ProposalResponsePayload {
            proposal_hash: Vec::new(),
            extension: chaincode_action.encode_to_vec(),
        };
        let endorsed = ChaincodeEndorsedAction {
            proposal_response_payload: response_payload.encode_to_vec(),
            endorsements: Vec::new(),
        };
        let action_payload = ChaincodeActionPayload {
            chaincode_proposal_payload: Vec::new(),
            action: Some(endorsed),
        };
        let transaction = Transaction {
            actions: vec![TransactionAction {
                header: Vec::new(),
                payload: action_payload.encode_to_vec(),
            }],
        };
        let payload = Payload {
            header: Some(Header::default()),
            data: transaction.encode_to_vec(),
        };

        let recovered =
            decode_simulation_response(&payload.encode_to_vec()).expect("response present");
        assert_eq!(recovered.status, 200);
        assert_eq!(parse_payload(&recovered.payload), json!({"ok": true}));
    }

    #[test]
    fn garbage_envelope_payload_yields_none() {
        // Wire type mismatches make the decode fail outright.
        assert!(decode_simulation_response(&[0x0d, 0x01]).is_none());
    }
}
