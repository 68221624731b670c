//! Event records and the cancellable subscription the client hands to
//! consumers.
//!
//! A subscription is the pull half of a bounded channel; the producer
//! task owning the transport stream writes into it. Back-pressure is
//! the consumer's: when the channel fills, the producer stops pulling
//! from the transport. Cancelling (or dropping) the subscription stops
//! the producer without surfacing an error item.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use fabvault_common::Result;
use fabvault_proto::gateway::ChaincodeEventsResponse;
use fabvault_proto::peer::{self, TxValidationCode};

/// Bound of the producer/consumer channel behind each subscription.
pub(crate) const SUBSCRIPTION_BUFFER: usize = 16;

/// One chaincode event as emitted by a committed transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct ChaincodeEventRecord {
    pub tx_id: String,
    pub chaincode_name: String,
    pub event_name: String,
    pub payload: Vec<u8>,
}

impl From<peer::ChaincodeEvent> for ChaincodeEventRecord {
    fn from(event: peer::ChaincodeEvent) -> Self {
        ChaincodeEventRecord {
            tx_id: event.tx_id,
            chaincode_name: event.chaincode_id,
            event_name: event.event_name,
            payload: event.payload,
        }
    }
}

/// The events of one committed block, in commit order.
#[derive(Clone, Debug, PartialEq)]
pub struct ChaincodeEventBatch {
    pub block_number: u64,
    pub events: Vec<ChaincodeEventRecord>,
}

impl From<ChaincodeEventsResponse> for ChaincodeEventBatch {
    fn from(response: ChaincodeEventsResponse) -> Self {
        ChaincodeEventBatch {
            block_number: response.block_number,
            events: response.events.into_iter().map(Into::into).collect(),
        }
    }
}

/// One transaction of a filtered block.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockTransactionRecord {
    pub tx_id: String,
    /// Validation code name, e.g. `VALID` or `MVCC_READ_CONFLICT`.
    pub validation_code: String,
    pub chaincode_actions: Vec<ChaincodeEventRecord>,
}

/// A filtered block from the deliver stream. The block number is
/// authoritative even if the transport reorders delivery.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockRecord {
    pub channel_id: String,
    pub number: u64,
    pub transactions: Vec<BlockTransactionRecord>,
}

impl From<peer::FilteredBlock> for BlockRecord {
    fn from(block: peer::FilteredBlock) -> Self {
        let transactions = block
            .filtered_transactions
            .into_iter()
            .map(|tx| {
                let chaincode_actions = match tx.data {
                    Some(peer::filtered_transaction::Data::TransactionActions(actions)) => actions
                        .chaincode_actions
                        .into_iter()
                        .filter_map(|action| action.chaincode_event.map(Into::into))
                        .collect(),
                    None => Vec::new(),
                };
                BlockTransactionRecord {
                    tx_id: tx.txid,
                    validation_code: TxValidationCode::name_of(tx.tx_validation_code),
                    chaincode_actions,
                }
            })
            .collect();
        BlockRecord {
            channel_id: block.channel_id,
            number: block.number,
            transactions,
        }
    }
}

/// Pull side of an event stream. Single-consumer; a finished stream
/// yields `None` and a new stream must be requested from the client.
#[derive(Debug)]
pub struct EventSubscription<T> {
    rx: mpsc::Receiver<Result<T>>,
    cancel: CancellationToken,
}

impl<T> EventSubscription<T> {
    pub(crate) fn new(rx: mpsc::Receiver<Result<T>>, cancel: CancellationToken) -> Self {
        EventSubscription { rx, cancel }
    }

    /// Next event, an error item, or `None` when the stream ended
    /// (including after cancellation).
    pub async fn next(&mut self) -> Option<Result<T>> {
        self.rx.recv().await
    }

    /// Stop the producer. The stream drains and ends without an error
    /// item.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl<T> Drop for EventSubscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
