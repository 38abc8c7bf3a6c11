//! Transaction handle as seen by a scan.

use crate::error::ColScanResult;
use crate::kv::span::Span;
use crate::kv::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transaction identifier. The nil UUID marks an unset transaction.
pub type TxnId = Uuid;

/// Role of a transaction handle within a distributed flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnKind {
    /// Coordinator-side handle; owns commit/rollback
    Root,
    /// Participant-side handle on a remote node
    Leaf,
}

/// Final state a leaf transaction reports back to its root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafTxnFinalState {
    pub txn_id: TxnId,
    pub epoch: u32,
    pub read_timestamp: Timestamp,
    /// Spans read by the leaf that the root must refresh before committing
    pub refresh_spans: Vec<Span>,
    pub refresh_invalid: bool,
}

/// Transaction handle consulted by the scan.
///
/// The scan never drives the transaction protocol; it only passes the handle to
/// the fetcher and collects the leaf state at the end of the stream.
pub trait Transaction: Send + Sync {
    fn id(&self) -> TxnId;

    fn kind(&self) -> TxnKind;

    /// Snapshot the leaf-side state for the root. Only meaningful on leaf handles.
    fn leaf_final_state(&self) -> ColScanResult<LeafTxnFinalState>;
}
