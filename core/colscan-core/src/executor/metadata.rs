//! Producer metadata — side-channel records emitted at the end of a stream.

use crate::executor::trace::RecordedSpan;
use crate::kv::{LeafTxnFinalState, NodeId, RangeCache, RangeInfo, Span, Transaction, TxnKind};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cumulative read counters of one operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsMeta {
    pub bytes_read: u64,
    pub rows_read: u64,
}

/// 메타데이터 레코드 — one non-data message for the flow coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProducerMetadata {
    /// Ranges whose leaseholder differs from the node the scan was planned on
    Ranges(Vec<RangeInfo>),
    LeafTxnFinalState(LeafTxnFinalState),
    Metrics(MetricsMeta),
    TraceData(Vec<RecordedSpan>),
}

impl ProducerMetadata {
    pub fn to_json(&self) -> crate::error::ColScanResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Cached ranges touched by `spans` whose lease is held by a node other than `node_id`.
///
/// Each range is reported once. Returns `None` when nothing was misplanned.
pub fn misplanned_ranges(
    spans: &[Span],
    node_id: NodeId,
    cache: &dyn RangeCache,
) -> Option<Vec<RangeInfo>> {
    tracing::debug!(
        target: "colscan",
        spans = spans.len(),
        "checking range cache for misplanned ranges"
    );

    let mut seen: AHashSet<u64> = AHashSet::new();
    let mut misplanned = Vec::new();
    for span in spans {
        for info in cache.cached_overlapping(span) {
            if seen.contains(&info.desc.range_id) {
                continue;
            }
            if let Some(lease) = info.lease.filter(|l| l.node_id != node_id) {
                tracing::debug!(
                    target: "colscan",
                    range_id = info.desc.range_id,
                    leaseholder = %lease.node_id,
                    "misplanned range"
                );
                seen.insert(info.desc.range_id);
                misplanned.push(info);
            }
        }
    }

    (!misplanned.is_empty()).then_some(misplanned)
}

/// Final state of a leaf transaction, if the handle is one.
///
/// A failed snapshot or a nil transaction ID suppresses the record.
pub fn leaf_txn_final_state(txn: Option<&Arc<dyn Transaction>>) -> Option<LeafTxnFinalState> {
    let txn = txn?;
    if txn.kind() != TxnKind::Leaf {
        return None;
    }
    match txn.leaf_final_state() {
        Ok(state) if !state.txn_id.is_nil() => Some(state),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(target: "colscan", error = %err, "failed to collect leaf txn state");
            None
        }
    }
}
