//! Range descriptor cache — where each key range lives and who holds its lease.

use crate::kv::span::Span;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a node in the cluster. Zero means "not yet assigned".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn is_uninitialized(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Key bounds of one range. An empty `end_key` means the range extends to the end of the keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeDescriptor {
    pub range_id: u64,
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
}

/// Leaseholder of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub node_id: NodeId,
    pub sequence: u64,
}

/// A cached range descriptor plus its (possibly unknown) lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeInfo {
    pub desc: RangeDescriptor,
    pub lease: Option<Lease>,
}

/// Read access to the range descriptor cache.
///
/// Only cached entries are consulted; a lookup never goes to the network.
pub trait RangeCache: Send + Sync {
    /// All cached ranges overlapping `span`, in key order.
    fn cached_overlapping(&self, span: &Span) -> Vec<RangeInfo>;
}

/// Range cache backed by an ordered map keyed by range start key.
#[derive(Debug, Default)]
pub struct InMemoryRangeCache {
    ranges: RwLock<BTreeMap<Vec<u8>, RangeInfo>>,
}

impl InMemoryRangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry starting at `info.desc.start_key`.
    pub fn insert(&self, info: RangeInfo) {
        self.ranges.write().insert(info.desc.start_key.clone(), info);
    }

    pub fn evict(&self, start_key: &[u8]) -> Option<RangeInfo> {
        self.ranges.write().remove(start_key)
    }

    pub fn len(&self) -> usize {
        self.ranges.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.read().is_empty()
    }
}

impl RangeCache for InMemoryRangeCache {
    fn cached_overlapping(&self, span: &Span) -> Vec<RangeInfo> {
        let ranges = self.ranges.read();
        // Cached ranges don't overlap each other, so only the last range starting
        // at or before span.key can straddle its start.
        let first = ranges
            .range(..=span.key.clone())
            .next_back()
            .map(|(start, _)| start.clone())
            .unwrap_or_default();

        ranges
            .range(first..)
            .map(|(_, info)| info)
            .take_while(|info| {
                if span.is_point() {
                    info.desc.start_key <= span.key
                } else {
                    info.desc.start_key < span.end_key
                }
            })
            .filter(|info| span.overlaps(&info.desc.start_key, &info.desc.end_key))
            .cloned()
            .collect()
    }
}
