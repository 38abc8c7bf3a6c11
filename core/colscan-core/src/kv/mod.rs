//! Key-value layer types consumed by the scan operator.
//!
//! The transaction protocol and the range-addressing layer live elsewhere; this
//! module only carries the shapes the scan needs from them.

pub mod range_cache;
pub mod span;
pub mod timestamp;
pub mod txn;

pub use range_cache::{InMemoryRangeCache, Lease, NodeId, RangeCache, RangeDescriptor, RangeInfo};
pub use span::Span;
pub use timestamp::{BoundedStalenessHeader, Timestamp};
pub use txn::{LeafTxnFinalState, Transaction, TxnId, TxnKind};
