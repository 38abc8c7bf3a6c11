// Shared fixtures for the scan integration tests
#![allow(dead_code)]

use arrow::datatypes::DataType;
use colscan_core::catalog::{Column, ColumnId, ColumnState, IndexDescriptor, TableDescriptor};
use colscan_core::executor::fetcher::{Datum, MemFetcherFactory, MemKvStore, StoredRow};
use colscan_core::executor::{
    ColBatchScan, EvalContext, FlowContext, NodeIdentity, PostProcessSpec, TableReaderSpec,
};
use colscan_core::kv::{
    InMemoryRangeCache, LeafTxnFinalState, Lease, NodeId, RangeDescriptor, RangeInfo, Span,
    Timestamp, Transaction, TxnId, TxnKind,
};
use colscan_core::ColScanResult;
use std::sync::Arc;

pub const TABLE_ID: u32 = 104;

pub fn row_key(i: i64) -> Vec<u8> {
    format!("/104/1/{i:06}").into_bytes()
}

/// `accounts(id INT8 NOT NULL, owner STRING, balance INT8, legacy STRING delete-only)`
pub fn accounts_table() -> Arc<TableDescriptor> {
    Arc::new(
        TableDescriptor::new(TABLE_ID, "accounts")
            .with_column(Column::new(1, "id", DataType::Int64).not_null())
            .with_column(Column::new(2, "owner", DataType::Utf8))
            .with_column(Column::new(3, "balance", DataType::Int64))
            .with_column(
                Column::new(4, "legacy", DataType::Utf8).with_state(ColumnState::DeleteOnly),
            )
            .with_index(IndexDescriptor::primary(1, "accounts_pkey", vec![ColumnId(1)]))
            .with_modification_time(Timestamp::new(1_000, 0)),
    )
}

pub fn accounts_store(rows: i64) -> Arc<MemKvStore> {
    let store = Arc::new(MemKvStore::new());
    for i in 0..rows {
        store.put(
            row_key(i),
            StoredRow::new(Timestamp::new(2_000 + i, 1))
                .with(1, Datum::Int64(i))
                .with(2, Datum::Utf8(format!("owner-{i}")))
                .with(3, Datum::Int64(i * 10)),
        );
    }
    store
}

pub fn full_span() -> Span {
    Span::new(b"/104/1/".to_vec(), b"/104/2".to_vec())
}

pub fn scan_spec(needed: &[u32]) -> TableReaderSpec {
    let mut spec = TableReaderSpec::new(accounts_table(), vec![full_span()]);
    spec.needed_columns = needed.iter().copied().map(ColumnId).collect();
    spec
}

pub fn gateway_flow() -> FlowContext {
    FlowContext::new(NodeIdentity::Assigned(NodeId(1)))
}

pub fn build_scan(
    flow: &FlowContext,
    spec: &TableReaderSpec,
    store: &Arc<MemKvStore>,
) -> ColScanResult<ColBatchScan> {
    let factory = MemFetcherFactory::new(Arc::clone(store));
    ColBatchScan::new(
        flow,
        &EvalContext::default(),
        spec,
        &PostProcessSpec::default(),
        0,
        &factory,
    )
}

/// Range cache whose single range covering the table is leased to `leaseholder`.
pub fn cache_with_leaseholder(leaseholder: u32) -> Arc<InMemoryRangeCache> {
    let cache = Arc::new(InMemoryRangeCache::new());
    cache.insert(RangeInfo {
        desc: RangeDescriptor {
            range_id: 77,
            start_key: b"/104".to_vec(),
            end_key: b"/105".to_vec(),
        },
        lease: Some(Lease {
            node_id: NodeId(leaseholder),
            sequence: 3,
        }),
    });
    cache
}

/// Transaction handle with a fixed role and ID.
pub struct TestTxn {
    pub id: TxnId,
    pub kind: TxnKind,
}

impl Transaction for TestTxn {
    fn id(&self) -> TxnId {
        self.id
    }

    fn kind(&self) -> TxnKind {
        self.kind
    }

    fn leaf_final_state(&self) -> ColScanResult<LeafTxnFinalState> {
        Ok(LeafTxnFinalState {
            txn_id: self.id,
            epoch: 1,
            read_timestamp: Timestamp::new(3_000, 0),
            refresh_spans: vec![full_span()],
            refresh_invalid: false,
        })
    }
}
