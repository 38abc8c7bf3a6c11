//! Batch fetcher contract.
//!
//! A fetcher performs the range scan against the key-value store and decodes
//! the results into columnar batches. The scan operator drives it with a strict
//! single-producer discipline: `start_scan` exactly once, then sequential
//! `next_batch` calls from one thread, then `close` and `release`.

pub mod memory;

use crate::catalog::{Column, ColumnId, ColumnOrdinalMap, IndexDescriptor, TableDescriptor};
use crate::error::ColScanResult;
use crate::executor::context::{ExecContext, FlowContext};
use crate::executor::spec::{LockingStrength, LockingWaitPolicy, ScanVisibility};
use crate::kv::{BoundedStalenessHeader, Span, Transaction};
use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use memory::{Datum, MemBatchFetcher, MemFetcherFactory, MemKvStore, StoredRow};

/// A decoded batch, optionally carrying a selection vector.
///
/// Fetchers feeding a scan operator must always produce dense batches.
#[derive(Debug, Clone)]
pub struct ColumnBatch {
    batch: RecordBatch,
    selection: Option<Vec<usize>>,
}

impl ColumnBatch {
    pub fn new(batch: RecordBatch) -> Self {
        Self {
            batch,
            selection: None,
        }
    }

    pub fn with_selection(batch: RecordBatch, selection: Vec<usize>) -> Self {
        Self {
            batch,
            selection: Some(selection),
        }
    }

    /// Zero-length batch signalling the end of the stream.
    pub fn empty(schema: SchemaRef) -> Self {
        Self::new(RecordBatch::new_empty(schema))
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn selection(&self) -> Option<&[usize]> {
        self.selection.as_deref()
    }

    pub fn into_record_batch(self) -> RecordBatch {
        self.batch
    }
}

/// Counters a fetcher publishes while it runs.
///
/// Shared with the reporting path, so all fields are atomics.
#[derive(Debug, Default)]
pub struct FetcherStats {
    bytes_read: AtomicU64,
    kv_batches: AtomicU64,
}

impl FetcherStats {
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Acquire)
    }

    pub fn add_bytes_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Number of KV requests issued so far.
    pub fn kv_batches(&self) -> u64 {
        self.kv_batches.load(Ordering::Acquire)
    }

    pub fn add_kv_batch(&self) {
        self.kv_batches.fetch_add(1, Ordering::AcqRel);
    }
}

/// Row, locking and sizing configuration handed through to the fetcher.
#[derive(Debug, Clone, Default)]
pub struct FetcherArgs {
    pub visibility: ScanVisibility,
    pub locking_strength: LockingStrength,
    pub locking_wait_policy: LockingWaitPolicy,
    pub has_system_columns: bool,
    pub reverse: bool,
    pub memory_limit: u64,
    pub estimated_row_count: u64,
    pub max_batch_size: usize,
}

/// Everything a fetcher needs to decode rows of one index.
#[derive(Debug, Clone)]
pub struct FetcherInit {
    pub table: Arc<TableDescriptor>,
    pub index: IndexDescriptor,
    pub needed_columns: BTreeSet<ColumnId>,
    pub column_ordinals: ColumnOrdinalMap,
    /// Output schema, ordered by `column_ordinals`
    pub output_schema: SchemaRef,
    pub virtual_column: Option<Column>,
    pub args: FetcherArgs,
}

/// Arguments of [`BatchFetcher::start_scan`].
#[derive(Clone, Copy)]
pub struct StartScanRequest<'a> {
    pub txn: Option<&'a Arc<dyn Transaction>>,
    pub spans: &'a [Span],
    pub bs_header: Option<&'a BoundedStalenessHeader>,
    /// Bound each KV request by `batch_bytes_limit`/`limit_hint` instead of
    /// fetching all spans at once
    pub limit_batches: bool,
    pub batch_bytes_limit: u64,
    pub limit_hint: u64,
    pub trace_kv: bool,
    pub force_production_batch_sizes: bool,
}

/// 배치 페처 — performs the KV scan and decodes into batches.
pub trait BatchFetcher: Send {
    fn start_scan(&mut self, ctx: &ExecContext, req: StartScanRequest<'_>) -> ColScanResult<()>;

    /// Next decoded batch; a zero-length batch means the scan is exhausted.
    fn next_batch(&mut self, ctx: &ExecContext) -> ColScanResult<ColumnBatch>;

    /// Live counters, valid before `start_scan` (all zero).
    fn stats(&self) -> Arc<FetcherStats>;

    fn bytes_read(&self) -> u64 {
        self.stats().bytes_read()
    }

    /// Finalize underlying resources. Must tolerate never having been started.
    fn close(&mut self, ctx: &ExecContext);

    /// Return internal buffers to the fetcher's own pool.
    fn release(&mut self);
}

/// Builds fetchers for scan operators.
pub trait FetcherFactory: Send + Sync {
    fn init_fetcher(
        &self,
        flow: &FlowContext,
        init: FetcherInit,
    ) -> ColScanResult<Box<dyn BatchFetcher>>;
}
