//! In-memory batch fetcher.
//!
//! Serves typed rows from an ordered in-memory store. Rows are already decoded,
//! so there is no key encoding here; the fetcher exists to embed the scan
//! operator in tests and benchmarks with realistic batching behaviour.

use super::{BatchFetcher, ColumnBatch, FetcherFactory, FetcherInit, FetcherStats, StartScanRequest};
use crate::catalog::{ColumnId, SystemColumnKind};
use crate::error::{ColScanError, ColScanResult};
use crate::executor::context::{ExecContext, FlowContext};
use crate::executor::pool::{ObjectPool, Poolable};
use crate::executor::trace::TraceEvent;
use crate::kv::{Span, Timestamp, TxnId};
use ahash::AHashMap;
use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Decimal128Array, DictionaryArray, Float64Array,
    Int64Array, RecordBatch, RecordBatchOptions, StringArray, UInt32Array, new_null_array,
};
use arrow::datatypes::{DataType, Int32Type, SchemaRef};
use parking_lot::RwLock;
use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

/// A single decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Binary(Vec<u8>),
}

impl Datum {
    fn encoded_size(&self) -> u64 {
        match self {
            Datum::Null => 0,
            Datum::Bool(_) => 1,
            Datum::Int64(_) | Datum::Float64(_) => 8,
            Datum::Utf8(s) => s.len() as u64,
            Datum::Binary(b) => b.len() as u64,
        }
    }
}

/// A row version as stored under its primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub values: AHashMap<ColumnId, Datum>,
    pub mvcc_timestamp: Timestamp,
}

impl StoredRow {
    pub fn new(mvcc_timestamp: Timestamp) -> Self {
        Self {
            values: AHashMap::new(),
            mvcc_timestamp,
        }
    }

    pub fn with(mut self, id: u32, value: Datum) -> Self {
        self.values.insert(ColumnId(id), value);
        self
    }

    fn value_size(&self) -> u64 {
        self.values.values().map(Datum::encoded_size).sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct Contention {
    txn_id: TxnId,
    wait: Duration,
}

/// 인메모리 KV 저장소 — ordered map from key to row.
#[derive(Debug, Default)]
pub struct MemKvStore {
    rows: RwLock<BTreeMap<Vec<u8>, Arc<StoredRow>>>,
    contention: RwLock<AHashMap<Vec<u8>, Contention>>,
}

/// Rows read by one KV request.
#[derive(Debug, Default)]
struct KvChunk {
    rows: Vec<(Vec<u8>, Arc<StoredRow>)>,
    bytes: u64,
    /// Key to resume after when the span was not exhausted
    resume_key: Option<Vec<u8>>,
}

impl MemKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<Vec<u8>>, row: StoredRow) {
        self.rows.write().insert(key.into(), Arc::new(row));
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Mark `key` as locked by `txn_id`; readers record a contention event of `wait`.
    pub fn hold_lock(&self, key: impl Into<Vec<u8>>, txn_id: TxnId, wait: Duration) {
        self.contention
            .write()
            .insert(key.into(), Contention { txn_id, wait });
    }

    fn contention_on(&self, key: &[u8]) -> Option<Contention> {
        self.contention.read().get(key).copied()
    }

    /// Read rows of `span` after `resume`, stopping once either budget is hit.
    ///
    /// A zero budget is unlimited. At least one row is returned when available.
    fn read_span(
        &self,
        span: &Span,
        resume: Option<&[u8]>,
        reverse: bool,
        max_rows: u64,
        max_bytes: u64,
    ) -> KvChunk {
        let mut chunk = KvChunk::default();
        if !span.is_point() && span.end_key <= span.key {
            return chunk;
        }

        let (mut lower, mut upper) = if span.is_point() {
            (Bound::Included(span.key.clone()), Bound::Included(span.key.clone()))
        } else {
            (Bound::Included(span.key.clone()), Bound::Excluded(span.end_key.clone()))
        };
        if let Some(resume) = resume {
            if span.is_point() {
                return chunk;
            }
            if reverse {
                upper = Bound::Excluded(resume.to_vec());
            } else {
                lower = Bound::Excluded(resume.to_vec());
            }
        }

        let rows = self.rows.read();
        let range = rows.range::<Vec<u8>, _>((lower, upper));
        let mut iter: Box<dyn Iterator<Item = (&Vec<u8>, &Arc<StoredRow>)> + '_> = if reverse {
            Box::new(range.rev())
        } else {
            Box::new(range)
        };

        let mut last_key = None;
        for (key, row) in iter.by_ref() {
            chunk.bytes += key.len() as u64 + row.value_size();
            chunk.rows.push((key.clone(), Arc::clone(row)));
            last_key = Some(key.clone());

            let rows_full = max_rows > 0 && chunk.rows.len() as u64 >= max_rows;
            let bytes_full = max_bytes > 0 && chunk.bytes >= max_bytes;
            if rows_full || bytes_full {
                break;
            }
        }
        if iter.next().is_some() {
            chunk.resume_key = last_key;
        }
        chunk
    }
}

/// Reusable buffers of a [`MemBatchFetcher`].
#[derive(Debug, Default)]
struct FetcherBuffers {
    spans: Vec<Span>,
    pending: VecDeque<(Vec<u8>, Arc<StoredRow>)>,
}

impl Poolable for FetcherBuffers {
    fn reset(&mut self) {
        for span in self.spans.iter_mut() {
            span.clear_keys();
        }
        self.spans.clear();
        self.pending.clear();
    }
}

static FETCHER_BUFFER_POOL: LazyLock<ObjectPool<FetcherBuffers>> =
    LazyLock::new(|| ObjectPool::new(crate::config::DEFAULT_POOL_CAPACITY));

#[derive(Debug, Clone, Copy, Default)]
struct ScanPlan {
    limit_batches: bool,
    batch_bytes_limit: u64,
    limit_hint: u64,
    trace_kv: bool,
}

/// Fetcher over a [`MemKvStore`].
///
/// Output batches start small and double up to `max_batch_size`, unless the
/// estimated row count, the limit hint or the production-size knob say otherwise.
/// A batch is also cut short once its rows exceed the memory limit.
pub struct MemBatchFetcher {
    store: Arc<MemKvStore>,
    init: FetcherInit,
    stats: Arc<FetcherStats>,
    buffers: Option<Box<FetcherBuffers>>,
    plan: ScanPlan,
    span_idx: usize,
    resume_key: Option<Vec<u8>>,
    kv_requests: u64,
    batch_capacity: usize,
    started: bool,
    closed: bool,
}

impl MemBatchFetcher {
    pub fn new(store: Arc<MemKvStore>, init: FetcherInit) -> Self {
        Self {
            store,
            init,
            stats: Arc::new(FetcherStats::default()),
            buffers: Some(FETCHER_BUFFER_POOL.acquire()),
            plan: ScanPlan::default(),
            span_idx: 0,
            resume_key: None,
            kv_requests: 0,
            batch_capacity: 1,
            started: false,
            closed: false,
        }
    }

    fn max_batch_size(&self) -> usize {
        self.init.args.max_batch_size.max(1)
    }

    fn initial_capacity(&self, force_production: bool) -> usize {
        let max = self.max_batch_size();
        let estimated = self.init.args.estimated_row_count;
        if force_production {
            max
        } else if estimated > 0 {
            (estimated as usize).min(max)
        } else if self.plan.limit_hint > 0 {
            (self.plan.limit_hint as usize).min(max)
        } else {
            1
        }
    }

    fn buffers(&mut self) -> ColScanResult<&mut FetcherBuffers> {
        self.buffers
            .as_deref_mut()
            .ok_or_else(|| ColScanError::Internal("fetcher used after release".to_string()))
    }

    /// Issue one KV request. Returns `false` once every span is exhausted.
    fn fetch_kv_batch(&mut self, ctx: &ExecContext) -> ColScanResult<bool> {
        ctx.check_cancelled()?;
        let reverse = self.init.args.reverse;
        let (max_rows, max_bytes) = if self.plan.limit_batches {
            let rows = if self.kv_requests == 0 { self.plan.limit_hint } else { 0 };
            (rows, self.plan.batch_bytes_limit)
        } else {
            (0, 0)
        };

        let store = Arc::clone(&self.store);
        let trace_kv = self.plan.trace_kv;
        let span_idx = self.span_idx;
        let resume_key = self.resume_key.take();
        let buffers = self.buffers()?;
        let Some(span) = buffers.spans.get(span_idx) else {
            return Ok(false);
        };

        let chunk = store.read_span(span, resume_key.as_deref(), reverse, max_rows, max_bytes);
        for (key, _) in &chunk.rows {
            if let Some(c) = store.contention_on(key) {
                if let Some(rec) = ctx.span() {
                    rec.record_contention(key, c.txn_id, c.wait);
                }
            }
            if trace_kv {
                tracing::trace!(target: "colscan", key = %String::from_utf8_lossy(key), "fetched");
                ctx.record(TraceEvent::Message(format!(
                    "fetched: {}",
                    String::from_utf8_lossy(key)
                )));
            }
        }
        buffers.pending.extend(chunk.rows);

        self.stats.add_bytes_read(chunk.bytes);
        self.stats.add_kv_batch();
        self.kv_requests += 1;
        match chunk.resume_key {
            Some(key) => self.resume_key = Some(key),
            None => self.span_idx += 1,
        }
        Ok(true)
    }

    fn build_batch(&self, rows: &[(Vec<u8>, Arc<StoredRow>)]) -> ColScanResult<RecordBatch> {
        let schema: SchemaRef = Arc::clone(&self.init.output_schema);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

        for (id, ordinal) in self.init.column_ordinals.entries() {
            let data_type = schema.field(ordinal).data_type();
            let array = match SystemColumnKind::from_column_id(id) {
                Some(kind) if self.init.args.has_system_columns => {
                    system_column_array(kind, rows, self.init.table.id)?
                }
                _ if self.init.needed_columns.contains(&id) => {
                    datum_array(id, data_type, rows)?
                }
                _ => new_null_array(data_type, rows.len()),
            };
            columns.push(array);
        }

        let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
        Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
    }
}

fn system_column_array(
    kind: SystemColumnKind,
    rows: &[(Vec<u8>, Arc<StoredRow>)],
    table_id: u32,
) -> ColScanResult<ArrayRef> {
    Ok(match kind {
        SystemColumnKind::MvccTimestamp => {
            let values: Vec<i128> = rows
                .iter()
                .map(|(_, row)| row.mvcc_timestamp.as_scaled_decimal())
                .collect();
            Arc::new(Decimal128Array::from(values).with_precision_and_scale(38, 10)?)
        }
        SystemColumnKind::TableOid => Arc::new(UInt32Array::from(vec![table_id; rows.len()])),
    })
}

fn decode_error(id: ColumnId, data_type: &DataType, datum: &Datum) -> ColScanError {
    ColScanError::Fetch(format!(
        "column {id}: cannot decode {datum:?} as {data_type}"
    ))
}

fn datum_array(
    id: ColumnId,
    data_type: &DataType,
    rows: &[(Vec<u8>, Arc<StoredRow>)],
) -> ColScanResult<ArrayRef> {
    const NULL: &Datum = &Datum::Null;
    let values = rows
        .iter()
        .map(|(_, row)| row.values.get(&id).unwrap_or(NULL));

    macro_rules! collect_typed {
        ($variant:ident, $array:ty, |$v:ident| $conv:expr) => {{
            let out: Vec<Option<_>> = values
                .map(|d| match d {
                    Datum::Null => Ok(None),
                    Datum::$variant($v) => Ok(Some($conv)),
                    other => Err(decode_error(id, data_type, other)),
                })
                .collect::<ColScanResult<_>>()?;
            Arc::new(<$array>::from(out)) as ArrayRef
        }};
    }

    Ok(match data_type {
        DataType::Boolean => collect_typed!(Bool, BooleanArray, |v| *v),
        DataType::Int64 => collect_typed!(Int64, Int64Array, |v| *v),
        DataType::Float64 => collect_typed!(Float64, Float64Array, |v| *v),
        DataType::Utf8 => collect_typed!(Utf8, StringArray, |v| v.as_str()),
        DataType::Binary => collect_typed!(Binary, BinaryArray, |v| v.as_slice()),
        DataType::Dictionary(key, value)
            if **key == DataType::Int32 && **value == DataType::Utf8 =>
        {
            let out: Vec<Option<&str>> = values
                .map(|d| match d {
                    Datum::Null => Ok(None),
                    Datum::Utf8(v) => Ok(Some(v.as_str())),
                    other => Err(decode_error(id, data_type, other)),
                })
                .collect::<ColScanResult<_>>()?;
            Arc::new(out.into_iter().collect::<DictionaryArray<Int32Type>>()) as ArrayRef
        }
        other => {
            return Err(ColScanError::Fetch(format!(
                "column {id}: unsupported type {other}"
            )));
        }
    })
}

impl BatchFetcher for MemBatchFetcher {
    fn start_scan(&mut self, ctx: &ExecContext, req: StartScanRequest<'_>) -> ColScanResult<()> {
        if self.started {
            return Err(ColScanError::Internal("start_scan called twice".to_string()));
        }
        ctx.check_cancelled()?;

        self.plan = ScanPlan {
            limit_batches: req.limit_batches,
            batch_bytes_limit: req.batch_bytes_limit,
            limit_hint: req.limit_hint,
            trace_kv: req.trace_kv,
        };
        self.batch_capacity = self.initial_capacity(req.force_production_batch_sizes);

        let reverse = self.init.args.reverse;
        let buffers = self.buffers()?;
        buffers.spans.extend_from_slice(req.spans);
        if reverse {
            buffers.spans.reverse();
        }
        let span_count = buffers.spans.len();

        ctx.record(TraceEvent::Message(format!(
            "starting scan of {span_count} spans"
        )));
        self.started = true;
        Ok(())
    }

    fn next_batch(&mut self, ctx: &ExecContext) -> ColScanResult<ColumnBatch> {
        if !self.started || self.closed {
            return Err(ColScanError::Internal(
                "next_batch called on an idle fetcher".to_string(),
            ));
        }

        let capacity = self.batch_capacity;
        let memory_limit = self.init.args.memory_limit;
        let mut rows = Vec::with_capacity(capacity);
        let mut batch_bytes = 0u64;

        while rows.len() < capacity && (memory_limit == 0 || batch_bytes < memory_limit) {
            let next = self.buffers()?.pending.pop_front();
            match next {
                Some((key, row)) => {
                    batch_bytes += key.len() as u64 + row.value_size();
                    rows.push((key, row));
                }
                None => {
                    if !self.fetch_kv_batch(ctx)? {
                        break;
                    }
                }
            }
        }

        if rows.is_empty() {
            return Ok(ColumnBatch::empty(Arc::clone(&self.init.output_schema)));
        }
        self.batch_capacity = (capacity * 2).min(self.max_batch_size());
        Ok(ColumnBatch::new(self.build_batch(&rows)?))
    }

    fn stats(&self) -> Arc<FetcherStats> {
        Arc::clone(&self.stats)
    }

    fn close(&mut self, _ctx: &ExecContext) {
        if let Some(buffers) = self.buffers.as_deref_mut() {
            buffers.pending.clear();
        }
        self.closed = true;
    }

    fn release(&mut self) {
        if let Some(buffers) = self.buffers.take() {
            FETCHER_BUFFER_POOL.release(buffers);
        }
        self.resume_key = None;
    }
}

/// Factory producing [`MemBatchFetcher`]s over a shared store.
#[derive(Debug, Clone, Default)]
pub struct MemFetcherFactory {
    store: Arc<MemKvStore>,
}

impl MemFetcherFactory {
    pub fn new(store: Arc<MemKvStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemKvStore> {
        &self.store
    }
}

impl FetcherFactory for MemFetcherFactory {
    fn init_fetcher(
        &self,
        _flow: &FlowContext,
        init: FetcherInit,
    ) -> ColScanResult<Box<dyn BatchFetcher>> {
        Ok(Box::new(MemBatchFetcher::new(Arc::clone(&self.store), init)))
    }
}
