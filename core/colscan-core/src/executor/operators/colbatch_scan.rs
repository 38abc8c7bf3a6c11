//! ColBatchScan Operator — KV span scan emitting columnar batches
//!
//! The operator owns a [`BatchFetcher`] and drives it from a single producer
//! thread. Per-query state lives in a pooled [`ScanState`] that is scrubbed on
//! release; read counters are published through a shared [`ScanProgress`] so a
//! reporting thread can read them while batches are being pulled.

use super::operator::{Closer, KvReader, MetadataSource, Operator, Releasable};
use crate::catalog::ColumnId;
use crate::config::ScanSettings;
use crate::error::{ColScanError, ColScanResult};
use crate::executor::context::{EvalContext, ExecContext, FlowContext, processor_span};
use crate::executor::fetcher::{
    BatchFetcher, FetcherArgs, FetcherFactory, FetcherInit, FetcherStats, StartScanRequest,
};
use crate::executor::metadata::{
    MetricsMeta, ProducerMetadata, leaf_txn_final_state, misplanned_ranges,
};
use crate::executor::pool::{ObjectPool, PoolStatsSnapshot, Poolable};
use crate::executor::projection::{ColumnProjection, resolve_projection};
use crate::executor::spec::{PostProcessSpec, TableReaderSpec, limit_hint};
use crate::executor::trace::OperatorSpan;
use crate::kv::{BoundedStalenessHeader, Span};
use arrow::array::RecordBatch;
use arrow::datatypes::{DataType, Schema, SchemaRef};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

const OPERATOR_NAME: &str = "colbatchscan";

/// Read progress of one scan, shared with the reporting path.
#[derive(Debug, Default)]
pub struct ScanProgress {
    rows_read: Mutex<u64>,
    fetcher_stats: Arc<FetcherStats>,
}

impl ScanProgress {
    fn new(fetcher_stats: Arc<FetcherStats>) -> Self {
        Self {
            rows_read: Mutex::new(0),
            fetcher_stats,
        }
    }

    pub fn rows_read(&self) -> u64 {
        *self.rows_read.lock()
    }

    /// Live from the fetcher; zero before the scan starts.
    pub fn bytes_read(&self) -> u64 {
        self.fetcher_stats.bytes_read()
    }

    fn add_rows(&self, rows: u64) {
        *self.rows_read.lock() += rows;
    }
}

/// 풀링되는 스캔 상태
#[derive(Default)]
struct ScanState {
    flow: Option<FlowContext>,
    spans: Vec<Span>,
    bs_header: Option<BoundedStalenessHeader>,
    fetcher: Option<Box<dyn BatchFetcher>>,
    projection: ColumnProjection,
    limit_hint: u64,
    batch_bytes_limit: u64,
    parallelize: bool,
    progress: Arc<ScanProgress>,
    /// Context captured by `init`, scoped to the operator span when recording
    ctx: Option<ExecContext>,
    op_span: Option<OperatorSpan>,
    started: bool,
    exhausted: bool,
}

impl Poolable for ScanState {
    fn reset(&mut self) {
        // 키 바이트를 남기지 않도록 먼저 0으로 덮어씀
        for span in self.spans.iter_mut() {
            span.clear_keys();
        }
        self.spans.clear();
        self.flow = None;
        self.bs_header = None;
        self.fetcher = None;
        self.projection.clear();
        self.limit_hint = 0;
        self.batch_bytes_limit = 0;
        self.parallelize = false;
        self.progress = Arc::default();
        self.ctx = None;
        self.op_span = None;
        self.started = false;
        self.exhausted = false;
    }
}

static SCAN_POOL: LazyLock<ObjectPool<ScanState>> =
    LazyLock::new(|| ObjectPool::new(ScanSettings::from_env().pool_capacity));

/// Counters of the process-wide scan instance pool.
pub fn scan_pool_stats() -> PoolStatsSnapshot {
    SCAN_POOL.stats()
}

/// 컬럼 배치 스캔 연산자 — leaf operator reading table spans
pub struct ColBatchScan {
    state: Option<Box<ScanState>>,
    schema: SchemaRef,
    result_types: Vec<DataType>,
    progress: Arc<ScanProgress>,
    closed: bool,
}

impl ColBatchScan {
    /// Build a scan for `spec`.
    ///
    /// Nothing is taken from the instance pool until every fallible step has
    /// succeeded.
    pub fn new(
        flow: &FlowContext,
        eval: &EvalContext,
        spec: &TableReaderSpec,
        post: &PostProcessSpec,
        estimated_row_count: u64,
        factory: &dyn FetcherFactory,
    ) -> ColScanResult<Self> {
        // 멀티테넌트 환경에서는 노드 ID 자체가 없을 수 있음 (Unavailable)
        if flow.node_id.is_uninitialized() {
            return Err(ColScanError::Config(
                "attempting to create a ColBatchScan with uninitialized node ID".to_string(),
            ));
        }
        if spec.is_check {
            return Err(ColScanError::AssertionFailed(
                "attempting to create a fetcher with the check flag set".to_string(),
            ));
        }

        let row_limit_hint = limit_hint(spec.limit_hint, post);
        let table = &spec.table;
        let index = table
            .active_indexes()
            .get(spec.index_idx)
            .map(|idx| (*idx).clone())
            .ok_or_else(|| {
                ColScanError::Config(format!(
                    "index ordinal {} out of range for table '{}'",
                    spec.index_idx, table.name
                ))
            })?;

        let projection = resolve_projection(
            table,
            spec.virtual_column.as_ref(),
            spec.visibility,
            spec.has_system_columns,
            flow.type_resolver.as_ref(),
        )?;

        let needed: BTreeSet<ColumnId> = spec.needed_columns.iter().copied().collect();
        if let Some(missing) = needed.iter().find(|id| projection.ordinals.get(**id).is_none()) {
            return Err(ColScanError::Config(format!(
                "needed column {missing} is not scanned from table '{}'",
                table.name
            )));
        }
        let schema = projection.output_schema(&needed);

        let fetcher = factory.init_fetcher(
            flow,
            FetcherInit {
                table: Arc::clone(table),
                index,
                needed_columns: needed,
                column_ordinals: projection.ordinals.clone(),
                output_schema: Arc::clone(&schema),
                virtual_column: spec.virtual_column.clone(),
                args: FetcherArgs {
                    visibility: spec.visibility,
                    locking_strength: spec.locking_strength,
                    locking_wait_policy: spec.locking_wait_policy,
                    has_system_columns: spec.has_system_columns,
                    reverse: spec.reverse,
                    memory_limit: flow.work_mem_limit(),
                    estimated_row_count,
                    max_batch_size: flow.settings.max_batch_size,
                },
            },
        )?;

        let bs_header = eval
            .as_of_system_time
            .filter(|aost| aost.bounded_staleness)
            .map(|aost| {
                BoundedStalenessHeader::for_schema(
                    aost.timestamp,
                    aost.nearest_only,
                    aost.max_timestamp_bound,
                    table.modification_time,
                )
            });

        // 행/바이트 예산은 순차 스캔에서만 지킬 수 있음
        let mut parallelize = spec.parallelize;
        if row_limit_hint > 0 || spec.batch_bytes_limit > 0 {
            parallelize = false;
        }
        let mut batch_bytes_limit = spec.batch_bytes_limit;
        if batch_bytes_limit == 0 && !parallelize {
            batch_bytes_limit = flow.settings.default_batch_bytes_limit;
        }

        let progress = Arc::new(ScanProgress::new(fetcher.stats()));
        let result_types = projection.types();

        let mut state = SCAN_POOL.acquire();
        state.spans.extend_from_slice(&spec.spans);
        state.flow = Some(flow.clone());
        state.bs_header = bs_header;
        state.fetcher = Some(fetcher);
        state.projection = projection;
        state.limit_hint = row_limit_hint;
        state.batch_bytes_limit = batch_bytes_limit;
        state.parallelize = parallelize;
        state.progress = Arc::clone(&progress);

        tracing::debug!(
            target: "colscan",
            table = %table.name,
            spans = state.spans.len(),
            limit_hint = row_limit_hint,
            batch_bytes_limit,
            parallelize,
            "created colbatchscan"
        );

        Ok(Self {
            state: Some(state),
            schema,
            result_types,
            progress,
            closed: false,
        })
    }

    /// Output column types, stable for the operator's lifetime.
    pub fn result_types(&self) -> &[DataType] {
        &self.result_types
    }

    /// Handle for reading progress from another thread.
    pub fn progress(&self) -> Arc<ScanProgress> {
        Arc::clone(&self.progress)
    }

    /// Resolved projection, empty once released.
    pub fn projection(&self) -> Option<&ColumnProjection> {
        self.state.as_deref().map(|s| &s.projection)
    }

    pub fn bounded_staleness_header(&self) -> Option<&BoundedStalenessHeader> {
        self.state.as_deref().and_then(|s| s.bs_header.as_ref())
    }

    pub fn limit_hint(&self) -> u64 {
        self.state.as_deref().map_or(0, |s| s.limit_hint)
    }

    pub fn batch_bytes_limit(&self) -> u64 {
        self.state.as_deref().map_or(0, |s| s.batch_bytes_limit)
    }

    pub fn parallelize(&self) -> bool {
        self.state.as_deref().is_some_and(|s| s.parallelize)
    }

    pub fn is_released(&self) -> bool {
        self.state.is_none()
    }

    fn state_mut(&mut self) -> ColScanResult<&mut ScanState> {
        self.state
            .as_deref_mut()
            .ok_or_else(|| ColScanError::Internal("colbatchscan used after release".to_string()))
    }
}

impl Operator for ColBatchScan {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn init(&mut self, ctx: &ExecContext) -> ColScanResult<()> {
        let state = self.state_mut()?;
        if state.started {
            return Ok(());
        }
        // 시작 실패도 치명적이므로 재시도하지 않는다
        state.started = true;

        // 이 스캔의 contention 이벤트만 기록되도록 자식 스팬을 연다
        let (scan_ctx, op_span) = processor_span(ctx, OPERATOR_NAME);
        let _entered = op_span.as_ref().map(|s| s.tracing_span().clone().entered());

        let flow = state
            .flow
            .as_ref()
            .ok_or_else(|| ColScanError::Internal("colbatchscan has no flow context".to_string()))?;
        let fetcher = state
            .fetcher
            .as_deref_mut()
            .ok_or_else(|| ColScanError::Internal("colbatchscan has no fetcher".to_string()))?;

        let req = StartScanRequest {
            txn: flow.txn.as_ref(),
            spans: &state.spans,
            bs_header: state.bs_header.as_ref(),
            limit_batches: !state.parallelize,
            batch_bytes_limit: state.batch_bytes_limit,
            limit_hint: state.limit_hint,
            trace_kv: flow.trace_kv,
            force_production_batch_sizes: flow.settings.force_production_batch_sizes,
        };
        if let Err(err) = fetcher.start_scan(&scan_ctx, req) {
            if let Some(span) = op_span {
                span.finish();
            }
            return Err(match err {
                ColScanError::Cancelled => ColScanError::Cancelled,
                other => ColScanError::Internal(format!("starting scan: {other}")),
            });
        }

        tracing::debug!(target: "colscan", spans = state.spans.len(), "scan started");
        state.ctx = Some(scan_ctx);
        state.op_span = op_span;
        Ok(())
    }

    fn next(&mut self) -> ColScanResult<Option<RecordBatch>> {
        let state = self.state_mut()?;
        if !state.started {
            return Err(ColScanError::Internal(
                "colbatchscan pulled before init".to_string(),
            ));
        }
        if state.exhausted {
            return Ok(None);
        }

        let (Some(ctx), Some(fetcher)) = (state.ctx.as_ref(), state.fetcher.as_deref_mut()) else {
            return Err(ColScanError::Internal(
                "colbatchscan pulled after a failed start".to_string(),
            ));
        };
        let batch = fetcher.next_batch(ctx)?;
        if batch.selection().is_some() {
            return Err(ColScanError::Internal(
                "unexpectedly a selection vector is set on the batch coming from the fetcher"
                    .to_string(),
            ));
        }

        let rows = batch.num_rows();
        if rows == 0 {
            state.exhausted = true;
            tracing::debug!(
                target: "colscan",
                rows_read = state.progress.rows_read(),
                "scan exhausted"
            );
            return Ok(None);
        }
        state.progress.add_rows(rows as u64);
        Ok(Some(batch.into_record_batch()))
    }
}

impl KvReader for ColBatchScan {
    fn bytes_read(&self) -> u64 {
        self.progress.bytes_read()
    }

    fn rows_read(&self) -> u64 {
        self.progress.rows_read()
    }

    fn cumulative_contention_time(&self) -> Duration {
        self.state
            .as_deref()
            .and_then(|s| s.op_span.as_ref())
            .map_or(Duration::ZERO, |span| {
                span.recorder().cumulative_contention_time()
            })
    }
}

impl MetadataSource for ColBatchScan {
    fn drain_meta(&mut self) -> Vec<ProducerMetadata> {
        let mut meta = Vec::new();
        let state = self.state.as_deref();

        if let Some((flow, spans)) = state.and_then(|s| s.flow.as_ref().map(|f| (f, &s.spans))) {
            if !flow.local {
                if let Some(node_id) = flow.node_id.optional_node_id() {
                    if let Some(ranges) =
                        misplanned_ranges(spans, node_id, flow.range_cache.as_ref())
                    {
                        meta.push(ProducerMetadata::Ranges(ranges));
                    }
                }
            }
            if let Some(tfs) = leaf_txn_final_state(flow.txn.as_ref()) {
                meta.push(ProducerMetadata::LeafTxnFinalState(tfs));
            }
        }

        meta.push(ProducerMetadata::Metrics(MetricsMeta {
            bytes_read: self.bytes_read(),
            rows_read: self.rows_read(),
        }));

        if let Some(span) = state.and_then(|s| s.op_span.as_ref()) {
            let recording = span.recorder().recording();
            if !recording.is_empty() {
                meta.push(ProducerMetadata::TraceData(recording));
            }
        }
        meta
    }
}

impl Closer for ColBatchScan {
    fn close(&mut self, ctx: &ExecContext) -> ColScanResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(state) = self.state.as_deref_mut() {
            let close_ctx = state.ctx.as_ref().unwrap_or(ctx);
            if let Some(fetcher) = state.fetcher.as_deref_mut() {
                fetcher.close(close_ctx);
            }
            if let Some(span) = state.op_span.take() {
                span.finish();
            }
        }
        tracing::debug!(target: "colscan", rows_read = self.rows_read(), "colbatchscan closed");
        Ok(())
    }
}

impl Releasable for ColBatchScan {
    fn release(&mut self) {
        if !self.closed {
            // 닫히지 않은 상태로 반납되면 먼저 정리
            let ctx = self
                .state
                .as_deref()
                .and_then(|s| s.ctx.clone())
                .unwrap_or_default();
            let _ = self.close(&ctx);
        }
        let Some(mut state) = self.state.take() else {
            return;
        };
        if let Some(fetcher) = state.fetcher.as_deref_mut() {
            fetcher.release();
        }
        SCAN_POOL.release(state);
        tracing::debug!(target: "colscan", "colbatchscan released");
    }
}

impl Drop for ColBatchScan {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        Column, ColumnState, IndexDescriptor, SystemColumnKind, TableDescriptor,
    };
    use crate::executor::context::{AsOfSystemTime, NodeIdentity};
    use crate::executor::fetcher::{ColumnBatch, Datum, MemFetcherFactory, MemKvStore, StoredRow};
    use crate::executor::operators::ScanOperator;
    use crate::executor::spec::ScanVisibility;
    use crate::executor::trace::SpanRecorder;
    use crate::kv::{NodeId, Timestamp};
    use arrow::array::Int64Array;
    use arrow::datatypes::Field;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Calls observed by [`StubFetcher`].
    #[derive(Debug, Default)]
    struct Observed {
        starts: AtomicUsize,
        pulls: AtomicUsize,
        closes: AtomicUsize,
        releases: AtomicUsize,
        start_args: Mutex<Option<(bool, u64, u64, Option<BoundedStalenessHeader>)>>,
        init: Mutex<Option<FetcherInit>>,
    }

    struct StubFetcher {
        batches: Vec<ColumnBatch>,
        schema: SchemaRef,
        fail_start: bool,
        observed: Arc<Observed>,
        stats: Arc<FetcherStats>,
    }

    impl BatchFetcher for StubFetcher {
        fn start_scan(&mut self, _ctx: &ExecContext, req: StartScanRequest<'_>) -> ColScanResult<()> {
            self.observed.starts.fetch_add(1, Ordering::SeqCst);
            *self.observed.start_args.lock() = Some((
                req.limit_batches,
                req.batch_bytes_limit,
                req.limit_hint,
                req.bs_header.copied(),
            ));
            if self.fail_start {
                return Err(ColScanError::Fetch("range unavailable".to_string()));
            }
            Ok(())
        }

        fn next_batch(&mut self, _ctx: &ExecContext) -> ColScanResult<ColumnBatch> {
            self.observed.pulls.fetch_add(1, Ordering::SeqCst);
            if self.batches.is_empty() {
                return Ok(ColumnBatch::empty(Arc::clone(&self.schema)));
            }
            let batch = self.batches.remove(0);
            self.stats.add_bytes_read(8 * batch.num_rows() as u64);
            Ok(batch)
        }

        fn stats(&self) -> Arc<FetcherStats> {
            Arc::clone(&self.stats)
        }

        fn close(&mut self, _ctx: &ExecContext) {
            self.observed.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn release(&mut self) {
            self.observed.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct StubFactory {
        batch_sizes: Vec<usize>,
        sparse: bool,
        fail_start: bool,
        observed: Arc<Observed>,
    }

    impl FetcherFactory for StubFactory {
        fn init_fetcher(
            &self,
            _flow: &FlowContext,
            init: FetcherInit,
        ) -> ColScanResult<Box<dyn BatchFetcher>> {
            let schema = Arc::clone(&init.output_schema);
            let batches = self
                .batch_sizes
                .iter()
                .map(|&n| {
                    let columns = schema
                        .fields()
                        .iter()
                        .map(|f| match f.data_type() {
                            DataType::Int64 => {
                                Arc::new(Int64Array::from(vec![0i64; n])) as arrow::array::ArrayRef
                            }
                            other => arrow::array::new_null_array(other, n),
                        })
                        .collect();
                    let batch = RecordBatch::try_new(Arc::clone(&schema), columns).unwrap();
                    if self.sparse {
                        ColumnBatch::with_selection(batch, vec![0])
                    } else {
                        ColumnBatch::new(batch)
                    }
                })
                .collect();
            *self.observed.init.lock() = Some(init);
            Ok(Box::new(StubFetcher {
                batches,
                schema,
                fail_start: self.fail_start,
                observed: Arc::clone(&self.observed),
                stats: Arc::new(FetcherStats::default()),
            }))
        }
    }

    fn table() -> Arc<TableDescriptor> {
        Arc::new(
            TableDescriptor::new(52, "orders")
                .with_column(Column::new(1, "id", DataType::Int64).not_null())
                .with_column(Column::new(2, "amount", DataType::Int64))
                .with_column(Column::new(3, "note", DataType::Utf8).with_state(ColumnState::WriteOnly))
                .with_index(IndexDescriptor::primary(1, "orders_pkey", vec![ColumnId(1)]))
                .with_modification_time(Timestamp::new(500, 0)),
        )
    }

    fn flow() -> FlowContext {
        FlowContext::new(NodeIdentity::Assigned(NodeId(1)))
    }

    fn spec() -> TableReaderSpec {
        let mut spec = TableReaderSpec::new(table(), vec![Span::new(b"/52/1".to_vec(), b"/52/2".to_vec())]);
        spec.needed_columns = vec![ColumnId(1), ColumnId(2)];
        spec
    }

    fn build(spec: &TableReaderSpec, factory: &dyn FetcherFactory) -> ColScanResult<ColBatchScan> {
        ColBatchScan::new(
            &flow(),
            &EvalContext::default(),
            spec,
            &PostProcessSpec::default(),
            0,
            factory,
        )
    }

    #[test]
    fn test_uninitialized_node_id_rejected() {
        let flow = FlowContext::new(NodeIdentity::Assigned(NodeId(0)));
        let err = ColBatchScan::new(
            &flow,
            &EvalContext::default(),
            &spec(),
            &PostProcessSpec::default(),
            0,
            &StubFactory::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ColScanError::Config(_)));
        assert!(!err.is_fatal());

        // 노드 ID가 아예 없는 경우는 허용
        let flow = FlowContext::new(NodeIdentity::Unavailable);
        assert!(
            ColBatchScan::new(
                &flow,
                &EvalContext::default(),
                &spec(),
                &PostProcessSpec::default(),
                0,
                &StubFactory::default(),
            )
            .is_ok()
        );
    }

    #[test]
    fn test_check_mode_rejected() {
        let mut spec = spec();
        spec.is_check = true;
        let err = build(&spec, &StubFactory::default()).err().unwrap();
        assert!(matches!(err, ColScanError::AssertionFailed(_)));
    }

    #[test]
    fn test_bad_index_and_unknown_needed_column() {
        let mut bad_index = spec();
        bad_index.index_idx = 3;
        assert!(matches!(
            build(&bad_index, &StubFactory::default()),
            Err(ColScanError::Config(_))
        ));

        let mut bad_column = spec();
        bad_column.needed_columns.push(ColumnId(3));
        assert!(matches!(
            build(&bad_column, &StubFactory::default()),
            Err(ColScanError::Config(_))
        ));
    }

    #[test]
    fn test_projection_with_system_column() {
        let table = Arc::new(
            TableDescriptor::clone(&table()).with_system_columns(&[SystemColumnKind::MvccTimestamp]),
        );
        let mut spec = TableReaderSpec::new(table, Vec::new());
        spec.visibility = ScanVisibility::PublicAndNotPublic;
        spec.has_system_columns = true;
        spec.needed_columns = vec![
            ColumnId(1),
            ColumnId(2),
            ColumnId(3),
            SystemColumnKind::MvccTimestamp.column_id(),
        ];

        let scan = build(&spec, &StubFactory::default()).unwrap();
        let proj = scan.projection().unwrap();
        assert_eq!(proj.len(), 4);
        assert_eq!(proj.ordinals.len(), 4);
        for (ordinal, id) in spec.needed_columns.iter().enumerate() {
            assert_eq!(proj.ordinals.get(*id), Some(ordinal));
        }
        assert_eq!(scan.result_types()[3], DataType::Decimal128(38, 10));
    }

    #[test]
    fn test_limits_disable_parallelism() {
        let mut spec = spec();
        spec.parallelize = true;
        spec.limit_hint = 10;
        let scan = build(&spec, &StubFactory::default()).unwrap();
        assert!(!scan.parallelize());

        let mut spec = self::spec();
        spec.parallelize = true;
        spec.batch_bytes_limit = 4096;
        let scan = build(&spec, &StubFactory::default()).unwrap();
        assert!(!scan.parallelize());
        assert_eq!(scan.batch_bytes_limit(), 4096);

        let mut spec = self::spec();
        spec.parallelize = true;
        let post = PostProcessSpec { limit: 5, offset: 2 };
        let scan = ColBatchScan::new(
            &flow(),
            &EvalContext::default(),
            &spec,
            &post,
            0,
            &StubFactory::default(),
        )
        .unwrap();
        assert!(!scan.parallelize());
        assert_eq!(scan.limit_hint(), 7);
    }

    #[test]
    fn test_default_bytes_limit() {
        let scan = build(&spec(), &StubFactory::default()).unwrap();
        assert!(!scan.parallelize());
        assert_eq!(scan.batch_bytes_limit(), crate::config::DEFAULT_BATCH_BYTES_LIMIT);

        let mut parallel = spec();
        parallel.parallelize = true;
        let scan = build(&parallel, &StubFactory::default()).unwrap();
        assert!(scan.parallelize());
        assert_eq!(scan.batch_bytes_limit(), 0);
    }

    #[test]
    fn test_bounded_staleness_respects_schema_time() {
        let eval = EvalContext {
            as_of_system_time: Some(AsOfSystemTime {
                timestamp: Timestamp::new(100, 0),
                bounded_staleness: true,
                nearest_only: true,
                max_timestamp_bound: None,
            }),
        };
        let factory = StubFactory::default();
        let mut scan = ColBatchScan::new(
            &flow(),
            &eval,
            &spec(),
            &PostProcessSpec::default(),
            0,
            &factory,
        )
        .unwrap();

        let header = *scan.bounded_staleness_header().unwrap();
        assert_eq!(header.min_timestamp_bound, Timestamp::new(500, 0));
        assert!(header.min_timestamp_bound_strict);
        assert_eq!(header.max_timestamp_bound, None);

        scan.init(&ExecContext::new()).unwrap();
        let (_, _, _, sent) = (*factory.observed.start_args.lock()).unwrap();
        assert_eq!(sent, Some(header));
    }

    #[test]
    fn test_exact_read_has_no_staleness_header() {
        let eval = EvalContext {
            as_of_system_time: Some(AsOfSystemTime {
                timestamp: Timestamp::new(100, 0),
                bounded_staleness: false,
                nearest_only: false,
                max_timestamp_bound: None,
            }),
        };
        let scan = ColBatchScan::new(
            &flow(),
            &eval,
            &spec(),
            &PostProcessSpec::default(),
            0,
            &StubFactory::default(),
        )
        .unwrap();
        assert!(scan.bounded_staleness_header().is_none());
    }

    #[test]
    fn test_init_is_idempotent_and_passes_limits() {
        let factory = StubFactory::default();
        let mut spec = spec();
        spec.limit_hint = 3;
        let mut scan = build(&spec, &factory).unwrap();
        let ctx = ExecContext::new();
        scan.init(&ctx).unwrap();
        scan.init(&ctx).unwrap();

        assert_eq!(factory.observed.starts.load(Ordering::SeqCst), 1);
        let (limit_batches, bytes, hint, _) = (*factory.observed.start_args.lock()).unwrap();
        assert!(limit_batches);
        assert_eq!(bytes, crate::config::DEFAULT_BATCH_BYTES_LIMIT);
        assert_eq!(hint, 3);
    }

    #[test]
    fn test_start_failure_is_internal() {
        let factory = StubFactory {
            fail_start: true,
            ..StubFactory::default()
        };
        let mut scan = build(&spec(), &factory).unwrap();
        let err = scan.init(&ExecContext::new()).unwrap_err();
        assert!(matches!(err, ColScanError::Internal(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_failed_start_is_not_retried() {
        let factory = StubFactory {
            fail_start: true,
            ..StubFactory::default()
        };
        let mut scan = build(&spec(), &factory).unwrap();
        let root = SpanRecorder::root("flow");
        let ctx = ExecContext::new().with_recording(Arc::clone(&root));

        assert!(scan.init(&ctx).is_err());
        scan.init(&ctx).unwrap();
        assert_eq!(factory.observed.starts.load(Ordering::SeqCst), 1);

        let scan_spans: Vec<_> = root
            .recording()
            .into_iter()
            .filter(|s| s.operation == OPERATOR_NAME)
            .collect();
        assert_eq!(scan_spans.len(), 1);
        assert!(scan_spans[0].duration_nanos.is_some());

        // 시작 실패 후 pull은 fetcher를 호출하지 않음
        assert!(matches!(scan.next(), Err(ColScanError::Internal(_))));
        assert_eq!(factory.observed.pulls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_next_before_init_is_internal() {
        let mut scan = build(&spec(), &StubFactory::default()).unwrap();
        assert!(matches!(scan.next(), Err(ColScanError::Internal(_))));
    }

    #[test]
    fn test_rows_read_accumulates() {
        let factory = StubFactory {
            batch_sizes: vec![3, 5, 2],
            ..StubFactory::default()
        };
        let mut scan = build(&spec(), &factory).unwrap();
        assert_eq!(scan.bytes_read(), 0);
        scan.init(&ExecContext::new()).unwrap();

        let mut expected = 0;
        while let Some(batch) = scan.next().unwrap() {
            expected += batch.num_rows() as u64;
            assert_eq!(scan.rows_read(), expected);
        }
        assert_eq!(scan.rows_read(), 10);
        assert_eq!(scan.bytes_read(), 80);

        // 소진 후에는 페처를 다시 호출하지 않음
        let pulls = factory.observed.pulls.load(Ordering::SeqCst);
        assert!(scan.next().unwrap().is_none());
        assert_eq!(factory.observed.pulls.load(Ordering::SeqCst), pulls);
    }

    #[test]
    fn test_selection_vector_is_fatal() {
        let factory = StubFactory {
            batch_sizes: vec![2],
            sparse: true,
            ..StubFactory::default()
        };
        let mut scan = build(&spec(), &factory).unwrap();
        scan.init(&ExecContext::new()).unwrap();

        let err = scan.next().unwrap_err();
        assert!(matches!(err, ColScanError::Internal(_)));
        assert_eq!(scan.rows_read(), 0);
    }

    #[test]
    fn test_drain_meta_order() {
        let cache = Arc::new(crate::kv::InMemoryRangeCache::new());
        cache.insert(crate::kv::RangeInfo {
            desc: crate::kv::RangeDescriptor {
                range_id: 9,
                start_key: b"/52".to_vec(),
                end_key: b"/53".to_vec(),
            },
            lease: Some(crate::kv::Lease {
                node_id: NodeId(4),
                sequence: 2,
            }),
        });
        let flow = flow().with_range_cache(cache);
        let factory = StubFactory {
            batch_sizes: vec![4],
            ..StubFactory::default()
        };
        let mut scan = ColBatchScan::new(
            &flow,
            &EvalContext::default(),
            &spec(),
            &PostProcessSpec::default(),
            0,
            &factory,
        )
        .unwrap();

        let root = SpanRecorder::root("flow");
        scan.init(&ExecContext::new().with_recording(root)).unwrap();
        while scan.next().unwrap().is_some() {}

        let meta = scan.drain_meta();
        assert_eq!(meta.len(), 3);
        assert!(matches!(&meta[0], ProducerMetadata::Ranges(r) if r[0].desc.range_id == 9));
        assert_eq!(
            meta[1],
            ProducerMetadata::Metrics(MetricsMeta {
                bytes_read: 32,
                rows_read: 4
            })
        );
        assert!(matches!(&meta[2], ProducerMetadata::TraceData(spans) if spans[0].operation == "colbatchscan"));
    }

    #[test]
    fn test_local_flow_reports_no_ranges() {
        let cache = Arc::new(crate::kv::InMemoryRangeCache::new());
        cache.insert(crate::kv::RangeInfo {
            desc: crate::kv::RangeDescriptor {
                range_id: 9,
                start_key: b"/52".to_vec(),
                end_key: b"/53".to_vec(),
            },
            lease: Some(crate::kv::Lease {
                node_id: NodeId(4),
                sequence: 2,
            }),
        });
        let flow = flow().with_range_cache(cache).local(true);
        let mut scan = ColBatchScan::new(
            &flow,
            &EvalContext::default(),
            &spec(),
            &PostProcessSpec::default(),
            0,
            &StubFactory::default(),
        )
        .unwrap();

        let meta = scan.drain_meta();
        assert_eq!(meta.len(), 1);
        assert!(matches!(meta[0], ProducerMetadata::Metrics(_)));
    }

    #[test]
    fn test_close_and_release_are_idempotent() {
        let factory = StubFactory::default();
        let mut scan = build(&spec(), &factory).unwrap();
        let ctx = ExecContext::new();

        // init 없이도 안전
        scan.close(&ctx).unwrap();
        scan.close(&ctx).unwrap();
        scan.release();
        scan.release();
        assert!(scan.is_released());
        assert_eq!(factory.observed.closes.load(Ordering::SeqCst), 1);
        assert_eq!(factory.observed.releases.load(Ordering::SeqCst), 1);

        assert!(matches!(scan.init(&ctx), Err(ColScanError::Internal(_))));
        assert_eq!(scan.rows_read(), 0);
    }

    #[test]
    fn test_release_before_close_closes_fetcher() {
        let factory = StubFactory::default();
        let mut scan = build(&spec(), &factory).unwrap();
        scan.release();
        scan.close(&ExecContext::new()).unwrap();
        assert_eq!(factory.observed.closes.load(Ordering::SeqCst), 1);
        assert_eq!(factory.observed.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_scrubs_state() {
        let mut state = ScanState::default();
        state.spans.push(Span::new(b"/52/secret".to_vec(), b"/52/secreu".to_vec()));
        state.flow = Some(flow());
        state.limit_hint = 9;
        state.batch_bytes_limit = 1;
        state.parallelize = true;
        state.started = true;
        state.exhausted = true;
        state.progress.add_rows(12);
        state.projection.ordinals.set(ColumnId(1), 0);
        state.bs_header = Some(BoundedStalenessHeader::for_schema(
            Timestamp::new(700, 0),
            true,
            None,
            Timestamp::new(500, 0),
        ));
        let observed = Arc::new(Observed::default());
        state.fetcher = Some(Box::new(StubFetcher {
            batches: Vec::new(),
            schema: Arc::new(Schema::empty()),
            fail_start: false,
            observed: Arc::clone(&observed),
            stats: Arc::new(FetcherStats::default()),
        }));
        let root = SpanRecorder::root("flow");
        let (ctx, op_span) = processor_span(&ExecContext::new().with_recording(root), OPERATOR_NAME);
        state.ctx = Some(ctx);
        state.op_span = op_span;
        assert!(state.op_span.is_some());

        state.reset();
        assert!(state.bs_header.is_none());
        assert!(state.fetcher.is_none());
        assert!(state.ctx.is_none());
        assert!(state.op_span.is_none());
        assert!(state.spans.is_empty());
        assert!(state.flow.is_none());
        assert!(state.projection.is_empty());
        assert!(state.projection.ordinals.is_empty());
        assert_eq!(state.limit_hint, 0);
        assert_eq!(state.batch_bytes_limit, 0);
        assert!(!state.parallelize);
        assert!(!state.started && !state.exhausted);
        assert_eq!(state.progress.rows_read(), 0);
    }

    #[test]
    fn test_scan_over_memory_store() {
        let store = Arc::new(MemKvStore::new());
        for i in 0..5i64 {
            store.put(
                format!("/52/1/{i}").into_bytes(),
                StoredRow::new(Timestamp::new(600 + i, 0))
                    .with(1, Datum::Int64(i))
                    .with(2, Datum::Int64(i * 100)),
            );
        }
        let factory = MemFetcherFactory::new(store);
        let mut spec = spec();
        spec.needed_columns = vec![ColumnId(1)];

        let mut scan: Box<dyn ScanOperator> = Box::new(build(&spec, &factory).unwrap());
        assert_eq!(
            scan.schema().fields().first().map(|f| f.as_ref().clone()),
            Some(Field::new("id", DataType::Int64, false))
        );
        scan.init(&ExecContext::new()).unwrap();

        let mut ids = Vec::new();
        while let Some(batch) = scan.next().unwrap() {
            let col = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
            ids.extend(col.values().iter().copied());
            assert_eq!(batch.column(1).null_count(), batch.num_rows());
        }
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(scan.rows_read(), 5);
        assert!(scan.bytes_read() > 0);

        scan.close(&ExecContext::new()).unwrap();
        scan.release();
    }
}
