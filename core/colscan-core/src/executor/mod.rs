//! Vectorized execution: contexts, the fetcher contract, and the scan operator.

pub mod context;
pub mod fetcher;
pub mod metadata;
pub mod operators;
pub mod pool;
pub mod projection;
pub mod spec;
pub mod trace;

pub use context::{
    AsOfSystemTime, EvalContext, ExecContext, FlowContext, NodeIdentity, processor_span,
};
pub use fetcher::{BatchFetcher, ColumnBatch, FetcherFactory, FetcherInit, StartScanRequest};
pub use metadata::{MetricsMeta, ProducerMetadata};
pub use operators::{
    ColBatchScan, Closer, KvReader, MetadataSource, Operator, Releasable, ScanOperator,
    ScanProgress, scan_pool_stats,
};
pub use pool::{ObjectPool, PoolStatsSnapshot, Poolable};
pub use projection::{ColumnProjection, resolve_projection};
pub use spec::{
    LockingStrength, LockingWaitPolicy, PostProcessSpec, ScanVisibility, TableReaderSpec,
};
pub use trace::{OperatorSpan, RecordedSpan, SpanRecorder, TraceEvent};
