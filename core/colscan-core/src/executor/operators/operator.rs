//! Operator capability traits — Volcano 실행 모델 (Pull 기반)

use crate::error::ColScanResult;
use crate::executor::context::ExecContext;
use crate::executor::metadata::ProducerMetadata;
use arrow::array::RecordBatch;
use arrow::datatypes::Schema;
use std::time::Duration;

/// 연산자 트레이트 — pull-based batch producer
pub trait Operator: Send {
    /// 출력 스키마 반환
    fn schema(&self) -> &Schema;

    /// Prepare for pulling. A second call is a no-op.
    fn init(&mut self, ctx: &ExecContext) -> ColScanResult<()>;

    /// 다음 RecordBatch 반환 (None이면 끝)
    fn next(&mut self) -> ColScanResult<Option<RecordBatch>>;
}

/// Read counters of an operator that talks to the KV layer.
///
/// All accessors may be called from a thread other than the one pulling batches.
pub trait KvReader {
    fn bytes_read(&self) -> u64;

    fn rows_read(&self) -> u64;

    /// Time spent waiting on conflicting transactions, from the trace recording.
    fn cumulative_contention_time(&self) -> Duration;
}

/// Source of end-of-stream side-channel records.
pub trait MetadataSource {
    fn drain_meta(&mut self) -> Vec<ProducerMetadata>;
}

/// 리소스 정리
pub trait Closer {
    fn close(&mut self, ctx: &ExecContext) -> ColScanResult<()>;
}

/// Pooled operator that can hand its instance back.
pub trait Releasable {
    fn release(&mut self);
}

/// Capability set of a leaf scan operator.
pub trait ScanOperator: Operator + KvReader + MetadataSource + Closer + Releasable {}

impl<T> ScanOperator for T where T: Operator + KvReader + MetadataSource + Closer + Releasable {}
