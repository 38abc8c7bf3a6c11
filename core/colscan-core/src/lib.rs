//! # colscan — Columnar KV Scan Operator
//!
//! colscan은 트랜잭션 KV 저장소의 범위 스캔을 Apache Arrow `RecordBatch` 스트림으로
//! 변환하는 벡터화 실행 엔진의 리프 연산자입니다.
//!
//! ## 주요 특징
//!
//! - **Projection 해석**: public / non-public 컬럼, 가상 컬럼, 시스템 컬럼, 타입 hydration
//! - **Bounded staleness**: 최소 타임스탬프를 스키마 변경 시각 이상으로 보정
//! - **풀링된 인스턴스**: 반납 시 키 바이트를 0으로 덮어쓰고 초기화
//! - **동시 메트릭**: 다른 스레드에서 bytes/rows read 조회 가능
//! - **메타데이터 드레인**: misplanned range, leaf txn 상태, 메트릭, trace
//!
//! ## 빠른 시작
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::datatypes::DataType;
//! use colscan_core::catalog::{Column, ColumnId, IndexDescriptor, TableDescriptor};
//! use colscan_core::executor::fetcher::{Datum, MemFetcherFactory, MemKvStore, StoredRow};
//! use colscan_core::executor::{
//!     ColBatchScan, EvalContext, ExecContext, FlowContext, KvReader, NodeIdentity, Operator,
//!     PostProcessSpec, Releasable, TableReaderSpec,
//! };
//! use colscan_core::kv::{NodeId, Span, Timestamp};
//!
//! # fn main() -> colscan_core::ColScanResult<()> {
//! let table = Arc::new(
//!     TableDescriptor::new(7, "users")
//!         .with_column(Column::new(1, "id", DataType::Int64).not_null())
//!         .with_index(IndexDescriptor::primary(1, "users_pkey", vec![ColumnId(1)])),
//! );
//!
//! let store = Arc::new(MemKvStore::new());
//! store.put(b"/7/1".to_vec(), StoredRow::new(Timestamp::new(1, 0)).with(1, Datum::Int64(1)));
//!
//! let mut spec = TableReaderSpec::new(table, vec![Span::new(b"/7/".to_vec(), b"/8".to_vec())]);
//! spec.needed_columns = vec![ColumnId(1)];
//!
//! let flow = FlowContext::new(NodeIdentity::Assigned(NodeId(1)));
//! let factory = MemFetcherFactory::new(store);
//! let mut scan = ColBatchScan::new(
//!     &flow,
//!     &EvalContext::default(),
//!     &spec,
//!     &PostProcessSpec::default(),
//!     0,
//!     &factory,
//! )?;
//!
//! scan.init(&ExecContext::new())?;
//! while let Some(batch) = scan.next()? {
//!     assert_eq!(batch.num_rows(), 1);
//! }
//! assert_eq!(scan.rows_read(), 1);
//! scan.release();
//! # Ok(())
//! # }
//! ```
//!
//! ## 모듈 구조
//!
//! - [`catalog`] — 테이블/컬럼/인덱스 디스크립터, 타입 해석
//! - [`kv`] — Span, 타임스탬프, range cache, 트랜잭션 핸들
//! - [`executor`] — 실행 컨텍스트, 페처 계약, [`ColBatchScan`] 연산자
//! - [`config`] — [`ScanSettings`]
//! - [`logging`] — tracing 초기화

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod kv;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use config::ScanSettings;
pub use error::{ColScanError, ColScanResult};
pub use executor::ColBatchScan;
