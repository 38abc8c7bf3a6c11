//! Plan-side description of a table read.

use crate::catalog::{Column, ColumnId, TableDescriptor};
use crate::kv::Span;
use std::sync::Arc;

/// Which columns are eligible for projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanVisibility {
    #[default]
    Public,
    /// Public columns plus ones still being added or dropped
    PublicAndNotPublic,
}

/// Row-level locking requested by the read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockingStrength {
    #[default]
    None,
    ForShare,
    ForUpdate,
}

/// What to do when a row lock is held by another transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockingWaitPolicy {
    #[default]
    Block,
    Skip,
    Error,
}

/// 테이블 리더 스펙
#[derive(Debug, Clone)]
pub struct TableReaderSpec {
    pub table: Arc<TableDescriptor>,
    /// Ordinal into the table's active indexes
    pub index_idx: usize,
    pub visibility: ScanVisibility,
    pub needed_columns: Vec<ColumnId>,
    /// Virtual column synthesized by the index, e.g. an inverted-index key
    pub virtual_column: Option<Column>,
    pub has_system_columns: bool,
    pub spans: Vec<Span>,
    /// Heuristic row budget; zero means none
    pub limit_hint: u64,
    /// Byte budget per KV batch; zero means unset
    pub batch_bytes_limit: u64,
    pub parallelize: bool,
    pub reverse: bool,
    pub locking_strength: LockingStrength,
    pub locking_wait_policy: LockingWaitPolicy,
    /// Consistency-check scans are not served by this operator
    pub is_check: bool,
}

impl TableReaderSpec {
    pub fn new(table: Arc<TableDescriptor>, spans: Vec<Span>) -> Self {
        Self {
            table,
            index_idx: 0,
            visibility: ScanVisibility::Public,
            needed_columns: Vec::new(),
            virtual_column: None,
            has_system_columns: false,
            spans,
            limit_hint: 0,
            batch_bytes_limit: 0,
            parallelize: false,
            reverse: false,
            locking_strength: LockingStrength::None,
            locking_wait_policy: LockingWaitPolicy::Block,
            is_check: false,
        }
    }
}

/// Post-processing applied to the reader's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostProcessSpec {
    /// Zero means no limit
    pub limit: u64,
    pub offset: u64,
}

/// Row budget for the scan.
///
/// A post-processing limit is exact, so it wins over the planner's heuristic hint;
/// rows skipped by the offset still have to be read.
pub fn limit_hint(spec_limit_hint: u64, post: &PostProcessSpec) -> u64 {
    if post.limit != 0 {
        post.limit.saturating_add(post.offset)
    } else {
        spec_limit_hint
    }
}
