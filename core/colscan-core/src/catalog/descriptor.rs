//! Table, column and index descriptors.

use crate::catalog::types::ColumnType;
use crate::kv::Timestamp;
use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column identifier, unique within a table.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ColumnId(pub u32);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnState {
    Public,
    /// Being added: written but not yet readable by queries
    WriteOnly,
    /// Being dropped: only deletes still maintain it
    DeleteOnly,
}

/// Synthesized per-row system columns, in declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemColumnKind {
    /// Commit timestamp of the row's current version
    MvccTimestamp,
    /// Identifier of the table the row belongs to
    TableOid,
}

impl SystemColumnKind {
    pub const ALL: [SystemColumnKind; 2] = [SystemColumnKind::MvccTimestamp, SystemColumnKind::TableOid];

    pub fn column_id(&self) -> ColumnId {
        match self {
            SystemColumnKind::MvccTimestamp => ColumnId(u32::MAX),
            SystemColumnKind::TableOid => ColumnId(u32::MAX - 1),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SystemColumnKind::MvccTimestamp => "crdb_internal_mvcc_timestamp",
            SystemColumnKind::TableOid => "tableoid",
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            SystemColumnKind::MvccTimestamp => DataType::Decimal128(38, 10),
            SystemColumnKind::TableOid => DataType::UInt32,
        }
    }

    pub fn from_column_id(id: ColumnId) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.column_id() == id)
    }
}

/// 컬럼 디스크립터
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub state: ColumnState,
    pub system: Option<SystemColumnKind>,
}

impl Column {
    pub fn new(id: u32, name: &str, column_type: impl Into<ColumnType>) -> Self {
        Self {
            id: ColumnId(id),
            name: name.to_string(),
            column_type: column_type.into(),
            nullable: true,
            state: ColumnState::Public,
            system: None,
        }
    }

    pub fn with_state(mut self, state: ColumnState) -> Self {
        self.state = state;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn system(kind: SystemColumnKind) -> Self {
        Self {
            id: kind.column_id(),
            name: kind.name().to_string(),
            column_type: ColumnType::Hydrated(kind.data_type()),
            nullable: true,
            state: ColumnState::Public,
            system: Some(kind),
        }
    }

    pub fn is_public(&self) -> bool {
        self.state == ColumnState::Public
    }
}

/// 인덱스 디스크립터
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub id: u32,
    pub name: String,
    pub key_column_ids: Vec<ColumnId>,
    pub is_primary: bool,
    /// Inactive indexes are still being backfilled and cannot serve reads
    pub is_active: bool,
}

impl IndexDescriptor {
    pub fn primary(id: u32, name: &str, key_column_ids: Vec<ColumnId>) -> Self {
        Self {
            id,
            name: name.to_string(),
            key_column_ids,
            is_primary: true,
            is_active: true,
        }
    }

    pub fn secondary(id: u32, name: &str, key_column_ids: Vec<ColumnId>) -> Self {
        Self {
            id,
            name: name.to_string(),
            key_column_ids,
            is_primary: false,
            is_active: true,
        }
    }
}

/// 테이블 디스크립터
///
/// `columns` holds every column including ones mid-schema-change; the public
/// ones come first in [`TableDescriptor::deletable_columns`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub id: u32,
    pub name: String,
    pub version: u64,
    pub columns: Vec<Column>,
    pub indexes: Vec<IndexDescriptor>,
    /// Commit time of the descriptor version in use
    pub modification_time: Timestamp,
    /// System columns the table exposes, in declared order
    pub system_column_kinds: Vec<SystemColumnKind>,
}

impl TableDescriptor {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            version: 1,
            columns: Vec::new(),
            indexes: Vec::new(),
            modification_time: Timestamp::default(),
            system_column_kinds: SystemColumnKind::ALL.to_vec(),
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_modification_time(mut self, ts: Timestamp) -> Self {
        self.modification_time = ts;
        self
    }

    pub fn with_system_columns(mut self, kinds: &[SystemColumnKind]) -> Self {
        self.system_column_kinds = kinds.to_vec();
        self
    }

    /// Columns visible to queries.
    pub fn public_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_public()).collect()
    }

    /// Public columns followed by write-only and delete-only ones.
    pub fn deletable_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| c.is_public())
            .chain(self.columns.iter().filter(|c| !c.is_public()))
            .collect()
    }

    /// System columns in declared order.
    pub fn system_columns(&self) -> Vec<Column> {
        self.system_column_kinds
            .iter()
            .copied()
            .map(Column::system)
            .collect()
    }

    /// Indexes able to serve reads, primary first.
    pub fn active_indexes(&self) -> Vec<&IndexDescriptor> {
        self.indexes
            .iter()
            .filter(|i| i.is_active && i.is_primary)
            .chain(self.indexes.iter().filter(|i| i.is_active && !i.is_primary))
            .collect()
    }

    pub fn find_column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }
}
