//! Catalog shapes the scan reads: descriptors, column types and ordinal maps.
//!
//! Descriptor resolution itself (leasing, caching, versioning) is out of scope.

pub mod col_map;
pub mod descriptor;
pub mod types;

pub use col_map::ColumnOrdinalMap;
pub use descriptor::{
    Column, ColumnId, ColumnState, IndexDescriptor, SystemColumnKind, TableDescriptor,
};
pub use types::{ColumnType, TypeRef, TypeRegistry, TypeResolver, hydrate_type_slice};
