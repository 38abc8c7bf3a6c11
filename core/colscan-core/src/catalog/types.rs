//! Column types and hydration of deferred (user-defined) type references.

use crate::error::{ColScanError, ColScanResult};
use ahash::AHashMap;
use arrow::datatypes::DataType;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Reference to a user-defined type whose definition lives in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub type_id: u32,
    pub name: String,
}

/// Column type as stored in a table descriptor.
///
/// Descriptors may carry only a reference to a user-defined type; such a type
/// must be hydrated before any batch is decoded with it.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    Hydrated(DataType),
    Deferred(TypeRef),
}

impl ColumnType {
    pub fn is_hydrated(&self) -> bool {
        matches!(self, ColumnType::Hydrated(_))
    }

    pub fn data_type(&self) -> Option<&DataType> {
        match self {
            ColumnType::Hydrated(dt) => Some(dt),
            ColumnType::Deferred(_) => None,
        }
    }

    pub fn name(&self) -> String {
        match self {
            ColumnType::Hydrated(dt) => dt.to_string(),
            ColumnType::Deferred(r) => r.name.clone(),
        }
    }
}

impl From<DataType> for ColumnType {
    fn from(dt: DataType) -> Self {
        ColumnType::Hydrated(dt)
    }
}

/// Resolves deferred type references to full definitions.
pub trait TypeResolver: Send + Sync {
    fn resolve(&self, type_ref: &TypeRef) -> ColScanResult<DataType>;
}

/// Hydrate every type in place.
///
/// Returns the first resolution failure; already-hydrated entries are left untouched.
pub fn hydrate_type_slice(resolver: &dyn TypeResolver, typs: &mut [ColumnType]) -> ColScanResult<()> {
    for typ in typs.iter_mut() {
        if let ColumnType::Deferred(type_ref) = typ {
            let resolved = resolver.resolve(type_ref)?;
            *typ = ColumnType::Hydrated(resolved);
        }
    }
    Ok(())
}

/// Unwrap a hydrated slice into Arrow types.
pub fn hydrated_data_types(typs: &[ColumnType]) -> ColScanResult<Vec<DataType>> {
    typs.iter()
        .map(|typ| match typ {
            ColumnType::Hydrated(dt) => Ok(dt.clone()),
            ColumnType::Deferred(r) => Err(ColScanError::TypeHydration {
                type_name: r.name.clone(),
                reason: "type was not hydrated".to_string(),
            }),
        })
        .collect()
}

/// 사용자 정의 타입 레지스트리 (in-memory resolver)
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: RwLock<AHashMap<u32, DataType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, type_id: u32, data_type: DataType) {
        self.types.write().insert(type_id, data_type);
    }
}

impl TypeResolver for TypeRegistry {
    fn resolve(&self, type_ref: &TypeRef) -> ColScanResult<DataType> {
        self.types
            .read()
            .get(&type_ref.type_id)
            .cloned()
            .ok_or_else(|| ColScanError::TypeHydration {
                type_name: type_ref.name.clone(),
                reason: format!("type {} not found", type_ref.type_id),
            })
    }
}
