//! Column projection resolution — output types and ID → ordinal map of a scan.

use crate::catalog::types::hydrated_data_types;
use crate::catalog::{
    Column, ColumnId, ColumnOrdinalMap, ColumnType, TableDescriptor, TypeResolver,
    hydrate_type_slice,
};
use crate::error::ColScanResult;
use crate::executor::spec::ScanVisibility;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One output column of a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedColumn {
    pub id: ColumnId,
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

/// Resolved projection: every eligible column in output order.
///
/// `ordinals` maps each column ID to its index in `columns`; system columns,
/// when requested, follow all table columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnProjection {
    pub columns: Vec<ProjectedColumn>,
    pub ordinals: ColumnOrdinalMap,
}

impl ColumnProjection {
    pub fn types(&self) -> Vec<DataType> {
        self.columns.iter().map(|c| c.data_type.clone()).collect()
    }

    pub fn schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(c.name.clone(), c.data_type.clone(), c.nullable))
            .collect();
        Arc::new(Schema::new(fields))
    }

    /// Schema of the batches a scan emits.
    ///
    /// Columns outside `needed` are filled with nulls, so they are always nullable.
    pub fn output_schema(&self, needed: &BTreeSet<ColumnId>) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| {
                let nullable = c.nullable || !needed.contains(&c.id);
                Field::new(c.name.clone(), c.data_type.clone(), nullable)
            })
            .collect();
        Arc::new(Schema::new(fields))
    }

    pub fn clear(&mut self) {
        self.columns.clear();
        self.ordinals.clear();
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Resolve the columns a scan of `table` produces.
///
/// A table column sharing its ID with `virtual_column` takes the virtual
/// column's definition. All types, including system column types, are hydrated
/// before returning.
pub fn resolve_projection(
    table: &TableDescriptor,
    virtual_column: Option<&Column>,
    visibility: ScanVisibility,
    has_system_columns: bool,
    resolver: &dyn TypeResolver,
) -> ColScanResult<ColumnProjection> {
    let mut cols: Vec<Column> = match visibility {
        ScanVisibility::Public => table.public_columns().into_iter().cloned().collect(),
        ScanVisibility::PublicAndNotPublic => {
            table.deletable_columns().into_iter().cloned().collect()
        }
    };

    if let Some(virtual_col) = virtual_column {
        for col in cols.iter_mut().filter(|c| c.id == virtual_col.id) {
            col.column_type = virtual_col.column_type.clone();
            col.nullable = virtual_col.nullable;
        }
    }

    let mut ordinals = ColumnOrdinalMap::from_columns(cols.iter());

    if has_system_columns {
        for sys_col in table.system_columns() {
            ordinals.set(sys_col.id, ordinals.len());
            cols.push(sys_col);
        }
    }

    let mut typs: Vec<ColumnType> = cols.iter().map(|c| c.column_type.clone()).collect();
    hydrate_type_slice(resolver, &mut typs)?;
    let data_types = hydrated_data_types(&typs)?;

    let columns = cols
        .into_iter()
        .zip(data_types)
        .map(|(col, data_type)| ProjectedColumn {
            id: col.id,
            name: col.name,
            data_type,
            nullable: col.nullable,
        })
        .collect();

    Ok(ColumnProjection { columns, ordinals })
}
