//! # Catalog Interface
//!
//! The catalog supplies table definitions used to seed scan nodes. A scan turns each
//! column into a `SlotReference` with a fresh identifier, so the catalog is only read
//! while building leaf plans; rewrite rules never consult it.
//!
//! ## Trait Design
//!
//! `Catalog` is a small trait used behind `&dyn Catalog` so that the surrounding
//! optimizer can plug in its own metadata source. `InMemoryCatalog` is a
//! HashMap-backed implementation for tests and for the rewrite service.

use crate::expr::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Reference to a table in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

/// A table definition: its reference and ordered columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableDef {
    pub table: TableRef,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(table: TableRef, columns: Vec<ColumnDef>) -> Self {
        Self { table, columns }
    }
}

/// Catalog provides table definitions.
pub trait Catalog: Send + Sync {
    fn get_table(&self, table: &TableRef) -> Option<Arc<TableDef>>;
}

/// In-memory catalog for tests and the rewrite service.
///
/// Tables are keyed by their fully-qualified name (`schema.table`).
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tables: HashMap<String, Arc<TableDef>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, def: TableDef) {
        self.tables.insert(def.table.to_string(), Arc::new(def));
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn get_table(&self, table: &TableRef) -> Option<Arc<TableDef>> {
        self.tables.get(&table.to_string()).cloned()
    }
}
