use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{postgres::PgRow, FromRow, PgPool};

use crate::datatable::{Context, RowModel, SortDirection, TableBackend};

use super::memory::MemoryTable;
use super::table::PgTable;

pub const NOT_FOUND: &str = "Row not found";
pub const DUPLICATE_ROW: &str = "A row with the same unique value already exists";
pub const NOT_REORDERABLE: &str = "Rows of this table cannot be reordered";

pub fn incomplete_order(total: i64) -> String {
    format!("Order must list each of the {} rows exactly once", total)
}

/// A row model persisted in one table.
///
/// Serialized keys of the row, its inputs and its context are column names.
pub trait TableRow: RowModel + for<'r> FromRow<'r, PgRow> + Unpin {
    type Context: Context;

    const TABLE: &'static str;

    /// Used when a list request carries no complete sort.
    const DEFAULT_SORT: (&'static str, SortDirection) = ("id", SortDirection::Asc);

    /// Dense zero-based ordering column; enables reorder.
    const POSITION_COLUMN: Option<&'static str> = None;

    /// Nullable timestamp set on delete instead of removing the row.
    const SOFT_DELETE_COLUMN: Option<&'static str> = None;

    /// Columns under a unique constraint. Postgres enforces these itself;
    /// the in-memory table checks them on insert and update.
    const UNIQUE_COLUMNS: &'static [&'static str] = &[];

    /// Column values written on insert, context columns excluded.
    fn insert_values(input: &Self::Create) -> anyhow::Result<Map<String, Value>> {
        to_columns(input)
    }

    /// Column values written on update. Absent keys are left untouched.
    fn update_values(input: &Self::Update) -> anyhow::Result<Map<String, Value>> {
        to_columns(input)
    }
}

pub fn to_columns<T: Serialize>(input: &T) -> anyhow::Result<Map<String, Value>> {
    match serde_json::to_value(input)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected an object of column values, got {}", other),
    }
}

/// Chooses the storage backend when endpoint families are mounted.
pub trait TableFactory: Send + Sync {
    type Table<R: TableRow>: TableBackend<R, R::Context> + 'static;

    fn table<R: TableRow>(&self) -> Arc<Self::Table<R>>;

    /// Backend name for the health endpoint.
    fn name(&self) -> &'static str;
}

#[derive(Clone)]
pub struct PgTables {
    pool: PgPool,
}

impl PgTables {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TableFactory for PgTables {
    type Table<R: TableRow> = PgTable<R>;

    fn table<R: TableRow>(&self) -> Arc<PgTable<R>> {
        Arc::new(PgTable::new(self.pool.clone()))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryTables;

impl TableFactory for MemoryTables {
    type Table<R: TableRow> = MemoryTable<R>;

    fn table<R: TableRow>(&self) -> Arc<MemoryTable<R>> {
        Arc::new(MemoryTable::new())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
