use std::cmp::Ordering;
use std::collections::HashMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use crate::datatable::{
    Acknowledged, Caller, Context, CreateRequest, CreateRow, DataTableResponse, DeletePayload, DeleteRequest,
    DeleteResponse, DeleteRow, GetRequest, GetRow, ListPayload, ListRequest, ListResponse, ListRows, ReorderPayload,
    ReorderRequest, ReorderResponse, ReorderRows, RowModel, RowPayload, RowResponse, SortDirection, UpdateRequest,
    UpdateResponse, UpdateRow,
};

use super::row::{incomplete_order, to_columns, TableRow, DUPLICATE_ROW, NOT_FOUND, NOT_REORDERABLE};

type Columns = Map<String, Value>;

/// In-process table with the same observable behaviour as `PgTable`.
///
/// Rows are kept as column maps so scoping, sorting and soft deletion work
/// on column names exactly like the SQL backend.
pub struct MemoryTable<R> {
    state: RwLock<MemoryState>,
    _row: PhantomData<fn() -> R>,
}

struct MemoryState {
    next_id: i64,
    rows: Vec<Columns>,
}

impl<R: TableRow> Default for MemoryTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: TableRow> MemoryTable<R> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState { next_id: 1, rows: vec![] }),
            _row: PhantomData,
        }
    }

    /// Seed with existing rows; new ids continue after the largest one.
    pub fn with_rows(rows: impl IntoIterator<Item = R>) -> anyhow::Result<Self> {
        let mut state = MemoryState { next_id: 1, rows: vec![] };
        for row in rows {
            state.next_id = state.next_id.max(row.id() + 1);
            state.rows.push(to_columns(&row)?);
        }
        Ok(Self {
            state: RwLock::new(state),
            _row: PhantomData,
        })
    }

    fn row_id(row: &Columns) -> i64 {
        row.get("id").and_then(Value::as_i64).unwrap_or_default()
    }

    fn is_live(row: &Columns) -> bool {
        match R::SOFT_DELETE_COLUMN {
            Some(column) => row.get(column).map_or(true, Value::is_null),
            None => true,
        }
    }

    fn in_scope(row: &Columns, scope: &Columns) -> bool {
        scope.iter().all(|(column, value)| row.get(column) == Some(value))
    }

    fn find(state: &MemoryState, id: i64, scope: &Columns) -> Option<usize> {
        state
            .rows
            .iter()
            .position(|r| Self::row_id(r) == id && Self::in_scope(r, scope) && Self::is_live(r))
    }

    fn violates_unique(state: &MemoryState, candidate: &Columns) -> bool {
        let id = Self::row_id(candidate);
        R::UNIQUE_COLUMNS.iter().any(|&column| match candidate.get(column) {
            None | Some(Value::Null) => false,
            Some(value) => state
                .rows
                .iter()
                .any(|r| Self::row_id(r) != id && r.get(column) == Some(value)),
        })
    }

    fn decode(row: &Columns) -> anyhow::Result<R> {
        Ok(serde_json::from_value(Value::Object(row.clone()))?)
    }
}

/// Postgres ordering: NULL sorts after every value in ascending order.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            Some(Value::Bool(_)) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Array(_)) | Some(Value::Object(_)) => 3,
            Some(Value::Null) | None => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .unwrap_or_default()
                    .partial_cmp(&y.as_f64().unwrap_or_default())
                    .unwrap_or(Ordering::Equal),
            }
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[async_trait]
impl<R: TableRow> ListRows<R, R::Context> for MemoryTable<R> {
    async fn list(&self, request: &ListRequest<R::Context>, _caller: &Caller) -> anyhow::Result<ListResponse<R>> {
        let scope = request.context.scope();
        let state = self.state.read().await;

        let mut matched: Vec<&Columns> = state
            .rows
            .iter()
            .filter(|r| Self::in_scope(r, &scope) && Self::is_live(r))
            .collect();

        let (field, direction) = request.effective_sort(R::DEFAULT_SORT);
        matched.sort_by(|a, b| {
            let ord = compare_values(a.get(field), b.get(field));
            let ord = match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            ord.then_with(|| Self::row_id(a).cmp(&Self::row_id(b)))
        });

        let row_count = matched.len() as u64;
        let (skip, take) = match request.pagination {
            Some(p) => (p.offset() as usize, p.page_size as usize),
            None => (0, usize::MAX),
        };
        let rows = matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(Self::decode)
            .collect::<anyhow::Result<Vec<R>>>()?;

        Ok(DataTableResponse::Success(ListPayload { row_count, rows }))
    }
}

#[async_trait]
impl<R: TableRow> GetRow<R, R::Context> for MemoryTable<R> {
    async fn get(&self, request: &GetRequest<R::Context>, _caller: &Caller) -> anyhow::Result<RowResponse<R>> {
        let state = self.state.read().await;
        match Self::find(&state, request.id, &request.context.scope()) {
            Some(index) => Ok(DataTableResponse::Success(RowPayload {
                row: Self::decode(&state.rows[index])?,
            })),
            None => Ok(DataTableResponse::failure(NOT_FOUND)),
        }
    }
}

#[async_trait]
impl<R: TableRow> CreateRow<R, R::Context> for MemoryTable<R> {
    async fn create(&self, request: &CreateRequest<R::Create, R::Context>, _caller: &Caller) -> anyhow::Result<RowResponse<R>> {
        let scope = request.context.scope();
        let mut values = R::insert_values(&request.row)?;
        values.extend(scope.clone());

        let mut state = self.state.write().await;
        let id = state.next_id;
        values.insert("id".to_string(), json!(id));

        if let Some(position) = R::POSITION_COLUMN {
            let next = state
                .rows
                .iter()
                .filter(|r| Self::in_scope(r, &scope) && Self::is_live(r))
                .filter_map(|r| r.get(position).and_then(Value::as_i64))
                .max()
                .map_or(0, |last| last + 1);
            values.insert(position.to_string(), json!(next));
        }
        if let Some(column) = R::SOFT_DELETE_COLUMN {
            values.insert(column.to_string(), Value::Null);
        }

        if Self::violates_unique(&state, &values) {
            return Ok(DataTableResponse::failure(DUPLICATE_ROW));
        }

        let row = Self::decode(&values)?;
        state.rows.push(to_columns(&row)?);
        state.next_id += 1;

        Ok(DataTableResponse::Success(RowPayload { row }))
    }
}

#[async_trait]
impl<R: TableRow> UpdateRow<R, R::Context> for MemoryTable<R> {
    async fn update(&self, request: &UpdateRequest<R::Update, R::Context>, _caller: &Caller) -> anyhow::Result<UpdateResponse> {
        let values = R::update_values(&request.row)?;
        let mut state = self.state.write().await;

        let Some(index) = Self::find(&state, request.id, &request.context.scope()) else {
            return Ok(DataTableResponse::failure(NOT_FOUND));
        };

        let mut merged = state.rows[index].clone();
        for (column, value) in values {
            if column != "id" {
                merged.insert(column, value);
            }
        }
        if Self::violates_unique(&state, &merged) {
            return Ok(DataTableResponse::failure(DUPLICATE_ROW));
        }

        // Round-trip through the row type so stored columns stay well-typed
        let row = Self::decode(&merged)?;
        state.rows[index] = to_columns(&row)?;

        Ok(DataTableResponse::Success(Acknowledged {}))
    }
}

#[async_trait]
impl<R: TableRow> DeleteRow<R, R::Context> for MemoryTable<R> {
    async fn delete(&self, request: &DeleteRequest<R::Context>, _caller: &Caller) -> anyhow::Result<DeleteResponse> {
        let mut state = self.state.write().await;

        let Some(index) = Self::find(&state, request.id, &request.context.scope()) else {
            return Ok(DataTableResponse::failure(NOT_FOUND));
        };

        match R::SOFT_DELETE_COLUMN {
            Some(column) => {
                let deleted_at = json!(Utc::now());
                state.rows[index].insert(column.to_string(), deleted_at.clone());

                let mut replacement = Map::new();
                replacement.insert(column.to_string(), deleted_at);
                Ok(DataTableResponse::Success(DeletePayload {
                    replacement: Some(replacement),
                }))
            }
            None => {
                state.rows.remove(index);
                Ok(DataTableResponse::Success(DeletePayload::default()))
            }
        }
    }
}

#[async_trait]
impl<R: TableRow> ReorderRows<R, R::Context> for MemoryTable<R> {
    async fn reorder(&self, request: &ReorderRequest<R::Context>, _caller: &Caller) -> anyhow::Result<ReorderResponse> {
        let Some(position) = R::POSITION_COLUMN else {
            return Ok(DataTableResponse::failure(NOT_REORDERABLE));
        };

        let scope = request.context.scope();
        let mut state = self.state.write().await;

        let indexes: HashMap<i64, usize> = state
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| Self::in_scope(r, &scope) && Self::is_live(r))
            .map(|(index, r)| (Self::row_id(r), index))
            .collect();

        let total = indexes.len() as i64;
        if indexes.len() != request.order.len() || !request.order.iter().all(|id| indexes.contains_key(id)) {
            return Ok(DataTableResponse::failure(incomplete_order(total)));
        }

        for (new_position, id) in request.order.iter().enumerate() {
            state.rows[indexes[id]].insert(position.to_string(), json!(new_position));
        }

        Ok(DataTableResponse::Success(ReorderPayload {
            order: request.order.clone(),
        }))
    }
}
