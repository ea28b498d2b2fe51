use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use sqlx::{PgPool, Row};

use crate::datatable::{
    Acknowledged, Caller, Context, CreateRequest, CreateRow, DataTableResponse, DeletePayload, DeleteRequest,
    DeleteResponse, DeleteRow, GetRequest, GetRow, ListPayload, ListRequest, ListResponse, ListRows, ReorderPayload,
    ReorderRequest, ReorderResponse, ReorderRows, RowPayload, RowResponse, SortDirection, UpdateRequest,
    UpdateResponse, UpdateRow,
};
use crate::filter::{Filter, FilterError, SqlResult};

use super::manager::DatabaseError;
use super::query_builder::{bind_param_query, timed, Insert, QueryBuilder};
use super::row::{incomplete_order, TableRow, DUPLICATE_ROW, NOT_FOUND, NOT_REORDERABLE};

/// Postgres-backed handler for every data-table operation on `R::TABLE`.
pub struct PgTable<R> {
    pool: PgPool,
    _row: PhantomData<fn() -> R>,
}

impl<R: TableRow> PgTable<R> {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, _row: PhantomData }
    }

    /// Live rows inside the context scope.
    fn scoped(context: &R::Context) -> Result<Filter, FilterError> {
        let mut filter = Filter::new(R::TABLE)?;
        filter.scope(&context.scope())?;
        if let Some(column) = R::SOFT_DELETE_COLUMN {
            filter.where_null(column)?;
        }
        Ok(filter)
    }

    fn by_id(id: i64, context: &R::Context) -> Result<Filter, FilterError> {
        let mut filter = Self::scoped(context)?;
        filter.where_eq("id", json!(id))?;
        Ok(filter)
    }
}

/// Position one past the last live row of the scope, as an INSERT value.
fn next_position_sql(table: &str, position: &str, siblings: &Filter, start: usize) -> Result<SqlResult, FilterError> {
    let w = siblings.to_where_sql_at(start)?;
    Ok(SqlResult {
        query: format!(
            "(SELECT COALESCE(MAX(\"{}\") + 1, 0) FROM \"{}\" WHERE {})",
            position, table, w.query
        ),
        params: w.params,
    })
}

fn soft_delete_sql(table: &str, column: &str, target: &Filter) -> Result<SqlResult, FilterError> {
    let w = target.to_where_sql()?;
    Ok(SqlResult {
        query: format!(
            "UPDATE \"{}\" SET \"{}\" = NOW() WHERE {} RETURNING \"{}\"",
            table, column, w.query, column
        ),
        params: w.params,
    })
}

/// Dense positions from the order's indexes. `$1` is the id array; scope
/// parameters follow.
fn reorder_sql(table: &str, position: &str, scoped: &Filter, order: &[i64]) -> Result<SqlResult, FilterError> {
    let w = scoped.to_where_sql_at(1)?;
    let query = format!(
        "UPDATE \"{t}\" SET \"{p}\" = o.ordinal - 1 \
         FROM UNNEST($1::bigint[]) WITH ORDINALITY AS o(row_id, ordinal) \
         WHERE \"{t}\".\"id\" = o.row_id AND {w}",
        t = table,
        p = position,
        w = w.query
    );
    let mut params = vec![Value::from(order.to_vec())];
    params.extend(w.params);
    Ok(SqlResult { query, params })
}

fn is_unique_violation(err: &DatabaseError) -> bool {
    match err {
        DatabaseError::Sqlx(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    }
}

#[async_trait]
impl<R: TableRow> ListRows<R, R::Context> for PgTable<R> {
    async fn list(&self, request: &ListRequest<R::Context>, _caller: &Caller) -> anyhow::Result<ListResponse<R>> {
        let mut filter = Self::scoped(&request.context)?;
        let row_count = QueryBuilder::<R>::new(filter.clone()).count(&self.pool).await?;

        let (field, direction) = request.effective_sort(R::DEFAULT_SORT);
        filter.order(field, direction)?;
        filter.order("id", SortDirection::Asc)?;
        if let Some(pagination) = request.pagination {
            filter.limit(pagination.page_size as u64, Some(pagination.offset()));
        }

        let rows = QueryBuilder::<R>::new(filter).select_all(&self.pool).await?;
        Ok(DataTableResponse::Success(ListPayload {
            row_count: row_count.max(0) as u64,
            rows,
        }))
    }
}

#[async_trait]
impl<R: TableRow> GetRow<R, R::Context> for PgTable<R> {
    async fn get(&self, request: &GetRequest<R::Context>, _caller: &Caller) -> anyhow::Result<RowResponse<R>> {
        let filter = Self::by_id(request.id, &request.context)?;
        match QueryBuilder::<R>::new(filter).select_optional(&self.pool).await? {
            Some(row) => Ok(DataTableResponse::Success(RowPayload { row })),
            None => Ok(DataTableResponse::failure(NOT_FOUND)),
        }
    }
}

#[async_trait]
impl<R: TableRow> CreateRow<R, R::Context> for PgTable<R> {
    async fn create(&self, request: &CreateRequest<R::Create, R::Context>, _caller: &Caller) -> anyhow::Result<RowResponse<R>> {
        let mut values = R::insert_values(&request.row)?;
        values.extend(request.context.scope());
        values.remove("id");

        let mut insert = Insert::new(R::TABLE)?;
        if let Some(position) = R::POSITION_COLUMN {
            values.remove(position);
            insert.values(&values)?;

            let siblings = Self::scoped(&request.context)?;
            insert.expression(position, |start| next_position_sql(R::TABLE, position, &siblings, start))?;
        } else {
            insert.values(&values)?;
        }

        match insert.fetch_one::<R, _>(&self.pool).await {
            Ok(row) => Ok(DataTableResponse::Success(RowPayload { row })),
            Err(e) if is_unique_violation(&e) => Ok(DataTableResponse::failure(DUPLICATE_ROW)),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<R: TableRow> UpdateRow<R, R::Context> for PgTable<R> {
    async fn update(&self, request: &UpdateRequest<R::Update, R::Context>, _caller: &Caller) -> anyhow::Result<UpdateResponse> {
        let values = R::update_values(&request.row)?;
        let filter = Self::by_id(request.id, &request.context)?;

        match QueryBuilder::<R>::new(filter).update_returning(&self.pool, &values).await {
            Ok(Some(_)) => Ok(DataTableResponse::Success(Acknowledged {})),
            Ok(None) => Ok(DataTableResponse::failure(NOT_FOUND)),
            Err(e) if is_unique_violation(&e) => Ok(DataTableResponse::failure(DUPLICATE_ROW)),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<R: TableRow> DeleteRow<R, R::Context> for PgTable<R> {
    async fn delete(&self, request: &DeleteRequest<R::Context>, _caller: &Caller) -> anyhow::Result<DeleteResponse> {
        let filter = Self::by_id(request.id, &request.context)?;

        let Some(column) = R::SOFT_DELETE_COLUMN else {
            let removed = QueryBuilder::<R>::new(filter).delete(&self.pool).await?;
            return Ok(if removed == 0 {
                DataTableResponse::failure(NOT_FOUND)
            } else {
                DataTableResponse::Success(DeletePayload::default())
            });
        };

        let sql = soft_delete_sql(R::TABLE, column, &filter)?;
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query(q, p);
        }

        match timed(&sql.query, q.fetch_optional(&self.pool)).await? {
            Some(row) => {
                let deleted_at: DateTime<Utc> = row.try_get(column)?;
                let mut replacement = Map::new();
                replacement.insert(column.to_string(), json!(deleted_at));
                Ok(DataTableResponse::Success(DeletePayload {
                    replacement: Some(replacement),
                }))
            }
            None => Ok(DataTableResponse::failure(NOT_FOUND)),
        }
    }
}

#[async_trait]
impl<R: TableRow> ReorderRows<R, R::Context> for PgTable<R> {
    async fn reorder(&self, request: &ReorderRequest<R::Context>, _caller: &Caller) -> anyhow::Result<ReorderResponse> {
        let Some(position) = R::POSITION_COLUMN else {
            return Ok(DataTableResponse::failure(NOT_REORDERABLE));
        };

        let scoped = Self::scoped(&request.context)?;
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let total = QueryBuilder::<R>::new(scoped.clone()).count(&mut *tx).await?;
        if total != request.order.len() as i64 {
            return Ok(DataTableResponse::failure(incomplete_order(total)));
        }

        let sql = reorder_sql(R::TABLE, position, &scoped, &request.order)?;
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query(q, p);
        }

        let done = timed(&sql.query, q.execute(&mut *tx)).await?;
        if done.rows_affected() != request.order.len() as u64 {
            // Dropping the transaction rolls it back
            return Ok(DataTableResponse::failure(incomplete_order(total)));
        }
        tx.commit().await.map_err(DatabaseError::from)?;

        Ok(DataTableResponse::Success(ReorderPayload {
            order: request.order.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Staff, StaffScope};

    fn team_scope() -> Filter {
        PgTable::<Staff>::scoped(&StaffScope { team_id: 7 }).unwrap()
    }

    #[test]
    fn reorder_binds_ids_before_scope() {
        let sql = reorder_sql("staff", "position", &team_scope(), &[3, 1, 2]).unwrap();
        assert_eq!(
            sql.query,
            "UPDATE \"staff\" SET \"position\" = o.ordinal - 1 \
             FROM UNNEST($1::bigint[]) WITH ORDINALITY AS o(row_id, ordinal) \
             WHERE \"staff\".\"id\" = o.row_id AND \"team_id\" = $2 AND \"deleted_at\" IS NULL"
        );
        assert_eq!(sql.params, vec![json!([3, 1, 2]), json!(7)]);
    }

    #[test]
    fn soft_delete_stamps_only_live_scoped_row() {
        let target = PgTable::<Staff>::by_id(5, &StaffScope { team_id: 7 }).unwrap();
        let sql = soft_delete_sql("staff", "deleted_at", &target).unwrap();
        assert_eq!(
            sql.query,
            "UPDATE \"staff\" SET \"deleted_at\" = NOW() \
             WHERE \"team_id\" = $1 AND \"deleted_at\" IS NULL AND \"id\" = $2 RETURNING \"deleted_at\""
        );
        assert_eq!(sql.params, vec![json!(7), json!(5)]);
    }

    #[test]
    fn appended_position_continues_placeholders() {
        let sql = next_position_sql("staff", "position", &team_scope(), 2).unwrap();
        assert_eq!(
            sql.query,
            "(SELECT COALESCE(MAX(\"position\") + 1, 0) FROM \"staff\" \
             WHERE \"team_id\" = $3 AND \"deleted_at\" IS NULL)"
        );
        assert_eq!(sql.params, vec![json!(7)]);
    }

    #[test]
    fn only_database_unique_errors_count_as_duplicates() {
        assert!(!is_unique_violation(&DatabaseError::QueryError("syntax".into())));
        assert!(!is_unique_violation(&DatabaseError::Sqlx(sqlx::Error::RowNotFound)));
    }
}
