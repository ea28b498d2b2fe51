use std::future::Future;
use std::marker::PhantomData;
use std::time::Instant;

use serde_json::{Map, Value};
use sqlx::{postgres::PgArguments, postgres::PgRow, Executor, FromRow, Postgres, Row};

use crate::config;
use crate::database::manager::DatabaseError;
use crate::filter::error::validate_identifier;
use crate::filter::{Filter, FilterError, SqlResult};

/// Typed execution of a `Filter` against Postgres.
pub struct QueryBuilder<T> {
    filter: Filter,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> QueryBuilder<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            _phantom: PhantomData,
        }
    }

    pub async fn select_all<'e, E>(&self, executor: E) -> Result<Vec<T>, DatabaseError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql_result = self.filter.to_sql()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        timed(&sql_result.query, q.fetch_all(executor)).await
    }

    pub async fn select_optional<'e, E>(&self, executor: E) -> Result<Option<T>, DatabaseError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql_result = self.filter.to_sql()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        timed(&sql_result.query, q.fetch_optional(executor)).await
    }

    pub async fn count<'e, E>(&self, executor: E) -> Result<i64, DatabaseError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql_result = self.filter.to_count_sql()?;
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, p);
        }
        let row = timed(&sql_result.query, q.fetch_one(executor)).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    /// Update every matching row; `None` when nothing matched.
    pub async fn update_returning<'e, E>(&self, executor: E, assignments: &Map<String, Value>) -> Result<Option<T>, DatabaseError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql_result = self.filter.to_update_sql(assignments)?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        timed(&sql_result.query, q.fetch_optional(executor)).await
    }

    pub async fn delete<'e, E>(&self, executor: E) -> Result<u64, DatabaseError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql_result = self.filter.to_delete_sql()?;
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, p);
        }
        let done = timed(&sql_result.query, q.execute(executor)).await?;
        Ok(done.rows_affected())
    }
}

/// `INSERT ... RETURNING *` with bound values and optional SQL expressions.
pub struct Insert {
    table_name: String,
    columns: Vec<String>,
    values: Vec<String>,
    params: Vec<Value>,
}

impl Insert {
    pub fn new(table_name: &str) -> Result<Self, FilterError> {
        if !validate_identifier(table_name) {
            return Err(FilterError::InvalidTableName(table_name.to_string()));
        }
        Ok(Self {
            table_name: table_name.to_string(),
            columns: vec![],
            values: vec![],
            params: vec![],
        })
    }

    pub fn value(&mut self, column: &str, value: Value) -> Result<&mut Self, FilterError> {
        self.push_column(column)?;
        self.params.push(value);
        self.values.push(format!("${}", self.params.len()));
        Ok(self)
    }

    pub fn values(&mut self, values: &Map<String, Value>) -> Result<&mut Self, FilterError> {
        for (column, value) in values {
            self.value(column, value.clone())?;
        }
        Ok(self)
    }

    /// Column computed by SQL. `build` receives the last used placeholder
    /// index and returns the expression plus its own parameters.
    pub fn expression<F>(&mut self, column: &str, build: F) -> Result<&mut Self, FilterError>
    where
        F: FnOnce(usize) -> Result<SqlResult, FilterError>,
    {
        self.push_column(column)?;
        let SqlResult { query, params } = build(self.params.len())?;
        self.params.extend(params);
        self.values.push(query);
        Ok(self)
    }

    pub fn to_sql(&self) -> SqlResult {
        let columns: Vec<String> = self.columns.iter().map(|c| format!("\"{}\"", c)).collect();
        let query = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *",
            self.table_name,
            columns.join(", "),
            self.values.join(", ")
        );
        SqlResult {
            query,
            params: self.params.clone(),
        }
    }

    pub async fn fetch_one<'e, T, E>(&self, executor: E) -> Result<T, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        E: Executor<'e, Database = Postgres>,
    {
        let sql_result = self.to_sql();
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        timed(&sql_result.query, q.fetch_one(executor)).await
    }

    fn push_column(&mut self, column: &str) -> Result<(), FilterError> {
        if !validate_identifier(column) {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)));
        }
        if self.columns.iter().any(|c| c == column) {
            return Err(FilterError::InvalidColumn(format!("Column {} assigned twice", column)));
        }
        self.columns.push(column.to_string());
        Ok(())
    }
}

/// Run a statement, logging it and warning when it exceeds the configured
/// slow-query threshold.
pub async fn timed<F, O>(query: &str, fut: F) -> Result<O, DatabaseError>
where
    F: Future<Output = Result<O, sqlx::Error>>,
{
    let settings = &config::config().database;
    if settings.enable_query_logging {
        tracing::debug!("SQL: {}", query);
    }

    let started = Instant::now();
    let result = fut.await;
    let elapsed = started.elapsed();

    if settings.enable_slow_query_warning && elapsed.as_millis() as u64 > settings.slow_query_threshold_ms {
        tracing::warn!("Slow query ({} ms): {}", elapsed.as_millis(), query);
    }
    Ok(result?)
}

pub fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        Value::Array(_) => match as_bigint_array(v) {
            Some(ids) => q.bind(ids),
            None => q.bind(v.clone()),
        },
        Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}

pub fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
    v: &'q Value,
) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        Value::Array(_) => match as_bigint_array(v) {
            Some(ids) => q.bind(ids),
            None => q.bind(v.clone()),
        },
        Value::Object(_) => q.bind(v.clone()),
    }
}

/// Integer arrays bind as `bigint[]`; anything else falls back to JSONB.
fn as_bigint_array(v: &Value) -> Option<Vec<i64>> {
    v.as_array()?.iter().map(Value::as_i64).collect()
}
