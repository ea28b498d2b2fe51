use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Extension, Path, Query, State},
    routing::get,
    Router,
};

use super::dispatcher::DataTableApi;
use super::error::DataTableError;
use super::types::{Caller, Context, ListPayload, RowModel, RowPayload};
use super::types::{Acknowledged, DeletePayload, ReorderPayload};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

type SharedApi<R, C> = State<Arc<DataTableApi<R, C>>>;
type QueryParams = Result<Query<HashMap<String, String>>, QueryRejection>;

impl<R: RowModel, C: Context> DataTableApi<R, C> {
    /// Mount the family at `path`:
    ///
    /// - `GET path` list, `POST path` create, `PUT path` reorder
    /// - `GET path/:id` get, `PUT path/:id` update, `DELETE path/:id` delete
    ///
    /// Every verb is routed whether or not a handler is configured.
    pub fn routes<S>(self, path: &str) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        tracing::debug!("Mounting data table '{}' at {}", self.family(), path);

        let api = Arc::new(self);
        Router::new()
            .route(path, get(list::<R, C>).post(create::<R, C>).put(reorder::<R, C>))
            .route(
                &format!("{}/:id", path.trim_end_matches('/')),
                get(get_row::<R, C>).put(update::<R, C>).delete(delete::<R, C>),
            )
            .with_state(api)
    }
}

/// Malformed query strings get the same JSON envelope as other 400s.
fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    match query {
        Ok(Query(params)) => Ok(params),
        Err(rejection) => Err(DataTableError::validation(format!("Invalid query string: {}", rejection.body_text())).into()),
    }
}

fn caller(user: Option<Extension<AuthUser>>) -> Caller {
    match user {
        Some(Extension(user)) => Caller::authenticated(user),
        None => Caller::anonymous(),
    }
}

async fn list<R: RowModel, C: Context>(
    State(api): SharedApi<R, C>,
    query: QueryParams,
    user: Option<Extension<AuthUser>>,
) -> ApiResult<ListPayload<R>> {
    let query = query_params(query)?;
    let response = api.list(&query, &caller(user)).await?;
    Ok(ApiResponse::success(response))
}

async fn get_row<R: RowModel, C: Context>(
    State(api): SharedApi<R, C>,
    Path(id): Path<String>,
    query: QueryParams,
    user: Option<Extension<AuthUser>>,
) -> ApiResult<RowPayload<R>> {
    let query = query_params(query)?;
    let response = api.get(&id, &query, &caller(user)).await?;
    Ok(ApiResponse::success(response))
}

async fn create<R: RowModel, C: Context>(
    State(api): SharedApi<R, C>,
    query: QueryParams,
    user: Option<Extension<AuthUser>>,
    body: Bytes,
) -> ApiResult<RowPayload<R>> {
    let query = query_params(query)?;
    let response = api.create(&query, &body, &caller(user)).await?;
    Ok(ApiResponse::created(response))
}

async fn update<R: RowModel, C: Context>(
    State(api): SharedApi<R, C>,
    Path(id): Path<String>,
    query: QueryParams,
    user: Option<Extension<AuthUser>>,
    body: Bytes,
) -> ApiResult<Acknowledged> {
    let query = query_params(query)?;
    let response = api.update(&id, &query, &body, &caller(user)).await?;
    Ok(ApiResponse::success(response))
}

async fn delete<R: RowModel, C: Context>(
    State(api): SharedApi<R, C>,
    Path(id): Path<String>,
    query: QueryParams,
    user: Option<Extension<AuthUser>>,
) -> ApiResult<DeletePayload> {
    let query = query_params(query)?;
    let response = api.delete(&id, &query, &caller(user)).await?;
    Ok(ApiResponse::success(response))
}

async fn reorder<R: RowModel, C: Context>(
    State(api): SharedApi<R, C>,
    query: QueryParams,
    user: Option<Extension<AuthUser>>,
    body: Bytes,
) -> ApiResult<ReorderPayload> {
    let query = query_params(query)?;
    let response = api.reorder(&query, &body, &caller(user)).await?;
    Ok(ApiResponse::success(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;

    #[test]
    fn rejected_query_becomes_validation_error() {
        let uri: Uri = "/shift-categories?event_id=abc".parse().unwrap();
        let rejected = Query::<HashMap<String, i64>>::try_from_uri(&uri);
        assert!(rejected.is_err());

        let err = query_params(rejected).unwrap_err();
        assert_eq!(err.status_code(), 400);
        let body = err.to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["error"].as_str().unwrap().starts_with("Invalid query string"));
    }

    #[test]
    fn parsed_query_passes_through() {
        let uri: Uri = "/shift-categories?event_id=4&sort.field=name".parse().unwrap();
        let params = query_params(Query::<HashMap<String, String>>::try_from_uri(&uri)).unwrap();
        assert_eq!(params.get("event_id").map(String::as_str), Some("4"));
        assert_eq!(params.get("sort.field").map(String::as_str), Some("name"));
    }
}
