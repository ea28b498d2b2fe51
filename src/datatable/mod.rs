//! Generic tabular CRUD endpoints.
//!
//! A `DataTableApi` binds one row model (and optionally a context type) to a
//! set of operation handlers, an access check and an audit hook, and turns
//! them into six validated, access-controlled operations. `routes` mounts the
//! result on an axum router.

pub mod dispatcher;
pub mod error;
pub mod operations;
pub mod routes;
pub mod schema;
pub mod types;

pub use dispatcher::{DataTableApi, LogDelivery};
pub use error::{AccessDenied, DataTableError};
pub use operations::{AccessCheck, CreateRow, DeleteRow, GetRow, ListRows, ReorderRows, TableBackend, UpdateRow, WriteLog};
pub use schema::{ListRequestSchema, DEFAULT_PAGE_SIZES};
pub use types::{
    Acknowledged, Action, Caller, Context, CreateRequest, DataTableRequest, DataTableResponse, DeletePayload,
    DeleteRequest, DeleteResponse, GetRequest, ListPayload, ListRequest, ListResponse, Mutation, NoContext,
    Pagination, ReadOnly, ReorderPayload, ReorderRequest, ReorderResponse, RowModel, RowPayload, RowResponse, Sort,
    SortDirection, UpdateRequest, UpdateResponse,
};
