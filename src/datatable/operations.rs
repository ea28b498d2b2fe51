use async_trait::async_trait;

use super::error::AccessDenied;
use super::types::{
    Action, Caller, Context, CreateRequest, DataTableRequest, DeleteRequest, DeleteResponse, GetRequest, ListRequest,
    ListResponse, Mutation, ReorderRequest, ReorderResponse, RowModel, RowResponse, UpdateRequest, UpdateResponse,
};

// One trait per optional capability. An endpoint family registers whichever
// subset it supports; an `Err` from any of them is an unexpected failure,
// while `DataTableResponse::Failure` is an ordinary outcome.

#[async_trait]
pub trait ListRows<R: RowModel, C: Context>: Send + Sync {
    async fn list(&self, request: &ListRequest<C>, caller: &Caller) -> anyhow::Result<ListResponse<R>>;
}

#[async_trait]
pub trait GetRow<R: RowModel, C: Context>: Send + Sync {
    async fn get(&self, request: &GetRequest<C>, caller: &Caller) -> anyhow::Result<RowResponse<R>>;
}

/// Must return the complete created row, identifier included.
#[async_trait]
pub trait CreateRow<R: RowModel, C: Context>: Send + Sync {
    async fn create(&self, request: &CreateRequest<R::Create, C>, caller: &Caller) -> anyhow::Result<RowResponse<R>>;
}

#[async_trait]
pub trait UpdateRow<R: RowModel, C: Context>: Send + Sync {
    async fn update(&self, request: &UpdateRequest<R::Update, C>, caller: &Caller) -> anyhow::Result<UpdateResponse>;
}

/// Deleting an unknown or already-deleted row reports `success: false`.
#[async_trait]
pub trait DeleteRow<R: RowModel, C: Context>: Send + Sync {
    async fn delete(&self, request: &DeleteRequest<C>, caller: &Caller) -> anyhow::Result<DeleteResponse>;
}

/// Persists a complete ordering as dense zero-based positions.
#[async_trait]
pub trait ReorderRows<R: RowModel, C: Context>: Send + Sync {
    async fn reorder(&self, request: &ReorderRequest<C>, caller: &Caller) -> anyhow::Result<ReorderResponse>;
}

/// Authorization gate, run before every operation.
#[async_trait]
pub trait AccessCheck<R: RowModel, C: Context>: Send + Sync {
    async fn check(&self, request: &DataTableRequest<R, C>, action: Action, caller: &Caller) -> Result<(), AccessDenied>;
}

/// Audit hook, run only after a mutation reported success. Errors are
/// logged and dropped.
#[async_trait]
pub trait WriteLog<R: RowModel, C: Context>: Send + Sync {
    async fn write_log(&self, request: &DataTableRequest<R, C>, mutation: Mutation, caller: &Caller) -> anyhow::Result<()>;
}

/// Every operation at once; implemented by the storage backends.
pub trait TableBackend<R: RowModel, C: Context>:
    ListRows<R, C> + GetRow<R, C> + CreateRow<R, C> + UpdateRow<R, C> + DeleteRow<R, C> + ReorderRows<R, C>
{
}

impl<R, C, T> TableBackend<R, C> for T
where
    R: RowModel,
    C: Context,
    T: ListRows<R, C> + GetRow<R, C> + CreateRow<R, C> + UpdateRow<R, C> + DeleteRow<R, C> + ReorderRows<R, C>,
{
}
