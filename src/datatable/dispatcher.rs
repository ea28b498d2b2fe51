use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::DataTableError;
use super::operations::{AccessCheck, CreateRow, DeleteRow, GetRow, ListRows, ReorderRows, TableBackend, UpdateRow, WriteLog};
use super::schema::{self, ListRequestSchema, DEFAULT_PAGE_SIZES};
use super::types::{
    Action, Caller, Context, CreateRequest, DataTableRequest, DataTableResponse, DeleteRequest, DeleteResponse,
    GetRequest, ListResponse, Mutation, NoContext, ReorderRequest, ReorderResponse, RowModel, RowResponse,
    UpdateRequest, UpdateResponse,
};

/// How the audit hook runs relative to the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDelivery {
    /// Spawned onto the runtime; the response never waits for it.
    #[default]
    Detached,
    /// Awaited before returning; failures are still swallowed.
    Inline,
}

/// Generic list/get/create/update/delete/reorder endpoint for one row model.
///
/// Each verb runs the same pipeline: handler presence, request validation,
/// access check, handler, and for successful mutations the audit hook.
/// The dispatcher holds no row state; handlers own persistence.
pub struct DataTableApi<R: RowModel, C: Context = NoContext> {
    family: &'static str,
    schema: ListRequestSchema,
    log_delivery: LogDelivery,
    access_check: Option<Arc<dyn AccessCheck<R, C>>>,
    list: Option<Arc<dyn ListRows<R, C>>>,
    get: Option<Arc<dyn GetRow<R, C>>>,
    create: Option<Arc<dyn CreateRow<R, C>>>,
    update: Option<Arc<dyn UpdateRow<R, C>>>,
    delete: Option<Arc<dyn DeleteRow<R, C>>>,
    reorder: Option<Arc<dyn ReorderRows<R, C>>>,
    write_log: Option<Arc<dyn WriteLog<R, C>>>,
}

impl<R: RowModel, C: Context> DataTableApi<R, C> {
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            schema: ListRequestSchema::for_row::<R>(DEFAULT_PAGE_SIZES),
            log_delivery: LogDelivery::default(),
            access_check: None,
            list: None,
            get: None,
            create: None,
            update: None,
            delete: None,
            reorder: None,
            write_log: None,
        }
    }

    pub fn page_sizes(mut self, page_sizes: &[u32]) -> Self {
        self.schema = ListRequestSchema::for_row::<R>(page_sizes);
        self
    }

    pub fn log_delivery(mut self, delivery: LogDelivery) -> Self {
        self.log_delivery = delivery;
        self
    }

    pub fn with_access_check(mut self, check: Arc<dyn AccessCheck<R, C>>) -> Self {
        self.access_check = Some(check);
        self
    }

    pub fn with_list(mut self, handler: Arc<dyn ListRows<R, C>>) -> Self {
        self.list = Some(handler);
        self
    }

    pub fn with_get(mut self, handler: Arc<dyn GetRow<R, C>>) -> Self {
        self.get = Some(handler);
        self
    }

    pub fn with_create(mut self, handler: Arc<dyn CreateRow<R, C>>) -> Self {
        self.create = Some(handler);
        self
    }

    pub fn with_update(mut self, handler: Arc<dyn UpdateRow<R, C>>) -> Self {
        self.update = Some(handler);
        self
    }

    pub fn with_delete(mut self, handler: Arc<dyn DeleteRow<R, C>>) -> Self {
        self.delete = Some(handler);
        self
    }

    pub fn with_reorder(mut self, handler: Arc<dyn ReorderRows<R, C>>) -> Self {
        self.reorder = Some(handler);
        self
    }

    /// Register one backend for every operation.
    pub fn with_backend<B: TableBackend<R, C> + 'static>(self, backend: Arc<B>) -> Self {
        self.with_list(backend.clone())
            .with_get(backend.clone())
            .with_create(backend.clone())
            .with_update(backend.clone())
            .with_delete(backend.clone())
            .with_reorder(backend)
    }

    pub fn with_write_log(mut self, log: Arc<dyn WriteLog<R, C>>) -> Self {
        self.write_log = Some(log);
        self
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn supports(&self, action: Action) -> bool {
        match action {
            Action::List => self.list.is_some(),
            Action::Get => self.get.is_some(),
            Action::Create => self.create.is_some(),
            Action::Update => self.update.is_some(),
            Action::Delete => self.delete.is_some(),
            Action::Reorder => self.reorder.is_some(),
        }
    }

    pub async fn list(&self, query: &HashMap<String, String>, caller: &Caller) -> Result<ListResponse<R>, DataTableError> {
        let handler = self.require(&self.list, Action::List)?;
        let request = self.schema.parse::<C>(query)?;
        self.authorize(Action::List, caller, || DataTableRequest::List(request.clone())).await?;

        let response = handler
            .list(&request, caller)
            .await
            .map_err(|source| self.unexpected(Action::List, source))?;

        if let DataTableResponse::Success(payload) = &response {
            if payload.rows.len() as u64 > payload.row_count {
                tracing::warn!(
                    "{}: list returned {} rows but reported rowCount {}",
                    self.family,
                    payload.rows.len(),
                    payload.row_count
                );
            }
        }
        Ok(response)
    }

    pub async fn get(&self, id: &str, query: &HashMap<String, String>, caller: &Caller) -> Result<RowResponse<R>, DataTableError> {
        let handler = self.require(&self.get, Action::Get)?;
        let request = GetRequest {
            id: schema::parse_id(id)?,
            context: schema::parse_context::<C>(query)?,
        };
        self.authorize(Action::Get, caller, || DataTableRequest::Get(request.clone())).await?;

        handler
            .get(&request, caller)
            .await
            .map_err(|source| self.unexpected(Action::Get, source))
    }

    pub async fn create(&self, query: &HashMap<String, String>, body: &[u8], caller: &Caller) -> Result<RowResponse<R>, DataTableError> {
        let handler = self.require(&self.create, Action::Create)?;
        let request = CreateRequest {
            row: schema::parse_row::<R::Create>(body)?,
            context: schema::parse_context::<C>(query)?,
        };
        self.authorize(Action::Create, caller, || DataTableRequest::Create(request.clone())).await?;

        let response = handler
            .create(&request, caller)
            .await
            .map_err(|source| self.unexpected(Action::Create, source))?;

        if let DataTableResponse::Success(payload) = &response {
            tracing::info!("{}: created row {}", self.family, payload.row.id());
            self.record(DataTableRequest::Create(request), Mutation::Created, caller).await;
        }
        Ok(response)
    }

    pub async fn update(
        &self,
        id: &str,
        query: &HashMap<String, String>,
        body: &[u8],
        caller: &Caller,
    ) -> Result<UpdateResponse, DataTableError> {
        let handler = self.require(&self.update, Action::Update)?;
        let request = UpdateRequest {
            id: schema::parse_id(id)?,
            row: schema::parse_update::<R::Update>(body)?,
            context: schema::parse_context::<C>(query)?,
        };
        self.authorize(Action::Update, caller, || DataTableRequest::Update(request.clone())).await?;

        let response = handler
            .update(&request, caller)
            .await
            .map_err(|source| self.unexpected(Action::Update, source))?;

        if response.is_success() {
            tracing::info!("{}: updated row {}", self.family, request.id);
            self.record(DataTableRequest::Update(request), Mutation::Updated, caller).await;
        }
        Ok(response)
    }

    pub async fn delete(&self, id: &str, query: &HashMap<String, String>, caller: &Caller) -> Result<DeleteResponse, DataTableError> {
        let handler = self.require(&self.delete, Action::Delete)?;
        let request = DeleteRequest {
            id: schema::parse_id(id)?,
            context: schema::parse_context::<C>(query)?,
        };
        self.authorize(Action::Delete, caller, || DataTableRequest::Delete(request.clone())).await?;

        let response = handler
            .delete(&request, caller)
            .await
            .map_err(|source| self.unexpected(Action::Delete, source))?;

        if response.is_success() {
            tracing::info!("{}: deleted row {}", self.family, request.id);
            self.record(DataTableRequest::Delete(request), Mutation::Deleted, caller).await;
        }
        Ok(response)
    }

    pub async fn reorder(&self, query: &HashMap<String, String>, body: &[u8], caller: &Caller) -> Result<ReorderResponse, DataTableError> {
        let handler = self.require(&self.reorder, Action::Reorder)?;
        let request = ReorderRequest {
            order: schema::parse_order(body)?,
            context: schema::parse_context::<C>(query)?,
        };
        self.authorize(Action::Reorder, caller, || DataTableRequest::Reorder(request.clone())).await?;

        let response = handler
            .reorder(&request, caller)
            .await
            .map_err(|source| self.unexpected(Action::Reorder, source))?;

        if response.is_success() {
            tracing::info!("{}: reordered {} rows", self.family, request.order.len());
            self.record(DataTableRequest::Reorder(request), Mutation::Reordered, caller).await;
        }
        Ok(response)
    }

    fn require<'a, T: ?Sized>(&self, slot: &'a Option<Arc<T>>, action: Action) -> Result<&'a Arc<T>, DataTableError> {
        slot.as_ref().ok_or_else(|| {
            tracing::error!("{}: {} requested but no handler is configured", self.family, action);
            DataTableError::NotConfigured { family: self.family, action }
        })
    }

    async fn authorize<F>(&self, action: Action, caller: &Caller, request: F) -> Result<(), DataTableError>
    where
        F: FnOnce() -> DataTableRequest<R, C>,
    {
        let Some(check) = &self.access_check else {
            return Ok(());
        };
        let request = request();
        check.check(&request, action, caller).await.map_err(|denied| {
            tracing::warn!(
                "{}: {} denied for user {:?}: {}",
                self.family,
                action,
                caller.user_id(),
                denied
            );
            DataTableError::Forbidden(denied)
        })
    }

    fn unexpected(&self, action: Action, source: anyhow::Error) -> DataTableError {
        tracing::error!("{}: {} handler failed: {:#}", self.family, action, source);
        DataTableError::Handler { action, source }
    }

    async fn record(&self, request: DataTableRequest<R, C>, mutation: Mutation, caller: &Caller) {
        let Some(log) = &self.write_log else {
            return;
        };
        let family = self.family;

        match self.log_delivery {
            LogDelivery::Inline => {
                if let Err(e) = log.write_log(&request, mutation, caller).await {
                    tracing::warn!("{}: audit log for {} failed: {:#}", family, mutation.as_str(), e);
                }
            }
            LogDelivery::Detached => {
                let log = Arc::clone(log);
                let caller = caller.clone();
                tokio::spawn(async move {
                    if let Err(e) = log.write_log(&request, mutation, &caller).await {
                        tracing::warn!("{}: audit log for {} failed: {:#}", family, mutation.as_str(), e);
                    }
                });
            }
        }
    }
}
