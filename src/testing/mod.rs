//! Fixtures shared by unit tests: small row models and spy collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::TableRow;
use crate::datatable::{
    Acknowledged, AccessCheck, AccessDenied, Action, Caller, Context, CreateRequest, CreateRow, DataTableRequest,
    DataTableResponse, DeletePayload, DeleteRequest, DeleteResponse, DeleteRow, GetRequest, GetRow, ListPayload,
    ListRequest, ListResponse, ListRows, Mutation, NoContext, ReorderPayload, ReorderRequest, ReorderResponse,
    ReorderRows, RowModel, RowPayload, RowResponse, UpdateRequest, UpdateResponse, UpdateRow, WriteLog,
};

pub fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Team roster entry: scoped, ordered, soft-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Staff {
    pub id: i64,
    pub team_id: i64,
    pub name: String,
    pub position: i32,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Staff {
    pub fn new(id: i64, team_id: i64, name: &str, position: i32) -> Self {
        Self {
            id,
            team_id,
            name: name.to_string(),
            position,
            deleted_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffInput {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffScope {
    pub team_id: i64,
}

impl Context for StaffScope {
    const FIELDS: &'static [&'static str] = &["team_id"];
}

impl RowModel for Staff {
    type Create = StaffInput;
    type Update = StaffPatch;
    const FIELDS: &'static [&'static str] = &["id", "team_id", "name", "position", "deleted_at"];

    fn id(&self) -> i64 {
        self.id
    }
}

impl TableRow for Staff {
    type Context = StaffScope;
    const TABLE: &'static str = "staff";
    const DEFAULT_SORT: (&'static str, crate::datatable::SortDirection) =
        ("position", crate::datatable::SortDirection::Asc);
    const POSITION_COLUMN: Option<&'static str> = Some("position");
    const SOFT_DELETE_COLUMN: Option<&'static str> = Some("deleted_at");
}

/// Unscoped, hard-deleted row with a unique title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteInput {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl RowModel for Note {
    type Create = NoteInput;
    type Update = NotePatch;
    const FIELDS: &'static [&'static str] = &["id", "title"];

    fn id(&self) -> i64 {
        self.id
    }
}

impl TableRow for Note {
    type Context = NoContext;
    const TABLE: &'static str = "notes";
    const UNIQUE_COLUMNS: &'static [&'static str] = &["title"];
}

enum SpyMode {
    Succeed,
    Fail(String),
    Error,
}

/// Handler and access check that count calls and answer with fixed data.
pub struct Spy {
    mode: SpyMode,
    pub access_checks: AtomicUsize,
    pub handler_calls: AtomicUsize,
    pub checked_actions: Mutex<Vec<Action>>,
}

impl Default for Spy {
    fn default() -> Self {
        Self::with_mode(SpyMode::Succeed)
    }
}

impl Spy {
    fn with_mode(mode: SpyMode) -> Self {
        Self {
            mode,
            access_checks: AtomicUsize::new(0),
            handler_calls: AtomicUsize::new(0),
            checked_actions: Mutex::new(vec![]),
        }
    }

    /// Every handler reports `success: false` with `error`.
    pub fn failing(error: &str) -> Self {
        Self::with_mode(SpyMode::Fail(error.to_string()))
    }

    /// Every handler returns `Err`.
    pub fn erroring() -> Self {
        Self::with_mode(SpyMode::Error)
    }

    fn respond<T>(&self, payload: T) -> anyhow::Result<DataTableResponse<T>> {
        self.handler_calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            SpyMode::Succeed => Ok(DataTableResponse::Success(payload)),
            SpyMode::Fail(error) => Ok(DataTableResponse::failure(error.clone())),
            SpyMode::Error => Err(anyhow::anyhow!("spy handler exploded")),
        }
    }
}

#[async_trait]
impl AccessCheck<Staff, StaffScope> for Spy {
    async fn check(&self, request: &DataTableRequest<Staff, StaffScope>, action: Action, _caller: &Caller) -> Result<(), AccessDenied> {
        assert_eq!(request.action(), action);
        self.access_checks.fetch_add(1, Ordering::SeqCst);
        self.checked_actions.lock().unwrap().push(action);
        Ok(())
    }
}

#[async_trait]
impl ListRows<Staff, StaffScope> for Spy {
    async fn list(&self, _request: &ListRequest<StaffScope>, _caller: &Caller) -> anyhow::Result<ListResponse<Staff>> {
        self.respond(ListPayload {
            row_count: 1,
            rows: vec![Staff::new(1, 7, "Ada", 0)],
        })
    }
}

#[async_trait]
impl GetRow<Staff, StaffScope> for Spy {
    async fn get(&self, request: &GetRequest<StaffScope>, _caller: &Caller) -> anyhow::Result<RowResponse<Staff>> {
        self.respond(RowPayload {
            row: Staff::new(request.id, request.context.team_id, "Ada", 0),
        })
    }
}

#[async_trait]
impl CreateRow<Staff, StaffScope> for Spy {
    async fn create(&self, request: &CreateRequest<StaffInput, StaffScope>, _caller: &Caller) -> anyhow::Result<RowResponse<Staff>> {
        self.respond(RowPayload {
            row: Staff::new(1, request.context.team_id, &request.row.name, 0),
        })
    }
}

#[async_trait]
impl UpdateRow<Staff, StaffScope> for Spy {
    async fn update(&self, _request: &UpdateRequest<StaffPatch, StaffScope>, _caller: &Caller) -> anyhow::Result<UpdateResponse> {
        self.respond(Acknowledged {})
    }
}

#[async_trait]
impl DeleteRow<Staff, StaffScope> for Spy {
    async fn delete(&self, _request: &DeleteRequest<StaffScope>, _caller: &Caller) -> anyhow::Result<DeleteResponse> {
        self.respond(DeletePayload::default())
    }
}

#[async_trait]
impl ReorderRows<Staff, StaffScope> for Spy {
    async fn reorder(&self, request: &ReorderRequest<StaffScope>, _caller: &Caller) -> anyhow::Result<ReorderResponse> {
        self.respond(ReorderPayload {
            order: request.order.clone(),
        })
    }
}

pub struct DenyAll;

#[async_trait]
impl<R: RowModel, C: Context> AccessCheck<R, C> for DenyAll {
    async fn check(&self, _request: &DataTableRequest<R, C>, _action: Action, _caller: &Caller) -> Result<(), AccessDenied> {
        Err(AccessDenied::new("denied"))
    }
}

/// Audit hook remembering each mutation kind and the addressed row id.
#[derive(Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<(Mutation, Option<i64>)>>,
}

impl RecordingLog {
    pub fn entries(&self) -> Vec<(Mutation, Option<i64>)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl<R: RowModel, C: Context> WriteLog<R, C> for RecordingLog {
    async fn write_log(&self, request: &DataTableRequest<R, C>, mutation: Mutation, _caller: &Caller) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push((mutation, request.row_id()));
        Ok(())
    }
}

pub struct FailingLog;

#[async_trait]
impl<R: RowModel, C: Context> WriteLog<R, C> for FailingLog {
    async fn write_log(&self, _request: &DataTableRequest<R, C>, _mutation: Mutation, _caller: &Caller) -> anyhow::Result<()> {
        anyhow::bail!("audit store offline")
    }
}
