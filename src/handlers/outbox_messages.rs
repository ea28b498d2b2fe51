//! Outgoing e-mail queue, inspectable but not editable from the admin panel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::RequirePrivilege;
use crate::database::{AuditLog, TableFactory, TableRow};
use crate::datatable::{DataTableApi, NoContext, ReadOnly, RowModel, SortDirection};

pub const FAMILY: &str = "outbox_messages";
pub const PATH: &str = "/outbox-messages";
pub const PRIVILEGE: &str = "outbox.view";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxMessage {
    pub id: i64,
    pub recipient: String,
    pub subject: String,
    /// `pending`, `sent` or `failed`
    pub status: String,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl RowModel for OutboxMessage {
    type Create = ReadOnly;
    type Update = ReadOnly;
    const FIELDS: &'static [&'static str] =
        &["id", "recipient", "subject", "status", "attempts", "created_at", "sent_at"];

    fn id(&self) -> i64 {
        self.id
    }
}

impl TableRow for OutboxMessage {
    type Context = NoContext;
    const TABLE: &'static str = "outbox_messages";
    const DEFAULT_SORT: (&'static str, SortDirection) = ("created_at", SortDirection::Desc);
}

pub fn api<F: TableFactory>(tables: &F, audit: &AuditLog) -> DataTableApi<OutboxMessage> {
    let table = tables.table::<OutboxMessage>();
    let api = DataTableApi::new(FAMILY)
        .with_access_check(Arc::new(RequirePrivilege::any(PRIVILEGE)))
        .with_list(table.clone())
        .with_get(table);
    super::configure(api, audit)
}
