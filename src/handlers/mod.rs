//! Endpoint families mounted under the admin prefix.

use axum::Router;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::database::{AuditLog, TableFactory};
use crate::datatable::{Context, DataTableApi, RowModel};

pub mod content_pages;
pub mod outbox_messages;
pub mod program_locations;
pub mod shift_categories;

/// Scope of families that belong to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub event_id: i64,
}

impl Context for EventContext {
    const FIELDS: &'static [&'static str] = &["event_id"];
}

/// Every family's routes, relative to the admin prefix.
pub fn admin_routes<F: TableFactory>(tables: &F, audit: &AuditLog) -> Router {
    Router::new()
        .merge(content_pages::api(tables, audit).routes(content_pages::PATH))
        .merge(shift_categories::api(tables, audit).routes(shift_categories::PATH))
        .merge(program_locations::api(tables, audit).routes(program_locations::PATH))
        .merge(outbox_messages::api(tables, audit).routes(outbox_messages::PATH))
}

/// Apply the shared page sizes, audit delivery and audit hook.
fn configure<R: RowModel, C: Context>(api: DataTableApi<R, C>, audit: &AuditLog) -> DataTableApi<R, C> {
    let settings = &config::config().datatable;
    let api = api
        .page_sizes(&settings.page_sizes)
        .log_delivery(settings.audit_delivery);

    match audit.hook::<R, C>(api.family()) {
        Some(log) => api.with_write_log(log),
        None => api,
    }
}

#[cfg(test)]
pub(crate) fn assert_fields_match<R: RowModel>(sample: &R) {
    let value = serde_json::to_value(sample).unwrap();
    let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
    let mut fields = R::FIELDS.to_vec();
    keys.sort_unstable();
    fields.sort_unstable();
    assert_eq!(keys, fields);
}
