//! Venues and stages of an event programme. Deleted locations are kept
//! (older programme items still point at them) and hidden by `deleted_at`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EventContext;
use crate::auth::RequirePrivilege;
use crate::database::{AuditLog, TableFactory, TableRow};
use crate::datatable::schema::nullable;
use crate::datatable::{DataTableApi, RowModel, SortDirection};

pub const FAMILY: &str = "program_locations";
pub const PATH: &str = "/program-locations";
pub const PRIVILEGE: &str = "program.manage";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProgramLocation {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub address: Option<String>,
    pub position: i32,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramLocationInput {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramLocationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub address: Option<Option<String>>,
}

impl RowModel for ProgramLocation {
    type Create = ProgramLocationInput;
    type Update = ProgramLocationPatch;
    const FIELDS: &'static [&'static str] = &["id", "event_id", "name", "address", "position", "deleted_at"];

    fn id(&self) -> i64 {
        self.id
    }
}

impl TableRow for ProgramLocation {
    type Context = EventContext;
    const TABLE: &'static str = "program_locations";
    const DEFAULT_SORT: (&'static str, SortDirection) = ("position", SortDirection::Asc);
    const POSITION_COLUMN: Option<&'static str> = Some("position");
    const SOFT_DELETE_COLUMN: Option<&'static str> = Some("deleted_at");
}

pub fn api<F: TableFactory>(tables: &F, audit: &AuditLog) -> DataTableApi<ProgramLocation, EventContext> {
    let api = DataTableApi::new(FAMILY)
        .with_access_check(Arc::new(RequirePrivilege::any(PRIVILEGE)))
        .with_backend(tables.table::<ProgramLocation>());
    super::configure(api, audit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_cover_serialized_row() {
        super::super::assert_fields_match(&ProgramLocation {
            id: 1,
            event_id: 2,
            name: "Main stage".into(),
            address: Some("Harbour 4".into()),
            position: 0,
            deleted_at: None,
        });
    }

    #[test]
    fn deletion_marker_cannot_be_patched() {
        assert!(serde_json::from_str::<ProgramLocationPatch>(r#"{"deleted_at": null}"#).is_err());
    }
}
