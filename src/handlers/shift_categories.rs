//! Kinds of volunteer shift within an event (bar, stage crew, first aid),
//! shown to volunteers in the configured order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::EventContext;
use crate::auth::RequirePrivilege;
use crate::database::{AuditLog, TableFactory, TableRow};
use crate::datatable::schema::nullable;
use crate::datatable::{DataTableApi, RowModel, SortDirection};

pub const FAMILY: &str = "shift_categories";
pub const PATH: &str = "/shift-categories";
pub const PRIVILEGE: &str = "shifts.manage";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShiftCategory {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftCategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShiftCategoryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

impl RowModel for ShiftCategory {
    type Create = ShiftCategoryInput;
    type Update = ShiftCategoryPatch;
    const FIELDS: &'static [&'static str] = &["id", "event_id", "name", "description", "position"];

    fn id(&self) -> i64 {
        self.id
    }
}

impl TableRow for ShiftCategory {
    type Context = EventContext;
    const TABLE: &'static str = "shift_categories";
    const DEFAULT_SORT: (&'static str, SortDirection) = ("position", SortDirection::Asc);
    const POSITION_COLUMN: Option<&'static str> = Some("position");
}

pub fn api<F: TableFactory>(tables: &F, audit: &AuditLog) -> DataTableApi<ShiftCategory, EventContext> {
    let api = DataTableApi::new(FAMILY)
        .with_access_check(Arc::new(RequirePrivilege::any(PRIVILEGE)))
        .with_backend(tables.table::<ShiftCategory>());
    super::configure(api, audit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatable::schema::parse_update;

    #[test]
    fn fields_cover_serialized_row() {
        super::super::assert_fields_match(&ShiftCategory {
            id: 1,
            event_id: 2,
            name: "Bar".into(),
            description: None,
            position: 0,
        });
    }

    #[test]
    fn explicit_null_clears_description() {
        let patch: ShiftCategoryPatch = parse_update(br#"{"description": null}"#).unwrap();
        assert_eq!(patch.description, Some(None));
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({ "description": null })
        );
    }
}
