//! Static content pages (about, FAQ, privacy) edited from the admin panel.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::RequirePrivilege;
use crate::database::{AuditLog, TableFactory, TableRow};
use crate::datatable::{DataTableApi, NoContext, RowModel, SortDirection};

pub const FAMILY: &str = "content_pages";
pub const PATH: &str = "/content-pages";
pub const PRIVILEGE: &str = "content.manage";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentPage {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPageInput {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentPagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

impl RowModel for ContentPage {
    type Create = ContentPageInput;
    type Update = ContentPagePatch;
    const FIELDS: &'static [&'static str] = &["id", "slug", "title", "body", "published"];

    fn id(&self) -> i64 {
        self.id
    }
}

impl TableRow for ContentPage {
    type Context = NoContext;
    const TABLE: &'static str = "content_pages";
    const DEFAULT_SORT: (&'static str, SortDirection) = ("title", SortDirection::Asc);
    const UNIQUE_COLUMNS: &'static [&'static str] = &["slug"];
}

pub fn api<F: TableFactory>(tables: &F, audit: &AuditLog) -> DataTableApi<ContentPage> {
    let table = tables.table::<ContentPage>();
    let api = DataTableApi::new(FAMILY)
        .with_access_check(Arc::new(RequirePrivilege::any(PRIVILEGE)))
        .with_list(table.clone())
        .with_get(table.clone())
        .with_create(table.clone())
        .with_update(table.clone())
        .with_delete(table);
    super::configure(api, audit)
}
