use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::middleware::AuthUser;

/// Shape of one record exposed by an endpoint family.
///
/// `FIELDS` doubles as the set of columns a list request may sort by, so it
/// must list every serialized key of the row.
pub trait RowModel: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Body accepted by `POST <endpoint>`.
    type Create: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static;
    /// Body accepted by `PUT <endpoint>/:id`.
    type Update: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static;

    const FIELDS: &'static [&'static str];

    fn id(&self) -> i64;
}

/// Scoping parameters shared by every operation of an endpoint family.
pub trait Context: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    const FIELDS: &'static [&'static str];

    /// Column -> value pairs used to scope queries.
    fn scope(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Marker for families without context. Never read from the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoContext;

impl Context for NoContext {
    const FIELDS: &'static [&'static str] = &[];
}

/// Input type for families that accept no writes; it cannot be constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReadOnly {}

/// Operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    List,
    Get,
    Create,
    Update,
    Delete,
    Reorder,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Get => "get",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Reorder => "reorder",
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Action::List | Action::Get)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag handed to the audit hook after a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mutation {
    Created,
    Updated,
    Deleted,
    Reordered,
}

impl Mutation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mutation::Created => "Created",
            Mutation::Updated => "Updated",
            Mutation::Deleted => "Deleted",
            Mutation::Reordered => "Reordered",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn offset(&self) -> u64 {
        self.page as u64 * self.page_size as u64
    }
}

/// Single-field sort. `direction: None` means the client cleared the sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: Option<SortDirection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRequest<C> {
    pub pagination: Option<Pagination>,
    pub sort: Option<Sort>,
    pub context: C,
}

impl<C> ListRequest<C> {
    /// Sort to apply, falling back to the family default when the client
    /// sent no field or no direction.
    pub fn effective_sort<'a>(&'a self, default: (&'a str, SortDirection)) -> (&'a str, SortDirection) {
        match &self.sort {
            Some(Sort { field, direction: Some(direction) }) => (field.as_str(), *direction),
            _ => default,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRequest<C> {
    pub id: i64,
    pub context: C,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest<I, C> {
    pub row: I,
    pub context: C,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest<I, C> {
    pub id: i64,
    pub row: I,
    pub context: C,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest<C> {
    pub id: i64,
    pub context: C,
}

/// Complete target ordering; index in `order` is the new position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderRequest<C> {
    pub order: Vec<i64>,
    pub context: C,
}

/// Any validated request, as seen by the access check and the audit hook.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum DataTableRequest<R: RowModel, C: Context> {
    List(ListRequest<C>),
    Get(GetRequest<C>),
    Create(CreateRequest<R::Create, C>),
    Update(UpdateRequest<R::Update, C>),
    Delete(DeleteRequest<C>),
    Reorder(ReorderRequest<C>),
}

impl<R: RowModel, C: Context> DataTableRequest<R, C> {
    pub fn action(&self) -> Action {
        match self {
            DataTableRequest::List(_) => Action::List,
            DataTableRequest::Get(_) => Action::Get,
            DataTableRequest::Create(_) => Action::Create,
            DataTableRequest::Update(_) => Action::Update,
            DataTableRequest::Delete(_) => Action::Delete,
            DataTableRequest::Reorder(_) => Action::Reorder,
        }
    }

    pub fn context(&self) -> &C {
        match self {
            DataTableRequest::List(r) => &r.context,
            DataTableRequest::Get(r) => &r.context,
            DataTableRequest::Create(r) => &r.context,
            DataTableRequest::Update(r) => &r.context,
            DataTableRequest::Delete(r) => &r.context,
            DataTableRequest::Reorder(r) => &r.context,
        }
    }

    /// Identifier addressed by the request, when there is exactly one.
    pub fn row_id(&self) -> Option<i64> {
        match self {
            DataTableRequest::Get(r) => Some(r.id),
            DataTableRequest::Update(r) => Some(r.id),
            DataTableRequest::Delete(r) => Some(r.id),
            _ => None,
        }
    }
}

/// Per-request properties supplied by the transport layer.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub user: Option<AuthUser>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: AuthUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.user_id)
    }
}

/// Either a successful payload or an expected, displayable failure.
#[derive(Debug, Clone, PartialEq)]
pub enum DataTableResponse<T> {
    Success(T),
    Failure { error: Option<String> },
}

impl<T> DataTableResponse<T> {
    pub fn failure(error: impl Into<String>) -> Self {
        DataTableResponse::Failure { error: Some(error.into()) }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DataTableResponse::Success(_))
    }

    pub fn success_payload(&self) -> Option<&T> {
        match self {
            DataTableResponse::Success(payload) => Some(payload),
            DataTableResponse::Failure { .. } => None,
        }
    }
}

impl<T: Serialize> Serialize for DataTableResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct SuccessEnvelope<'a, P> {
            success: bool,
            #[serde(flatten)]
            payload: &'a P,
        }

        #[derive(Serialize)]
        struct FailureEnvelope<'a> {
            success: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: &'a Option<String>,
        }

        match self {
            DataTableResponse::Success(payload) => SuccessEnvelope { success: true, payload }.serialize(serializer),
            DataTableResponse::Failure { error } => FailureEnvelope { success: false, error }.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPayload<R> {
    pub row_count: u64,
    pub rows: Vec<R>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowPayload<R> {
    pub row: R,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Acknowledged {}

/// Optional partial row the client may merge instead of refetching.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeletePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorderPayload {
    pub order: Vec<i64>,
}

pub type ListResponse<R> = DataTableResponse<ListPayload<R>>;
pub type RowResponse<R> = DataTableResponse<RowPayload<R>>;
pub type UpdateResponse = DataTableResponse<Acknowledged>;
pub type DeleteResponse = DataTableResponse<DeletePayload>;
pub type ReorderResponse = DataTableResponse<ReorderPayload>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_flattens_payload() {
        let response: ListResponse<Value> = DataTableResponse::Success(ListPayload {
            row_count: 25,
            rows: vec![json!({ "id": 1 })],
        });
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({ "success": true, "rowCount": 25, "rows": [{ "id": 1 }] }));
    }

    #[test]
    fn acknowledgement_is_bare_success() {
        let response: UpdateResponse = DataTableResponse::Success(Acknowledged {});
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({ "success": true }));
    }

    #[test]
    fn failure_omits_missing_error() {
        let response: UpdateResponse = DataTableResponse::Failure { error: None };
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({ "success": false }));

        let response: UpdateResponse = DataTableResponse::failure("Row not found");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "success": false, "error": "Row not found" })
        );
    }

    #[test]
    fn delete_replacement_is_optional() {
        let response: DeleteResponse = DataTableResponse::Success(DeletePayload::default());
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({ "success": true }));
    }

    #[test]
    fn unspecified_direction_falls_back_to_default() {
        let request = ListRequest {
            pagination: None,
            sort: Some(Sort { field: "name".into(), direction: None }),
            context: NoContext,
        };
        assert_eq!(request.effective_sort(("position", SortDirection::Asc)), ("position", SortDirection::Asc));

        let request = ListRequest {
            pagination: None,
            sort: Some(Sort { field: "name".into(), direction: Some(SortDirection::Desc) }),
            context: NoContext,
        };
        assert_eq!(request.effective_sort(("position", SortDirection::Asc)), ("name", SortDirection::Desc));
    }

    #[test]
    fn no_context_has_empty_scope() {
        assert!(NoContext.scope().is_empty());
    }
}
