//! Request validation derived from a row model's declared fields.
//!
//! Everything here is a pure transform from the flattened transport payload
//! (query string map, JSON body) into typed requests, so the rules can be
//! tested without a router. List queries use the data-grid convention:
//! `pagination.page`, `pagination.pageSize`, `sort.field`, `sort.sort`, with
//! context fields flattened next to them.

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::error::DataTableError;
use super::types::{Context, ListRequest, Pagination, RowModel, Sort, SortDirection};

pub const DEFAULT_PAGE_SIZES: &[u32] = &[10, 25, 50, 100];

const PAGE_KEY: &str = "pagination.page";
const PAGE_SIZE_KEY: &str = "pagination.pageSize";
const SORT_FIELD_KEY: &str = "sort.field";
const SORT_DIRECTION_KEY: &str = "sort.sort";

/// Validator for list queries, synthesized from the row fields; context
/// fields come from the `Context` type at parse time.
#[derive(Debug, Clone)]
pub struct ListRequestSchema {
    sortable: &'static [&'static str],
    page_sizes: Vec<u32>,
}

impl ListRequestSchema {
    pub fn new(sortable: &'static [&'static str], page_sizes: &[u32]) -> Self {
        Self {
            sortable,
            page_sizes: page_sizes.to_vec(),
        }
    }

    pub fn for_row<R: RowModel>(page_sizes: &[u32]) -> Self {
        Self::new(R::FIELDS, page_sizes)
    }

    pub fn parse<C: Context>(&self, query: &HashMap<String, String>) -> Result<ListRequest<C>, DataTableError> {
        let pagination = self.parse_pagination(query)?;
        let sort = self.parse_sort(query)?;
        let context = parse_context::<C>(query)?;
        Ok(ListRequest { pagination, sort, context })
    }

    pub fn parse_pagination(&self, query: &HashMap<String, String>) -> Result<Option<Pagination>, DataTableError> {
        let page = query.get(PAGE_KEY);
        let page_size = query.get(PAGE_SIZE_KEY);

        match (page, page_size) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(DataTableError::field(PAGE_SIZE_KEY, "This field is required")),
            (None, Some(_)) => Err(DataTableError::field(PAGE_KEY, "This field is required")),
            (Some(page), Some(page_size)) => {
                let page: u32 = page
                    .trim()
                    .parse()
                    .map_err(|_| DataTableError::field(PAGE_KEY, format!("Expected a non-negative integer, got '{}'", page)))?;
                let page_size: u32 = page_size.trim().parse().map_err(|_| {
                    DataTableError::field(PAGE_SIZE_KEY, format!("Expected a non-negative integer, got '{}'", page_size))
                })?;
                if !self.page_sizes.contains(&page_size) {
                    return Err(DataTableError::field(
                        PAGE_SIZE_KEY,
                        format!("Page size must be one of {:?}", self.page_sizes),
                    ));
                }
                Ok(Some(Pagination { page, page_size }))
            }
        }
    }

    pub fn parse_sort(&self, query: &HashMap<String, String>) -> Result<Option<Sort>, DataTableError> {
        let direction = match query.get(SORT_DIRECTION_KEY).map(|s| s.trim()) {
            None | Some("") => None,
            Some(d) if d.eq_ignore_ascii_case("asc") => Some(SortDirection::Asc),
            Some(d) if d.eq_ignore_ascii_case("desc") => Some(SortDirection::Desc),
            Some(other) => {
                return Err(DataTableError::field(
                    SORT_DIRECTION_KEY,
                    format!("Sort direction must be 'asc' or 'desc', got '{}'", other),
                ))
            }
        };

        let field = match query.get(SORT_FIELD_KEY) {
            Some(field) => field.trim(),
            None if direction.is_some() => return Err(DataTableError::field(SORT_FIELD_KEY, "This field is required")),
            None => return Ok(None),
        };

        if !self.sortable.contains(&field) {
            return Err(DataTableError::field(
                SORT_FIELD_KEY,
                format!("Cannot sort by '{}'; expected one of {:?}", field, self.sortable),
            ));
        }

        Ok(Some(Sort {
            field: field.to_string(),
            direction,
        }))
    }
}

/// Read the context from flattened query parameters.
///
/// Families without context fields never look at the query. Declared fields
/// are all required. Values are first tried with numeric and boolean
/// coercion, then as plain strings.
pub fn parse_context<C: Context>(query: &HashMap<String, String>) -> Result<C, DataTableError> {
    if C::FIELDS.is_empty() {
        return serde_json::from_value(Value::Null)
            .map_err(|e| DataTableError::validation(format!("Invalid context: {}", e)));
    }

    let mut missing = HashMap::new();
    let mut coerced = Map::new();
    let mut raw = Map::new();
    for &field in C::FIELDS {
        match query.get(field) {
            Some(value) => {
                coerced.insert(field.to_string(), coerce_query_value(value));
                raw.insert(field.to_string(), Value::String(value.clone()));
            }
            None => {
                missing.insert(field.to_string(), "This field is required".to_string());
            }
        }
    }
    if !missing.is_empty() {
        return Err(DataTableError::fields(missing));
    }

    match serde_json::from_value::<C>(Value::Object(coerced)) {
        Ok(context) => Ok(context),
        Err(first) => serde_json::from_value::<C>(Value::Object(raw))
            .map_err(|_| DataTableError::validation(format!("Invalid context: {}", first))),
    }
}

fn coerce_query_value(value: &str) -> Value {
    let trimmed = value.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(value.to_string()),
    }
}

pub fn parse_id(raw: &str) -> Result<i64, DataTableError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| DataTableError::field("id", format!("Expected a numeric identifier, got '{}'", raw)))
}

/// Parse a create body.
pub fn parse_row<T: DeserializeOwned>(body: &[u8]) -> Result<T, DataTableError> {
    let value = parse_json(body)?;
    if !value.is_object() {
        return Err(DataTableError::validation("Request body must be a JSON object"));
    }
    serde_json::from_value(value).map_err(|e| DataTableError::validation(format!("Invalid row: {}", e)))
}

/// Parse an update body; an update that would set nothing is rejected.
pub fn parse_update<T: DeserializeOwned + serde::Serialize>(body: &[u8]) -> Result<T, DataTableError> {
    let update: T = parse_row(body)?;
    match serde_json::to_value(&update) {
        Ok(Value::Object(map)) if !map.is_empty() => Ok(update),
        Ok(_) => Err(DataTableError::validation("Update must set at least one field")),
        Err(e) => Err(DataTableError::validation(format!("Invalid row: {}", e))),
    }
}

/// Parse a reorder body: `{"order": [id, ...]}` with unique identifiers.
pub fn parse_order(body: &[u8]) -> Result<Vec<i64>, DataTableError> {
    #[derive(serde::Deserialize)]
    struct OrderBody {
        order: Vec<i64>,
    }

    let value = parse_json(body)?;
    let OrderBody { order } =
        serde_json::from_value(value).map_err(|e| DataTableError::field("order", e.to_string()))?;

    let mut seen = HashSet::with_capacity(order.len());
    if let Some(duplicate) = order.iter().find(|id| !seen.insert(**id)) {
        return Err(DataTableError::field("order", format!("Identifier {} appears more than once", duplicate)));
    }
    Ok(order)
}

/// `deserialize_with` helper for patch fields that may be cleared: an
/// explicit `null` becomes `Some(None)`, an absent key stays `None`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn parse_json(body: &[u8]) -> Result<Value, DataTableError> {
    if body.is_empty() {
        return Err(DataTableError::validation("Request body is required"));
    }
    serde_json::from_slice(body).map_err(|e| DataTableError::validation(format!("Malformed JSON: {}", e)))
}
