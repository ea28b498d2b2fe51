use serde_json::{Map, Value};

use super::error::{validate_identifier, FilterError};
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterOp, FilterOrderInfo, FilterWhereInfo, SortDirection, SqlResult};

/// Builder for a single-table SELECT/COUNT/UPDATE/DELETE with AND-ed
/// conditions. Identifiers are validated and quoted; values are always bound.
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: String,
    conditions: Vec<FilterWhereInfo>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        if !validate_identifier(&table_name) {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", table_name)));
        }
        Ok(Self {
            table_name,
            conditions: vec![],
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    pub fn where_eq(&mut self, column: &str, value: Value) -> Result<&mut Self, FilterError> {
        self.conditions.push(FilterWhere::condition(column, FilterOp::Eq, value)?);
        Ok(self)
    }

    /// Restrict to rows whose `column` is NULL, e.g. not soft-deleted.
    pub fn where_null(&mut self, column: &str) -> Result<&mut Self, FilterError> {
        self.conditions.push(FilterWhere::condition(column, FilterOp::Null, Value::Null)?);
        Ok(self)
    }

    /// Equality on every column of a context scope.
    pub fn scope(&mut self, scope: &Map<String, Value>) -> Result<&mut Self, FilterError> {
        for (column, value) in scope {
            self.where_eq(column, value.clone())?;
        }
        Ok(self)
    }

    pub fn order(&mut self, column: &str, sort: SortDirection) -> Result<&mut Self, FilterError> {
        let info = FilterOrder::parse(column, sort)?;
        if !self.order_data.iter().any(|o| o.column == info.column) {
            self.order_data.push(info);
        }
        Ok(self)
    }

    pub fn limit(&mut self, limit: u64, offset: Option<u64>) -> &mut Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = FilterWhere::generate(&self.conditions, 0)?;
        let query = [
            "SELECT *".to_string(),
            format!("FROM \"{}\"", self.table_name),
            format!("WHERE {}", where_clause),
            FilterOrder::generate(&self.order_data),
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params })
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        self.to_where_sql_at(0)
    }

    /// WHERE body whose placeholders start after `$start`, for embedding in
    /// statements that bind their own parameters first.
    pub fn to_where_sql_at(&self, start: usize) -> Result<SqlResult, FilterError> {
        let (query, params) = FilterWhere::generate(&self.conditions, start)?;
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = format!(
            "SELECT COUNT(*) as count FROM \"{}\" WHERE {}",
            self.table_name, where_result.query
        );
        Ok(SqlResult {
            query,
            params: where_result.params,
        })
    }

    /// `UPDATE ... SET ... WHERE ... RETURNING *`; SET values bind first.
    pub fn to_update_sql(&self, assignments: &Map<String, Value>) -> Result<SqlResult, FilterError> {
        if assignments.is_empty() {
            return Err(FilterError::EmptyUpdate);
        }

        let mut params = Vec::with_capacity(assignments.len() + self.conditions.len());
        let mut sets = Vec::with_capacity(assignments.len());
        for (column, value) in assignments {
            if !validate_identifier(column) {
                return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)));
            }
            params.push(value.clone());
            sets.push(format!("\"{}\" = ${}", column, params.len()));
        }

        let (where_clause, where_params) = FilterWhere::generate(&self.conditions, params.len())?;
        params.extend(where_params);

        let query = format!(
            "UPDATE \"{}\" SET {} WHERE {} RETURNING *",
            self.table_name,
            sets.join(", "),
            where_clause
        );
        Ok(SqlResult { query, params })
    }

    pub fn to_delete_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = format!("DELETE FROM \"{}\" WHERE {}", self.table_name, where_result.query);
        Ok(SqlResult {
            query,
            params: where_result.params,
        })
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_unsafe_identifiers() {
        assert!(Filter::new("shift_categories").is_ok());
        assert!(Filter::new("shift categories").is_err());
        assert!(Filter::new("1table").is_err());
        assert!(Filter::new("").is_err());

        let mut filter = Filter::new("pages").unwrap();
        assert!(filter.where_eq("id; DROP TABLE pages", json!(1)).is_err());
        assert!(filter.order("name\"", SortDirection::Asc).is_err());
    }

    #[test]
    fn scoped_list_query() {
        let mut filter = Filter::new("program_locations").unwrap();
        let scope = json!({ "event_id": 4 }).as_object().cloned().unwrap();
        filter.scope(&scope).unwrap();
        filter.where_null("deleted_at").unwrap();
        filter.order("position", SortDirection::Asc).unwrap();
        filter.order("id", SortDirection::Asc).unwrap();
        filter.limit(10, Some(20));

        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"program_locations\" WHERE \"event_id\" = $1 AND \"deleted_at\" IS NULL \
             ORDER BY \"position\" ASC, \"id\" ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(sql.params, vec![json!(4)]);

        let count = filter.to_count_sql().unwrap();
        assert_eq!(
            count.query,
            "SELECT COUNT(*) as count FROM \"program_locations\" WHERE \"event_id\" = $1 AND \"deleted_at\" IS NULL"
        );
    }

    #[test]
    fn duplicate_order_columns_collapse() {
        let mut filter = Filter::new("pages").unwrap();
        filter.order("id", SortDirection::Desc).unwrap();
        filter.order("id", SortDirection::Asc).unwrap();
        assert_eq!(filter.to_sql().unwrap().query, "SELECT * FROM \"pages\" WHERE 1=1 ORDER BY \"id\" DESC");
    }

    #[test]
    fn update_binds_assignments_before_conditions() {
        let mut filter = Filter::new("pages").unwrap();
        filter.where_eq("id", json!(7)).unwrap();
        let assignments = json!({ "title": "About", "published": true }).as_object().cloned().unwrap();

        let sql = filter.to_update_sql(&assignments).unwrap();
        assert_eq!(
            sql.query,
            "UPDATE \"pages\" SET \"published\" = $1, \"title\" = $2 WHERE \"id\" = $3 RETURNING *"
        );
        assert_eq!(sql.params, vec![json!(true), json!("About"), json!(7)]);

        assert!(matches!(filter.to_update_sql(&Map::new()), Err(FilterError::EmptyUpdate)));
    }

    #[test]
    fn delete_targets_scoped_row() {
        let mut filter = Filter::new("shift_categories").unwrap();
        filter.where_eq("event_id", json!(2)).unwrap();
        filter.where_eq("id", json!(5)).unwrap();
        let sql = filter.to_delete_sql().unwrap();
        assert_eq!(sql.query, "DELETE FROM \"shift_categories\" WHERE \"event_id\" = $1 AND \"id\" = $2");
        assert_eq!(sql.params, vec![json!(2), json!(5)]);

        assert_eq!(Filter::new("pages").unwrap().to_where_sql().unwrap().query, "1=1");
    }
}
