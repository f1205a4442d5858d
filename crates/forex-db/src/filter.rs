//! # Filtering Requests
//!
//! Turns the client's generic filter payload into a parameterized
//! `WHERE … ORDER BY … LIMIT …` tail for a repository's base `SELECT`.
//!
//! ## Payload
//! ```text
//! {
//!   "filters":   { "role": ["customer"], "count": [">0"], "producttype": ["include:product"] },
//!   "search":    "krossovka",
//!   "sortBy":    "date",
//!   "descending": true,
//!   "page":      1,
//!   "pageSize":  50
//! }
//! ```
//!
//! ## Value Grammar
//! ```text
//! "v"          column = v
//! "!v"         column <> v
//! ">n" ">=n"   column >  n / >= n
//! "<n" "<=n"   column <  n / <= n
//! "include:x"  ignored (related rows are always part of the DTOs)
//! ```
//! Several values for one key are OR-ed; keys are AND-ed. Keys are matched
//! case-insensitively with underscores removed, so `productTypeId`,
//! `product_type_id` and `producttypeid` are the same key. Unknown keys are
//! ignored. Column names only ever come from the repository's whitelist;
//! values are always bound.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, SqliteConnection};
use tracing::debug;

use forex_core::validation::{validate_page_size, ValidationResult};

use crate::error::DbResult;

// =============================================================================
// Request
// =============================================================================

/// Generic filter / sort / page request sent by the desktop client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilteringRequest {
    pub filters: HashMap<String, Vec<String>>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub descending: bool,
    /// 1-based page number.
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl FilteringRequest {
    /// Validates paging parameters.
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(size) = self.page_size {
            validate_page_size(size)?;
        }
        Ok(())
    }

    /// Adds an equality filter (builder style, used by services and tests).
    pub fn with_filter(mut self, key: &str, value: impl Into<String>) -> Self {
        self.filters
            .entry(key.to_string())
            .or_default()
            .push(value.into());
        self
    }

    /// Builds the SQL tail for the given whitelist.
    pub fn build(&self, spec: &FilterSpec) -> FilterQuery {
        let mut query = FilterQuery::default();

        // Sorted for a stable statement text
        let mut keys: Vec<&String> = self.filters.keys().collect();
        keys.sort();

        for key in keys {
            let Some(column) = spec.column(key) else {
                debug!(key = %key, "Ignoring unknown filter key");
                continue;
            };

            let mut alternatives = Vec::new();
            for raw in &self.filters[key] {
                let Some((op, value)) = parse_value(raw) else {
                    continue;
                };
                alternatives.push(format!("{} {} ?", column, op));
                query.bindings.push(value);
            }

            if !alternatives.is_empty() {
                query
                    .conditions
                    .push(format!("({})", alternatives.join(" OR ")));
            }
        }

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !spec.search_columns.is_empty() {
                let pattern = format!("%{}%", search);
                let parts: Vec<String> = spec
                    .search_columns
                    .iter()
                    .map(|c| format!("{} LIKE ?", c))
                    .collect();
                query.conditions.push(format!("({})", parts.join(" OR ")));
                for _ in spec.search_columns {
                    query.bindings.push(FilterValue::Text(pattern.clone()));
                }
            }
        }

        let sort_column = self
            .sort_by
            .as_deref()
            .and_then(|s| spec.column(s))
            .unwrap_or(spec.default_sort);
        let direction = if self.descending { "DESC" } else { "ASC" };
        query.order = format!(" ORDER BY {} {}", sort_column, direction);

        if let Some(size) = self.page_size {
            let size = size.clamp(1, forex_core::MAX_PAGE_SIZE);
            let page = self.page.unwrap_or(1).max(1);
            let offset = (page as u64 - 1) * size as u64;
            query.limit = format!(" LIMIT {} OFFSET {}", size, offset);
        }

        query
    }
}

/// Whitelist of filterable / sortable columns for one repository.
#[derive(Debug, Clone, Copy)]
pub struct FilterSpec {
    /// `(normalized key, qualified SQL column)` pairs.
    pub columns: &'static [(&'static str, &'static str)],
    /// Columns matched with `LIKE` against `search`.
    pub search_columns: &'static [&'static str],
    /// Column used when `sort_by` is absent or unknown.
    pub default_sort: &'static str,
}

impl FilterSpec {
    fn column(&self, key: &str) -> Option<&'static str> {
        let key = normalize_key(key);
        self.columns
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, column)| *column)
    }
}

// =============================================================================
// Built Query
// =============================================================================

/// A bound filter value.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
}

/// SQL tail plus the values to bind, in placeholder order.
#[derive(Debug, Clone, Default)]
pub struct FilterQuery {
    pub conditions: Vec<String>,
    pub bindings: Vec<FilterValue>,
    pub order: String,
    pub limit: String,
}

impl FilterQuery {
    /// ` WHERE …` (empty when there are no conditions).
    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Appends the tail to a base `SELECT … FROM …`.
    pub fn to_sql(&self, base_select: &str) -> String {
        format!(
            "{}{}{}{}",
            base_select,
            self.where_clause(),
            self.order,
            self.limit
        )
    }
}

/// Runs `base_select` with the request's filters applied.
pub async fn fetch_filtered<T>(
    conn: &mut SqliteConnection,
    base_select: &str,
    spec: &FilterSpec,
    request: &FilteringRequest,
) -> DbResult<Vec<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let built = request.build(spec);
    let sql = built.to_sql(base_select);
    debug!(sql = %sql, bindings = built.bindings.len(), "Running filtered query");

    let mut query = sqlx::query_as::<_, T>(&sql);
    for value in &built.bindings {
        query = match value {
            FilterValue::Text(s) => query.bind(s.clone()),
            FilterValue::Integer(i) => query.bind(*i),
        };
    }

    Ok(query.fetch_all(&mut *conn).await?)
}

// =============================================================================
// Parsing
// =============================================================================

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Splits a raw filter value into `(operator, value)`.
fn parse_value(raw: &str) -> Option<(&'static str, FilterValue)> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("include:") {
        return None;
    }

    let (op, rest) = if let Some(rest) = raw.strip_prefix(">=") {
        (">=", rest)
    } else if let Some(rest) = raw.strip_prefix("<=") {
        ("<=", rest)
    } else if let Some(rest) = raw.strip_prefix('>') {
        (">", rest)
    } else if let Some(rest) = raw.strip_prefix('<') {
        ("<", rest)
    } else if let Some(rest) = raw.strip_prefix('!') {
        ("<>", rest)
    } else {
        ("=", raw)
    };

    let rest = rest.trim();
    let value = match rest.parse::<i64>() {
        Ok(n) => FilterValue::Integer(n),
        Err(_) => FilterValue::Text(rest.to_string()),
    };

    Some((op, value))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: FilterSpec = FilterSpec {
        columns: &[
            ("id", "r.id"),
            ("count", "r.count"),
            ("shopid", "r.shop_id"),
            ("role", "u.role"),
        ],
        search_columns: &["u.name", "u.phone"],
        default_sort: "r.id",
    };

    #[test]
    fn test_parse_value_operators() {
        assert_eq!(parse_value(">0"), Some((">", FilterValue::Integer(0))));
        assert_eq!(parse_value(">= 5"), Some((">=", FilterValue::Integer(5))));
        assert_eq!(parse_value("<=3"), Some(("<=", FilterValue::Integer(3))));
        assert_eq!(
            parse_value("!admin"),
            Some(("<>", FilterValue::Text("admin".to_string())))
        );
        assert_eq!(
            parse_value("customer"),
            Some(("=", FilterValue::Text("customer".to_string())))
        );
        assert_eq!(parse_value("include:product"), None);
        assert_eq!(parse_value("  "), None);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("shop_Id"), "shopid");
        assert_eq!(normalize_key("ShopId"), "shopid");
    }

    #[test]
    fn test_build_conditions_and_bindings() {
        let request = FilteringRequest::default()
            .with_filter("Count", ">0")
            .with_filter("shop_id", "1")
            .with_filter("shop_id", "2")
            .with_filter("unknown", "x")
            .with_filter("ProductType", "include:Product");

        let q = request.build(&SPEC);
        assert_eq!(
            q.where_clause(),
            " WHERE (r.count > ?) AND (r.shop_id = ? OR r.shop_id = ?)"
        );
        assert_eq!(
            q.bindings,
            vec![
                FilterValue::Integer(0),
                FilterValue::Integer(1),
                FilterValue::Integer(2)
            ]
        );
        assert_eq!(q.order, " ORDER BY r.id ASC");
        assert!(q.limit.is_empty());
    }

    #[test]
    fn test_build_search_sort_and_paging() {
        let request = FilteringRequest {
            search: Some(" ali ".to_string()),
            sort_by: Some("count".to_string()),
            descending: true,
            page: Some(3),
            page_size: Some(20),
            ..Default::default()
        };

        let q = request.build(&SPEC);
        assert_eq!(q.where_clause(), " WHERE (u.name LIKE ? OR u.phone LIKE ?)");
        assert_eq!(q.bindings.len(), 2);
        assert_eq!(q.bindings[0], FilterValue::Text("%ali%".to_string()));
        assert_eq!(q.order, " ORDER BY r.count DESC");
        assert_eq!(q.limit, " LIMIT 20 OFFSET 40");
    }

    #[test]
    fn test_unknown_sort_falls_back_to_default() {
        let request = FilteringRequest {
            sort_by: Some("id; DROP TABLE users".to_string()),
            ..Default::default()
        };
        assert_eq!(request.build(&SPEC).order, " ORDER BY r.id ASC");
    }

    #[test]
    fn test_validate_page_size() {
        let ok = FilteringRequest {
            page_size: Some(50),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad = FilteringRequest {
            page_size: Some(0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_deserializes_client_payload() {
        let json = r#"{
            "filters": { "role": ["customer"], "accounts": ["include:currency"] },
            "descending": true,
            "sortBy": "date",
            "page": 1,
            "pageSize": 30
        }"#;
        let request: FilteringRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.filters["role"], vec!["customer".to_string()]);
        assert_eq!(request.sort_by.as_deref(), Some("date"));
        assert_eq!(request.page_size, Some(30));
        assert!(request.search.is_none());
    }
}
