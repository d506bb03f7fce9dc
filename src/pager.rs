//! Pagination and sorting for list endpoints
//!
//! [`Pager`] deserializes straight from query-string parameters, clamps them
//! to sane bounds, and turns a comma-separated sort expression into an SQL
//! `ORDER BY` clause filtered against an allow-list. [`QueryScope`] builds
//! the matching count and select statements so the two never drift apart.

use serde::{Deserialize, Serialize};

use crate::envelope::BodyMeta;

/// Page size applied when the client sends none
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on the client-requested page size
pub const MAX_PAGE_SIZE: u32 = 500;

/// Exposes the column names a row type may be sorted by
pub trait Sortable {
    /// Allow-listed sort columns
    fn sortable_fields() -> &'static [&'static str];
}

/// Pagination state for a single list request.
///
/// Extract it with `Query<Pager>`; all fields default so a bare request is
/// valid. `total_rows` is populated by [`Pager::query`] (or manually) before
/// the pager is handed to [`crate::envelope::ApiResponse::paginated`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pager {
    /// Requested page, 1-based
    #[serde(default)]
    pub page: u32,

    /// Requested page size
    #[serde(default)]
    pub page_size: u32,

    /// Sort expression, e.g. `name,-age`
    #[serde(default)]
    pub sort: String,

    /// Total matching rows, set by the count query
    #[serde(skip_deserializing)]
    pub total_rows: i64,

    /// Overrides the row type's allow-list when non-empty
    #[serde(skip)]
    pub sortable_fields: Vec<String>,
}

impl Pager {
    /// Effective page number, at least 1
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// Effective page size, defaulted and clamped
    pub fn page_size(&self) -> u32 {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size.min(MAX_PAGE_SIZE)
        }
    }

    /// Row offset for the effective page
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.page_size())
    }

    /// Total pages implied by `total_rows`, zero when there are no rows
    pub fn total_pages(&self) -> u32 {
        if self.total_rows <= 0 {
            return 0;
        }
        (self.total_rows as u64).div_ceil(u64::from(self.page_size())) as u32
    }

    /// Build an `ORDER BY` clause body from the sort expression.
    ///
    /// Each comma-separated term names a field, with a `-` prefix for
    /// descending order. Terms not present in `allowed` are dropped without
    /// error; the surviving terms keep their input order. Returns an empty
    /// string when nothing survives.
    pub fn order(&self, allowed: &[&str]) -> String {
        self.sort
            .split(',')
            .filter_map(|term| {
                let term = term.trim();
                let (field, direction) = match term.strip_prefix('-') {
                    Some(rest) => (rest, "desc"),
                    None => (term, "asc"),
                };
                if !field.is_empty() && allowed.contains(&field) {
                    Some(format!("{field} {direction}"))
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Pagination metadata for the response envelope
    pub fn meta(&self) -> BodyMeta {
        let mut meta = BodyMeta::new();
        meta.insert("page".to_string(), self.page().into());
        meta.insert("total_pages".to_string(), self.total_pages().into());
        meta.insert("page_size".to_string(), self.page_size().into());
        meta.insert("total".to_string(), self.total_rows.into());
        meta
    }

    /// Run the count-then-fetch pair for `scope` against `pool`.
    ///
    /// The count query runs first and populates `total_rows`; if it fails the
    /// fetch is never attempted. Sorting uses the pager's `sortable_fields`
    /// override when set, otherwise the row type's own allow-list.
    #[cfg(feature = "database")]
    pub async fn query<T>(
        &mut self,
        scope: &QueryScope<'_>,
        pool: &sqlx::PgPool,
    ) -> crate::error::Result<Vec<T>>
    where
        T: Sortable + for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let total: i64 = sqlx::query_scalar(&scope.count_sql())
            .fetch_one(pool)
            .await?;
        self.total_rows = total;

        let order = if self.sortable_fields.is_empty() {
            self.order(T::sortable_fields())
        } else {
            let allowed: Vec<&str> = self.sortable_fields.iter().map(String::as_str).collect();
            self.order(&allowed)
        };

        let sql = scope.select_sql(&order, self.page_size(), self.offset());
        let rows = sqlx::query_as::<_, T>(&sql).fetch_all(pool).await?;
        Ok(rows)
    }
}

/// Describes the table, columns, and filter shared by the count and fetch
/// statements of one paginated query
#[derive(Debug, Clone)]
pub struct QueryScope<'a> {
    table: &'a str,
    columns: &'a str,
    filter: Option<&'a str>,
}

impl<'a> QueryScope<'a> {
    /// Scope selecting all columns of `table`
    #[must_use]
    pub fn table(table: &'a str) -> Self {
        Self {
            table,
            columns: "*",
            filter: None,
        }
    }

    /// Restrict the selected columns
    #[must_use]
    pub fn columns(mut self, columns: &'a str) -> Self {
        self.columns = columns;
        self
    }

    /// Add a `WHERE` clause body applied to both statements
    #[must_use]
    pub fn filter(mut self, filter: &'a str) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Count statement for the scope
    pub fn count_sql(&self) -> String {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.table);
        if let Some(filter) = self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        sql
    }

    /// Fetch statement for the scope with ordering and window applied
    pub fn select_sql(&self, order: &str, limit: u32, offset: u64) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.columns, self.table);
        if let Some(filter) = self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        sql
    }
}
