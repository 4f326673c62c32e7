//! Dynamic SQL fragments and pagination
//!
//! List endpoints filter on whatever query parameters the caller supplied,
//! and partial updates only touch the fields present in the request body.
//! Both cases assemble SQL at runtime. [`Filters`] and [`Changes`] collect
//! the fragments together with their values and render them into a
//! `sqlx::QueryBuilder`, which numbers the `$n` placeholders in bind order.
//! The same `Filters` can be rendered into a count query and a page query
//! without any offset arithmetic.
//!
//! Fragment templates mark each bound value with `?`. Templates are always
//! static SQL written in this codebase, never user input, and must not
//! contain a literal `?`.
//!
//! ```
//! use flexjobs_shared::db::query::{Filters, SqlValue};
//! use sqlx::{Postgres, QueryBuilder};
//!
//! let mut filters = Filters::new();
//! filters.and_raw("j.is_active = TRUE");
//! filters.and_eq("j.job_type", "contract");
//! filters.and_any_ilike(&["j.title", "j.description"], "rust");
//!
//! let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM jobs j");
//! filters.push_where(&mut qb);
//! assert_eq!(
//!     qb.sql(),
//!     "SELECT COUNT(*) FROM jobs j WHERE j.is_active = TRUE AND j.job_type = $1 \
//!      AND (j.title ILIKE $2 OR j.description ILIKE $3)"
//! );
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

/// A value bound into a dynamic fragment
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Int4(i32),
    Bool(bool),
    Decimal(Decimal),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl SqlValue {
    fn push_bind(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            SqlValue::Text(v) => qb.push_bind(v.clone()),
            SqlValue::Int(v) => qb.push_bind(*v),
            SqlValue::Int4(v) => qb.push_bind(*v),
            SqlValue::Bool(v) => qb.push_bind(*v),
            SqlValue::Decimal(v) => qb.push_bind(*v),
            SqlValue::Date(v) => qb.push_bind(*v),
            SqlValue::Timestamp(v) => qb.push_bind(*v),
            SqlValue::Json(v) => qb.push_bind(v.clone()),
        };
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int4(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        SqlValue::Json(v)
    }
}

/// Renders `template` into `qb`, binding one value per `?` marker
fn push_template(qb: &mut QueryBuilder<'_, Postgres>, template: &str, values: &[SqlValue]) {
    let mut values = values.iter();
    let mut pieces = template.split('?');

    if let Some(first) = pieces.next() {
        qb.push(first);
    }
    for piece in pieces {
        if let Some(value) = values.next() {
            value.push_bind(qb);
        }
        qb.push(piece);
    }
}

/// Wraps a search term for `ILIKE`, escaping its wildcard characters
pub fn ilike_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[derive(Debug, Clone)]
struct Fragment {
    template: String,
    values: Vec<SqlValue>,
}

/// Conditions joined with `AND` behind a single `WHERE`
#[derive(Debug, Clone, Default)]
pub struct Filters {
    fragments: Vec<Fragment>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition with `?` markers for its values
    pub fn and(&mut self, template: impl Into<String>, values: Vec<SqlValue>) -> &mut Self {
        self.fragments.push(Fragment {
            template: template.into(),
            values,
        });
        self
    }

    /// Adds a condition that binds nothing
    pub fn and_raw(&mut self, condition: impl Into<String>) -> &mut Self {
        self.and(condition, Vec::new())
    }

    pub fn and_eq(&mut self, column: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.and(format!("{} = ?", column), vec![value.into()])
    }

    pub fn and_gte(&mut self, column: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.and(format!("{} >= ?", column), vec![value.into()])
    }

    pub fn and_lte(&mut self, column: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.and(format!("{} <= ?", column), vec![value.into()])
    }

    /// `column ILIKE %term%`
    pub fn and_ilike(&mut self, column: &str, term: &str) -> &mut Self {
        self.and(format!("{} ILIKE ?", column), vec![ilike_pattern(term).into()])
    }

    /// `(c1 ILIKE %term% OR c2 ILIKE %term% ...)`
    pub fn and_any_ilike(&mut self, columns: &[&str], term: &str) -> &mut Self {
        if columns.is_empty() {
            return self;
        }
        let pattern = ilike_pattern(term);
        let template = columns
            .iter()
            .map(|c| format!("{} ILIKE ?", c))
            .collect::<Vec<_>>()
            .join(" OR ");
        let values = columns.iter().map(|_| SqlValue::from(pattern.clone())).collect();
        self.and(format!("({})", template), values)
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of values these conditions bind
    pub fn bind_count(&self) -> usize {
        self.fragments.iter().map(|f| f.values.len()).sum()
    }

    /// Appends ` WHERE a AND b ...`, or nothing when empty
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for (i, fragment) in self.fragments.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            push_template(qb, &fragment.template, &fragment.values);
        }
    }
}

/// Column assignments for a partial `UPDATE`
#[derive(Debug, Clone, Default)]
pub struct Changes {
    sets: Vec<(String, SqlValue)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.sets.push((column.to_string(), value.into()));
        self
    }

    /// Sets the column only when a value is present
    pub fn set_opt<V: Into<SqlValue>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.set(column, value);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Appends `col1 = $n, col2 = $n+1, ...`
    pub fn push_assignments(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for (i, (column, value)) in self.sets.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(column.as_str()).push(" = ");
            value.push_bind(qb);
        }
    }

    /// Builds `UPDATE {table} SET ..., updated_at = NOW() WHERE {key} = $n`
    ///
    /// Callers append `RETURNING` or further conditions as needed.
    pub fn update_query<'a>(&self, table: &str, key: &str, id: i64) -> QueryBuilder<'a, Postgres> {
        let mut qb = QueryBuilder::new(format!("UPDATE {} SET ", table));
        self.push_assignments(&mut qb);
        if !self.is_empty() {
            qb.push(", ");
        }
        qb.push("updated_at = NOW() WHERE ")
            .push(key)
            .push(" = ")
            .push_bind(id);
        qb
    }
}

/// Raw `page`/`limit` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Clamped page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

impl PageParams {
    /// Clamps `1 <= limit <= max_limit` (`default_limit` when absent) and
    /// `page >= 1`, keeping the offset within `i64`
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        let limit = limit.unwrap_or(default_limit).clamp(1, max_limit.max(1));
        let page = page.unwrap_or(1).clamp(1, i64::MAX / limit);
        Self { page, limit }
    }

    pub fn from_query(query: PageQuery, default_limit: i64, max_limit: i64) -> Self {
        Self::new(query.page, query.limit, default_limit, max_limit)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.limit)
    }

    /// Appends ` LIMIT $n OFFSET $n+1`
    pub fn push_limit_offset(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" LIMIT ")
            .push_bind(self.limit)
            .push(" OFFSET ")
            .push_bind(self.offset());
    }
}

/// Pagination block returned by public list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(params: PageParams, total: i64) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            (total + params.limit - 1) / params.limit
        };

        Self {
            page: params.page,
            limit: params.limit,
            total,
            total_pages,
            has_next: params.page < total_pages,
            has_prev: params.page > 1,
        }
    }
}

/// Compact pagination block used by the admin listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl From<Pagination> for AdminPagination {
    fn from(p: Pagination) -> Self {
        Self {
            page: p.page,
            limit: p.limit,
            total: p.total,
            pages: p.total_pages,
        }
    }
}
