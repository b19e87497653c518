//! Parameterized statement construction.
//!
//! Every value reaches SQLite as a bound argument. Identifiers are
//! `&'static str` drawn from a record kind's column list, so caller text is
//! never spliced into SQL.
//!
//! ```
//! use roster_storage::query::{self, Filter, OrderBy, Pagination};
//!
//! let filter = Filter::new().is_null("deleted_at").prefix("first_name", "al");
//! let qb = query::select(
//!     "subjects",
//!     &["id", "first_name"],
//!     &filter,
//!     &OrderBy::default(),
//!     Pagination::from_page(2, 10),
//! );
//! assert_eq!(
//!     qb.sql(),
//!     "SELECT id, first_name FROM subjects WHERE deleted_at IS NULL \
//!      AND lower(first_name) LIKE lower(?) ESCAPE '\\' LIMIT ? OFFSET ?"
//! );
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use crate::error::{StorageError, StorageResult};

/// A bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(Option<String>),
    Integer(i64),
    Real(f64),
    Timestamp(Option<DateTime<Utc>>),
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(Some(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(Some(v))
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Text(Some(v.clone()))
    }
}

impl From<Option<String>> for Value {
    fn from(v: Option<String>) -> Self {
        Self::Text(v)
    }
}

impl From<&Option<String>> for Value {
    fn from(v: &Option<String>) -> Self {
        Self::Text(v.clone())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(Some(v))
    }
}

impl From<Option<DateTime<Utc>>> for Value {
    fn from(v: Option<DateTime<Utc>>) -> Self {
        Self::Timestamp(v)
    }
}

/// Column/value list used by insert and update.
pub type Assignments = Vec<(&'static str, Value)>;

fn push_value(qb: &mut QueryBuilder<'static, Sqlite>, value: Value) {
    match value {
        Value::Text(v) => qb.push_bind(v),
        Value::Integer(v) => qb.push_bind(v),
        Value::Real(v) => qb.push_bind(v),
        Value::Timestamp(v) => qb.push_bind(v),
    };
}

/// One condition of a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = ?`
    Equal { column: &'static str, value: Value },
    /// `column IS NULL`
    IsNull(&'static str),
    /// Case-insensitive literal prefix match, folding ASCII only
    Prefix { column: &'static str, prefix: String },
    /// Literal prefix match against a column that stores Unicode-lowercased text
    FoldedPrefix { column: &'static str, prefix: String },
    /// `(a = ? OR b = ? ...)`
    AnyEqual(Vec<(&'static str, Value)>),
}

/// Conjunction of predicates. An empty filter matches every row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn equal(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Equal {
            column,
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn equal_many<I, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, V)>,
        V: Into<Value>,
    {
        for (column, value) in pairs {
            self = self.equal(column, value);
        }
        self
    }

    #[must_use]
    pub fn is_null(mut self, column: &'static str) -> Self {
        self.predicates.push(Predicate::IsNull(column));
        self
    }

    /// Add `is_null(column)` only when `condition` holds.
    #[must_use]
    pub fn is_null_if(self, condition: bool, column: &'static str) -> Self {
        if condition { self.is_null(column) } else { self }
    }

    #[must_use]
    pub fn prefix(mut self, column: &'static str, prefix: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Prefix {
            column,
            prefix: prefix.into(),
        });
        self
    }

    /// Prefix match against `folded`, a shadow column holding the
    /// Unicode-lowercased text of another column.
    #[must_use]
    pub fn folded_prefix(mut self, folded: &'static str, prefix: &str) -> Self {
        self.predicates.push(Predicate::FoldedPrefix {
            column: folded,
            prefix: prefix.to_lowercase(),
        });
        self
    }

    #[must_use]
    pub fn any_equal(mut self, pairs: Vec<(&'static str, Value)>) -> Self {
        self.predicates.push(Predicate::AnyEqual(pairs));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    fn push_where(&self, qb: &mut QueryBuilder<'static, Sqlite>) {
        if self.predicates.is_empty() {
            return;
        }
        qb.push(" WHERE ");
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                qb.push(" AND ");
            }
            match predicate {
                Predicate::Equal { column, value } => {
                    qb.push(*column).push(" = ");
                    push_value(qb, value.clone());
                }
                Predicate::IsNull(column) => {
                    qb.push(*column).push(" IS NULL");
                }
                Predicate::Prefix { column, prefix } => {
                    qb.push("lower(")
                        .push(*column)
                        .push(") LIKE lower(")
                        .push_bind(like_prefix(prefix))
                        .push(") ESCAPE '\\'");
                }
                Predicate::FoldedPrefix { column, prefix } => {
                    qb.push(*column)
                        .push(" LIKE ")
                        .push_bind(like_prefix(prefix))
                        .push(" ESCAPE '\\'");
                }
                Predicate::AnyEqual(pairs) if pairs.is_empty() => {
                    qb.push("0 = 1");
                }
                Predicate::AnyEqual(pairs) => {
                    qb.push("(");
                    for (j, (column, value)) in pairs.iter().enumerate() {
                        if j > 0 {
                            qb.push(" OR ");
                        }
                        qb.push(*column).push(" = ");
                        push_value(qb, value.clone());
                    }
                    qb.push(")");
                }
            }
        }
    }
}

/// Turn a literal prefix into a LIKE pattern with `\` as escape character.
pub fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// LIMIT/OFFSET window of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Window for 1-based `page` of size `limit`.
    ///
    /// Returns `None` (no window, the full set) unless both are at least 1.
    pub fn from_page(page: i64, limit: i64) -> Option<Self> {
        if page >= 1 && limit >= 1 {
            Some(Self {
                limit,
                offset: limit.saturating_mul(page - 1),
            })
        } else {
            None
        }
    }

    /// Window holding only the first row.
    pub fn first() -> Self {
        Self {
            limit: 1,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: &'static str,
    pub direction: Direction,
}

/// ORDER BY clause built from resolved column names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderBy {
    terms: Vec<OrderTerm>,
}

impl OrderBy {
    /// Parse `column [asc|desc], ...`, resolving each column through `resolve`.
    ///
    /// Blank input yields an empty ordering.
    pub fn parse<F>(raw: &str, resolve: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> StorageResult<&'static str>,
    {
        let mut terms = Vec::new();
        for part in raw.split(',') {
            let mut tokens = part.split_whitespace();
            let Some(name) = tokens.next() else {
                continue;
            };
            let column = resolve(name)?;
            let direction = match tokens.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => Direction::Asc,
                Some("desc") => Direction::Desc,
                Some(other) => {
                    return Err(StorageError::QueryConstruction(format!(
                        "invalid sort direction '{}' for column '{}'",
                        other, name
                    )));
                }
            };
            if tokens.next().is_some() {
                return Err(StorageError::QueryConstruction(format!(
                    "malformed ordering term '{}'",
                    part.trim()
                )));
            }
            terms.push(OrderTerm { column, direction });
        }
        Ok(Self { terms })
    }

    pub fn asc(column: &'static str) -> Self {
        Self {
            terms: vec![OrderTerm {
                column,
                direction: Direction::Asc,
            }],
        }
    }

    /// Append an ascending term unless `column` is already ordered on.
    #[must_use]
    pub fn then(mut self, column: &'static str) -> Self {
        if !self.terms.iter().any(|t| t.column == column) {
            self.terms.push(OrderTerm {
                column,
                direction: Direction::Asc,
            });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[OrderTerm] {
        &self.terms
    }

    fn push_order(&self, qb: &mut QueryBuilder<'static, Sqlite>) {
        if self.terms.is_empty() {
            return;
        }
        qb.push(" ORDER BY ");
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(term.column).push(" ").push(term.direction.as_sql());
        }
    }
}

/// `SELECT columns FROM table [WHERE ..] [ORDER BY ..] [LIMIT ? OFFSET ?]`
pub fn select(
    table: &'static str,
    columns: &[&'static str],
    filter: &Filter,
    order: &OrderBy,
    page: Option<Pagination>,
) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(columns.join(", ")).push(" FROM ").push(table);
    filter.push_where(&mut qb);
    order.push_order(&mut qb);
    if let Some(page) = page {
        qb.push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
    }
    qb
}

/// `SELECT COUNT(*) FROM table [WHERE ..]`
pub fn count(table: &'static str, filter: &Filter) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM ");
    qb.push(table);
    filter.push_where(&mut qb);
    qb
}

/// `INSERT INTO table (..) VALUES (..)`
pub fn insert(
    table: &'static str,
    values: Assignments,
) -> StorageResult<QueryBuilder<'static, Sqlite>> {
    if values.is_empty() {
        return Err(StorageError::QueryConstruction(format!(
            "insert into {} without columns",
            table
        )));
    }

    let columns: Vec<&'static str> = values.iter().map(|(c, _)| *c).collect();

    let mut qb = QueryBuilder::new("INSERT INTO ");
    qb.push(table)
        .push(" (")
        .push(columns.join(", "))
        .push(") VALUES (");
    for (i, (_, value)) in values.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_value(&mut qb, value);
    }
    qb.push(")");
    Ok(qb)
}

/// Advance the named counter in `sequences` and return its new value.
///
/// Counters only move forward, so a value is never handed out twice even
/// after the row that received it is hard-deleted. Yields no row for an
/// unknown name.
pub fn next_sequence(name: &'static str) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new("UPDATE sequences SET value = value + 1 WHERE name = ");
    qb.push_bind(name).push(" RETURNING value");
    qb
}

/// `UPDATE table SET .. [WHERE ..]`
pub fn update(
    table: &'static str,
    values: Assignments,
    filter: &Filter,
) -> StorageResult<QueryBuilder<'static, Sqlite>> {
    if values.is_empty() {
        return Err(StorageError::QueryConstruction(format!(
            "update of {} without assignments",
            table
        )));
    }

    let mut qb = QueryBuilder::new("UPDATE ");
    qb.push(table).push(" SET ");
    for (i, (column, value)) in values.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(column).push(" = ");
        push_value(&mut qb, value);
    }
    filter.push_where(&mut qb);
    Ok(qb)
}

/// `DELETE FROM table [WHERE ..]`
pub fn delete(table: &'static str, filter: &Filter) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new("DELETE FROM ");
    qb.push(table);
    filter.push_where(&mut qb);
    qb
}
