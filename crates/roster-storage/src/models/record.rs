use sqlx::FromRow;
use sqlx::sqlite::SqliteRow;

use crate::error::{StorageError, StorageResult};
use crate::query::{Assignments, Value};

/// Per-kind capabilities the generic store needs.
///
/// A kind declares its table, the columns it may be read and filtered by,
/// which of them an update may overwrite and which identify a row for
/// credential rotation. Everything the store builds from caller-supplied
/// field names is resolved through [`Record::column`] first.
pub trait Record: for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static {
    /// Kind name used in errors and log fields
    const KIND: &'static str;

    const TABLE: &'static str;

    /// Persisted columns, in select order
    const COLUMNS: &'static [&'static str];

    /// Columns an update writes, excluding `updated_at`
    const MUTABLE: &'static [&'static str];

    /// Columns that may select a row for credential rotation
    const CREDENTIAL_COLUMNS: &'static [&'static str];

    /// `(column, shadow)` pairs. The shadow column holds the Unicode-lowercased
    /// text of its column and backs prefix search.
    const FOLDED: &'static [(&'static str, &'static str)] = &[];

    /// Columns that are stored and returned but never usable as a filter,
    /// lookup key or ordering
    const SECRET_COLUMNS: &'static [&'static str] = &["password", "refresh_token"];

    const ID_COLUMN: &'static str = "id";
    const ORDER_COLUMN: &'static str = "display_order";
    const UPDATED_AT_COLUMN: &'static str = "updated_at";
    const DELETED_AT_COLUMN: &'static str = "deleted_at";
    const PASSWORD_COLUMN: &'static str = "password";
    const REFRESH_TOKEN_COLUMN: &'static str = "refresh_token";

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Values written by create. Store-assigned columns are left out.
    fn insert_values(&self) -> Assignments;

    /// Values written by update, one per [`Record::MUTABLE`] column.
    fn update_values(&self) -> Assignments;

    /// Attach the total match count of a listing.
    fn set_count(&mut self, count: i64);

    /// Resolve a caller-supplied field name to a known, non-secret column.
    fn column(name: &str) -> StorageResult<&'static str> {
        let name = name.trim();
        Self::COLUMNS
            .iter()
            .copied()
            .filter(|c| !Self::SECRET_COLUMNS.contains(c))
            .find(|c| *c == name)
            .ok_or_else(|| StorageError::unknown_field(Self::KIND, name))
    }

    /// Shadow column holding the folded text of `column`, if any.
    fn folded(column: &str) -> Option<&'static str> {
        Self::FOLDED
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, shadow)| *shadow)
    }

    /// Append the shadow value of every folded column present in `values`.
    fn with_folded(mut values: Assignments) -> Assignments {
        let mut shadows = Vec::new();
        for (column, value) in &values {
            let Some(shadow) = Self::folded(column) else {
                continue;
            };
            let folded = match value {
                Value::Text(text) => text.as_deref().unwrap_or_default().to_lowercase(),
                _ => continue,
            };
            shadows.push((shadow, Value::from(folded)));
        }
        values.extend(shadows);
        values
    }
}
