use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// Which rows a read operation may see.
///
/// A record is live while its `deleted_at` column is unset. Reads default to
/// the live subset; callers opt into soft-deleted rows with [`Visibility::All`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only rows whose `deleted_at` is unset
    #[default]
    Live,
    /// Live and soft-deleted rows
    All,
}

impl Visibility {
    /// Map the boolean "include deleted" flag used by request payloads.
    #[inline]
    #[must_use]
    pub const fn from_include_deleted(include_deleted: bool) -> Self {
        if include_deleted { Self::All } else { Self::Live }
    }

    #[inline]
    #[must_use]
    pub const fn includes_deleted(self) -> bool {
        matches!(self, Self::All)
    }
}

/// How a delete removes matching rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Stamp `deleted_at` on live rows; the row stays readable with [`Visibility::All`]
    #[default]
    Soft,
    /// Remove the row, whatever its state
    Hard,
}

impl DeleteMode {
    #[inline]
    #[must_use]
    pub const fn from_hard_flag(hard: bool) -> Self {
        if hard { Self::Hard } else { Self::Soft }
    }

    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for DeleteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeleteMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            other => Err(Error::InvalidDeleteMode(other.to_string())),
        }
    }
}

/// Parameters of a filtered, paginated listing.
///
/// * `page`/`limit` - pagination applies only when both are at least 1
/// * `field`/`value` - case-insensitive prefix filter, skipped when `value` is empty
/// * `order_by` - comma-separated `column [asc|desc]` terms, empty for default order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    pub page: i64,
    pub limit: i64,
    pub visibility: Visibility,
    pub field: String,
    pub value: String,
    pub order_by: String,
}

impl ListRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn page(mut self, page: i64, limit: i64) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub fn prefix(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.field = field.into();
        self.value = value.into();
        self
    }

    #[must_use]
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = order_by.into();
        self
    }
}

/// Identifies the record(s) whose credential is being rotated.
///
/// Each provided column is an alternative: a row matches when any of them
/// matches. Blank values are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSelector {
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

impl CredentialSelector {
    #[must_use]
    pub fn by_phone(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: Some(phone_number.into()),
            email: None,
        }
    }

    #[must_use]
    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            phone_number: None,
            email: Some(email.into()),
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Column/value pairs that carry a non-blank value, in column order.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("email", self.email.as_deref()),
            ("phone_number", self.phone_number.as_deref()),
        ]
        .into_iter()
        .filter_map(|(column, value)| match value {
            Some(v) if !v.trim().is_empty() => Some((column, v)),
            _ => None,
        })
        .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs().is_empty()
    }
}

impl fmt::Display for CredentialSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .pairs()
            .into_iter()
            .map(|(column, value)| format!("{column}={value}"))
            .collect();
        f.write_str(&rendered.join(" OR "))
    }
}
