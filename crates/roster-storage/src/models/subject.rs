use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Record;
use crate::query::{Assignments, Value};

/// Primary user of the system.
///
/// # Fields
///
/// * `id` - Caller-assigned identifier, immutable once stored
/// * `display_order` - Position assigned by the store on insert, strictly increasing
/// * `first_name`, `last_name` - Display names
/// * `birth_date` - Free-form date text, `None` when unknown
/// * `phone_number` - Login handle, selects the row for credential rotation
/// * `password` - Opaque credential, stored as given
/// * `gender` - Free-form text
/// * `refresh_token` - Opaque session token, replaced by token rotation
/// * `image_url` - Object key or URL of the profile image
/// * `created_at` - Set by the database on insert
/// * `updated_at` - Set by update; credential and token rotation leave it alone
/// * `deleted_at` - Set by soft delete; the row is live while this is `None`
/// * `count` - Total matches of the listing that produced this record (not persisted)
///
/// # Examples
///
/// ```
/// use roster_storage::models::Subject;
///
/// let subject: Subject = serde_json::from_str(
///     r#"{"id":"u1","first_name":"Ann","phone_number":"+100"}"#,
/// ).unwrap();
///
/// assert_eq!(subject.id, "u1");
/// assert!(subject.is_live());
/// assert!(subject.image_url.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub struct Subject {
    pub id: String,
    pub display_order: i64,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<String>,
    pub phone_number: String,
    pub password: String,
    pub gender: String,
    pub refresh_token: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    pub count: i64,
}

impl Subject {
    /// Whether the record is visible to default reads
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

impl Record for Subject {
    const KIND: &'static str = "Subject";
    const TABLE: &'static str = "subjects";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "display_order",
        "first_name",
        "last_name",
        "birth_date",
        "phone_number",
        "password",
        "gender",
        "refresh_token",
        "image_url",
        "created_at",
        "updated_at",
        "deleted_at",
    ];
    const MUTABLE: &'static [&'static str] =
        &["first_name", "last_name", "birth_date", "gender", "image_url"];
    const CREDENTIAL_COLUMNS: &'static [&'static str] = &["phone_number"];
    const FOLDED: &'static [(&'static str, &'static str)] = &[
        ("first_name", "first_name_folded"),
        ("last_name", "last_name_folded"),
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn insert_values(&self) -> Assignments {
        vec![
            ("id", Value::from(&self.id)),
            ("first_name", Value::from(&self.first_name)),
            ("last_name", Value::from(&self.last_name)),
            ("birth_date", Value::from(&self.birth_date)),
            ("phone_number", Value::from(&self.phone_number)),
            ("password", Value::from(&self.password)),
            ("gender", Value::from(&self.gender)),
            ("refresh_token", Value::from(&self.refresh_token)),
            ("image_url", Value::from(&self.image_url)),
        ]
    }

    fn update_values(&self) -> Assignments {
        vec![
            ("first_name", Value::from(&self.first_name)),
            ("last_name", Value::from(&self.last_name)),
            ("birth_date", Value::from(&self.birth_date)),
            ("gender", Value::from(&self.gender)),
            ("image_url", Value::from(&self.image_url)),
        ]
    }

    fn set_count(&mut self, count: i64) {
        self.count = count;
    }
}
