use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Record;
use crate::query::{Assignments, Value};

/// Administrative staff member.
///
/// Shares the lifecycle columns of [`Subject`](super::Subject) and adds
/// employment data. A staff credential is selected by `email` or
/// `phone_number`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub struct Staff {
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
    /// Role name, opaque to the store
    pub role: String,
    pub email: Option<String>,
    pub salary: f64,
    pub biography: String,
    pub start_work_year: Option<String>,
    pub end_work_year: Option<String>,
    pub work_years: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    pub count: i64,
}

impl Staff {
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

impl Record for Staff {
    const KIND: &'static str = "Staff";
    const TABLE: &'static str = "staff";
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
        "role",
        "email",
        "salary",
        "biography",
        "start_work_year",
        "end_work_year",
        "work_years",
        "created_at",
        "updated_at",
        "deleted_at",
    ];
    const MUTABLE: &'static [&'static str] = &[
        "first_name",
        "last_name",
        "birth_date",
        "gender",
        "salary",
        "biography",
        "start_work_year",
        "end_work_year",
        "work_years",
        "image_url",
    ];
    const CREDENTIAL_COLUMNS: &'static [&'static str] = &["email", "phone_number"];
    const FOLDED: &'static [(&'static str, &'static str)] = &[
        ("first_name", "first_name_folded"),
        ("last_name", "last_name_folded"),
        ("role", "role_folded"),
        ("email", "email_folded"),
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
            ("role", Value::from(&self.role)),
            ("email", Value::from(&self.email)),
            ("salary", Value::from(self.salary)),
            ("biography", Value::from(&self.biography)),
            ("start_work_year", Value::from(&self.start_work_year)),
            ("end_work_year", Value::from(&self.end_work_year)),
            ("work_years", Value::from(self.work_years)),
        ]
    }

    fn update_values(&self) -> Assignments {
        vec![
            ("first_name", Value::from(&self.first_name)),
            ("last_name", Value::from(&self.last_name)),
            ("birth_date", Value::from(&self.birth_date)),
            ("gender", Value::from(&self.gender)),
            ("salary", Value::from(self.salary)),
            ("biography", Value::from(&self.biography)),
            ("start_work_year", Value::from(&self.start_work_year)),
            ("end_work_year", Value::from(&self.end_work_year)),
            ("work_years", Value::from(self.work_years)),
            ("image_url", Value::from(&self.image_url)),
        ]
    }

    fn set_count(&mut self, count: i64) {
        self.count = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_values_follow_whitelist() {
        let columns: Vec<&str> = Staff::default()
            .update_values()
            .into_iter()
            .map(|(c, _)| c)
            .collect();
        assert_eq!(columns, Staff::MUTABLE);
    }

    #[test]
    fn test_role_and_email_are_not_mutable() {
        assert!(!Staff::MUTABLE.contains(&"role"));
        assert!(!Staff::MUTABLE.contains(&"email"));
        assert!(!Staff::MUTABLE.contains(&"phone_number"));
    }

    #[test]
    fn test_credential_columns_resolve() {
        for column in Staff::CREDENTIAL_COLUMNS {
            assert_eq!(Staff::column(column).unwrap(), *column);
        }
    }

    #[test]
    fn test_missing_email_folds_to_empty() {
        let values = Staff::with_folded(Staff::default().insert_values());
        assert!(values.contains(&("email_folded", Value::from(""))));
        assert!(values.contains(&("role_folded", Value::from(""))));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let staff: Staff =
            serde_json::from_str(r#"{"id":"s1","email":"a@example.com","salary":1200.5}"#)
                .unwrap();
        assert_eq!(staff.email.as_deref(), Some("a@example.com"));
        assert_eq!(staff.salary, 1200.5);
        assert_eq!(staff.work_years, 0);
        assert!(staff.is_live());
    }
}
