//! Wire shapes handed to the request layer.
//!
//! Timestamps travel as RFC 3339 strings and an unset timestamp becomes the
//! empty string. Stored image references are object keys; views expand them
//! to public URLs through an explicit [`ObjectStorage`] value.

use chrono::{DateTime, SecondsFormat, Utc};
use roster_storage::{Staff, Subject};
use serde::Serialize;

/// Render an optional timestamp, `""` when unset.
pub fn render_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Location of the bucket holding record images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStorage {
    pub endpoint: String,
    pub bucket: String,
}

impl ObjectStorage {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
        }
    }

    /// `endpoint/bucket/key`. Empty keys yield an empty string.
    pub fn public_url(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return String::new();
        }
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket.trim_matches('/'),
            key
        )
    }

    /// Object key of a stored URL: its last path segment.
    pub fn object_key(url: &str) -> &str {
        url.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
    }

    fn image(&self, image_url: Option<&str>) -> String {
        image_url.map(|key| self.public_url(key)).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectView {
    pub id: String,
    pub display_order: i64,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub phone_number: String,
    pub gender: String,
    pub image_url: String,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: String,
    pub count: i64,
}

impl SubjectView {
    pub fn new(subject: &Subject, storage: &ObjectStorage) -> Self {
        Self {
            id: subject.id.clone(),
            display_order: subject.display_order,
            first_name: subject.first_name.clone(),
            last_name: subject.last_name.clone(),
            birth_date: subject.birth_date.clone().unwrap_or_default(),
            phone_number: subject.phone_number.clone(),
            gender: subject.gender.clone(),
            image_url: storage.image(subject.image_url.as_deref()),
            created_at: render_timestamp(Some(subject.created_at)),
            updated_at: render_timestamp(subject.updated_at),
            deleted_at: render_timestamp(subject.deleted_at),
            count: subject.count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffView {
    pub id: String,
    pub display_order: i64,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub phone_number: String,
    pub email: String,
    pub role: String,
    pub gender: String,
    pub salary: f64,
    pub biography: String,
    pub start_work_year: String,
    pub end_work_year: String,
    pub work_years: i64,
    pub image_url: String,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: String,
    pub count: i64,
}

impl StaffView {
    pub fn new(staff: &Staff, storage: &ObjectStorage) -> Self {
        Self {
            id: staff.id.clone(),
            display_order: staff.display_order,
            first_name: staff.first_name.clone(),
            last_name: staff.last_name.clone(),
            birth_date: staff.birth_date.clone().unwrap_or_default(),
            phone_number: staff.phone_number.clone(),
            email: staff.email.clone().unwrap_or_default(),
            role: staff.role.clone(),
            gender: staff.gender.clone(),
            salary: staff.salary,
            biography: staff.biography.clone(),
            start_work_year: staff.start_work_year.clone().unwrap_or_default(),
            end_work_year: staff.end_work_year.clone().unwrap_or_default(),
            work_years: staff.work_years,
            image_url: storage.image(staff.image_url.as_deref()),
            created_at: render_timestamp(Some(staff.created_at)),
            updated_at: render_timestamp(staff.updated_at),
            deleted_at: render_timestamp(staff.deleted_at),
            count: staff.count,
        }
    }
}
