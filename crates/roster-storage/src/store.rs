use std::future::Future;
use std::marker::PhantomData;

use chrono::Utc;
use roster_core::{CredentialSelector, DeleteMode, ListRequest, Visibility};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::models::{Record, Staff, Subject};
use crate::query::{self, Filter, OrderBy, Pagination, Value};

/// Soft-delete-aware persistence contract shared by every record kind.
///
/// Field names given to [`get`](Self::get), [`list`](Self::list),
/// [`delete`](Self::delete) and [`check_field`](Self::check_field) must be
/// columns of the record kind other than its secret columns (password and
/// refresh token); anything else fails with [`StorageError::UnknownField`]
/// before a statement is built.
///
/// Methods return `Send` futures so callers can wrap them in timeouts and
/// spawn them on a multi-threaded runtime.
pub trait EntityStore: Send + Sync {
    type Record: Record + Clone;

    /// Insert a new record. The store assigns `display_order`; the database
    /// assigns `created_at`.
    fn create(&self, record: &Self::Record) -> impl Future<Output = StorageResult<()>> + Send;

    /// First record whose `field` equals `value`.
    fn get(
        &self,
        field: &str,
        value: &str,
        visibility: Visibility,
    ) -> impl Future<Output = StorageResult<Self::Record>> + Send;

    /// One page of records, each carrying the total match count.
    fn list(
        &self,
        request: &ListRequest,
    ) -> impl Future<Output = StorageResult<Vec<Self::Record>>> + Send;

    /// Overwrite the whitelisted columns of the live record with the same id.
    fn update(&self, record: &Self::Record) -> impl Future<Output = StorageResult<()>> + Send;

    /// Remove (hard) or retire (soft) matching records. `true` if any row changed.
    fn delete(
        &self,
        field: &str,
        value: &str,
        mode: DeleteMode,
    ) -> impl Future<Output = StorageResult<bool>> + Send;

    /// Whether a live record has `field` equal to `value`.
    fn check_field(&self, field: &str, value: &str)
    -> impl Future<Output = StorageResult<bool>> + Send;

    /// Replace the password of live records matching any selector column.
    fn change_credential(
        &self,
        selector: &CredentialSelector,
        password: &str,
    ) -> impl Future<Output = StorageResult<bool>> + Send;

    /// Replace the refresh token of the live record with this id.
    fn update_refresh_token(
        &self,
        id: &str,
        token: &str,
    ) -> impl Future<Output = StorageResult<bool>> + Send;
}

/// SQLite implementation of [`EntityStore`], generic over the record kind.
pub struct SqliteStore<R> {
    pool: SqlitePool,
    _record: PhantomData<fn() -> R>,
}

/// Store for [`Subject`] records
pub type SubjectStore = SqliteStore<Subject>;

/// Store for [`Staff`] records
pub type StaffStore = SqliteStore<Staff>;

impl<R: Record> SqliteStore<R> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn visible(visibility: Visibility) -> Filter {
        Filter::new().is_null_if(!visibility.includes_deleted(), R::DELETED_AT_COLUMN)
    }
}

impl<R> Clone for SqliteStore<R> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _record: PhantomData,
        }
    }
}

impl<R> std::fmt::Debug for SqliteStore<R>
where
    R: Record,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("kind", &R::KIND)
            .field("table", &R::TABLE)
            .finish()
    }
}

impl<R: Record + Clone> EntityStore for SqliteStore<R> {
    type Record = R;

    async fn create(&self, record: &R) -> StorageResult<()> {
        // A failed insert rolls the counter back with it.
        let mut tx = self.pool.begin().await?;

        let display_order = query::next_sequence(R::TABLE)
            .build_query_scalar::<i64>()
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                StorageError::Configuration(format!("no display_order counter for {}", R::TABLE))
            })?;

        let mut values = R::with_folded(record.insert_values());
        values.push((R::ORDER_COLUMN, Value::from(display_order)));
        let mut qb = query::insert(R::TABLE, values)?;
        qb.build().execute(&mut *tx).await?;

        tx.commit().await?;

        debug!(kind = R::KIND, id = %record.id(), display_order, "record created");
        Ok(())
    }

    async fn get(&self, field: &str, value: &str, visibility: Visibility) -> StorageResult<R> {
        let column = R::column(field)?;
        let filter = Self::visible(visibility).equal(column, value);

        let mut qb = query::select(
            R::TABLE,
            R::COLUMNS,
            &filter,
            &OrderBy::asc(R::ORDER_COLUMN),
            Some(Pagination::first()),
        );

        qb.build_query_as::<R>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::not_found(R::KIND, column, value))
    }

    async fn list(&self, request: &ListRequest) -> StorageResult<Vec<R>> {
        let mut filter = Self::visible(request.visibility);
        if !request.value.is_empty() {
            let column = R::column(&request.field)?;
            filter = match R::folded(column) {
                Some(shadow) => filter.folded_prefix(shadow, &request.value),
                None => filter.prefix(column, request.value.as_str()),
            };
        }

        let order = OrderBy::parse(&request.order_by, R::column)?;
        let order = if order.is_empty() {
            OrderBy::asc(R::ORDER_COLUMN)
        } else {
            order.then(R::ID_COLUMN)
        };

        let mut page_qb = query::select(
            R::TABLE,
            R::COLUMNS,
            &filter,
            &order,
            Pagination::from_page(request.page, request.limit),
        );
        let mut records = page_qb.build_query_as::<R>().fetch_all(&self.pool).await?;

        // Second round-trip: the count and the page do not share a snapshot.
        let mut count_qb = query::count(R::TABLE, &filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        for record in &mut records {
            record.set_count(total);
        }

        debug!(
            kind = R::KIND,
            returned = records.len(),
            total,
            "records listed"
        );
        Ok(records)
    }

    async fn update(&self, record: &R) -> StorageResult<()> {
        let mut values = R::with_folded(record.update_values());
        values.push((R::UPDATED_AT_COLUMN, Value::from(Utc::now())));

        let filter = Filter::new()
            .equal(R::ID_COLUMN, record.id())
            .is_null(R::DELETED_AT_COLUMN);

        let mut qb = query::update(R::TABLE, values, &filter)?;
        let result = qb.build().execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(R::KIND, R::ID_COLUMN, record.id()));
        }

        debug!(kind = R::KIND, id = %record.id(), "record updated");
        Ok(())
    }

    async fn delete(&self, field: &str, value: &str, mode: DeleteMode) -> StorageResult<bool> {
        let column = R::column(field)?;
        let filter = Filter::new().equal(column, value);

        let mut qb = match mode {
            DeleteMode::Soft => query::update(
                R::TABLE,
                vec![(R::DELETED_AT_COLUMN, Value::from(Utc::now()))],
                &filter.is_null(R::DELETED_AT_COLUMN),
            )?,
            DeleteMode::Hard => query::delete(R::TABLE, &filter),
        };
        let result = qb.build().execute(&self.pool).await?;

        debug!(
            kind = R::KIND,
            field = column,
            %mode,
            rows = result.rows_affected(),
            "records deleted"
        );
        Ok(result.rows_affected() > 0)
    }

    async fn check_field(&self, field: &str, value: &str) -> StorageResult<bool> {
        let column = R::column(field)?;
        let filter = Self::visible(Visibility::Live).equal(column, value);

        let mut qb = query::count(R::TABLE, &filter);
        let matches = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok(matches > 0)
    }

    async fn change_credential(
        &self,
        selector: &CredentialSelector,
        password: &str,
    ) -> StorageResult<bool> {
        let pairs = selector.pairs();
        if pairs.is_empty() {
            return Err(StorageError::QueryConstruction(
                "credential selector carries no value".to_string(),
            ));
        }

        let columns: Vec<&'static str> = pairs.iter().map(|(column, _)| *column).collect();
        let mut alternatives = Vec::with_capacity(pairs.len());
        for (column, value) in pairs {
            if !R::CREDENTIAL_COLUMNS.contains(&column) {
                return Err(StorageError::unknown_field(R::KIND, column));
            }
            alternatives.push((column, Value::from(value)));
        }

        let filter = Filter::new()
            .any_equal(alternatives)
            .is_null(R::DELETED_AT_COLUMN);
        let mut qb = query::update(
            R::TABLE,
            vec![(R::PASSWORD_COLUMN, Value::from(password))],
            &filter,
        )?;
        let result = qb.build().execute(&self.pool).await?;

        debug!(
            kind = R::KIND,
            selector = ?columns,
            rows = result.rows_affected(),
            "credential changed"
        );
        Ok(result.rows_affected() > 0)
    }

    async fn update_refresh_token(&self, id: &str, token: &str) -> StorageResult<bool> {
        let filter = Filter::new()
            .equal(R::ID_COLUMN, id)
            .is_null(R::DELETED_AT_COLUMN);
        let mut qb = query::update(
            R::TABLE,
            vec![(R::REFRESH_TOKEN_COLUMN, Value::from(token))],
            &filter,
        )?;
        let result = qb.build().execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;

    async fn subject_store() -> (Database, SubjectStore) {
        let db = Database::in_memory().await.unwrap();
        let store = SubjectStore::new(db.pool().clone());
        (db, store)
    }

    fn subject(id: &str, first_name: &str, phone: &str) -> Subject {
        Subject {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: "Doe".to_string(),
            phone_number: phone.to_string(),
            password: "secret".to_string(),
            gender: "f".to_string(),
            refresh_token: "tok-1".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (db, store) = subject_store().await;

        store.create(&subject("u1", "Ann", "+100")).await.unwrap();

        let found = store.get("id", "u1", Visibility::Live).await.unwrap();
        assert_eq!(found.first_name, "Ann");
        assert_eq!(found.display_order, 1);
        assert!(found.updated_at.is_none());
        assert!(found.deleted_at.is_none());
        assert_eq!(found.count, 0);

        db.close().await;
    }

    #[tokio::test]
    async fn test_display_order_increases() {
        let (db, store) = subject_store().await;

        store.create(&subject("u1", "Ann", "+100")).await.unwrap();
        store.create(&subject("u2", "Bob", "+200")).await.unwrap();

        let first = store.get("id", "u1", Visibility::Live).await.unwrap();
        let second = store.get("id", "u2", Visibility::Live).await.unwrap();
        assert!(second.display_order > first.display_order);

        db.close().await;
    }

    #[tokio::test]
    async fn test_duplicate_id_is_constraint_violation() {
        let (db, store) = subject_store().await;

        store.create(&subject("u1", "Ann", "+100")).await.unwrap();
        let err = store.create(&subject("u1", "Ann", "+100")).await.unwrap_err();

        assert!(err.is_constraint_violation(), "{err:?}");
        db.close().await;
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (db, store) = subject_store().await;

        let err = store.get("id", "nope", Visibility::All).await.unwrap_err();
        assert!(err.is_not_found());

        db.close().await;
    }

    #[tokio::test]
    async fn test_unknown_field_is_rejected_before_query() {
        let (db, store) = subject_store().await;

        let err = store
            .get("id = id OR 1", "x", Visibility::Live)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownField { .. }));

        let err = store.check_field("salary", "1").await.unwrap_err();
        assert!(matches!(err, StorageError::UnknownField { .. }));

        db.close().await;
    }

    #[tokio::test]
    async fn test_secret_columns_are_not_addressable() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Ann", "+100")).await.unwrap();

        let err = store
            .get("password", "secret", Visibility::Live)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownField { .. }));

        let err = store
            .list(&ListRequest::new().prefix("password", "s"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownField { .. }));

        let err = store
            .list(&ListRequest::new().order_by("refresh_token"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownField { .. }));

        let err = store
            .delete("refresh_token", "tok-1", DeleteMode::Hard)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownField { .. }));
        assert!(store.check_field("id", "u1").await.unwrap());

        db.close().await;
    }

    #[tokio::test]
    async fn test_update_applies_whitelist_and_stamps_updated_at() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Ann", "+100")).await.unwrap();

        let mut changed = subject("u1", "Anna", "+999");
        changed.password = "other".to_string();
        changed.refresh_token = "other".to_string();
        changed.image_url = Some("avatar.png".to_string());
        store.update(&changed).await.unwrap();

        let found = store.get("id", "u1", Visibility::Live).await.unwrap();
        assert_eq!(found.first_name, "Anna");
        assert_eq!(found.image_url.as_deref(), Some("avatar.png"));
        assert_eq!(found.phone_number, "+100");
        assert_eq!(found.password, "secret");
        assert_eq!(found.refresh_token, "tok-1");
        assert!(found.updated_at.is_some());

        db.close().await;
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (db, store) = subject_store().await;

        let err = store.update(&subject("ghost", "G", "+0")).await.unwrap_err();
        assert!(err.is_not_found());

        db.close().await;
    }

    #[tokio::test]
    async fn test_soft_delete_hides_record() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Ann", "+100")).await.unwrap();

        assert!(store.delete("id", "u1", DeleteMode::Soft).await.unwrap());

        assert!(
            store
                .get("id", "u1", Visibility::Live)
                .await
                .unwrap_err()
                .is_not_found()
        );
        let retired = store.get("id", "u1", Visibility::All).await.unwrap();
        assert!(retired.deleted_at.is_some());
        assert!(!store.check_field("id", "u1").await.unwrap());

        // A second soft delete finds no live row.
        assert!(!store.delete("id", "u1", DeleteMode::Soft).await.unwrap());

        db.close().await;
    }

    #[tokio::test]
    async fn test_hard_delete_after_soft_delete() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Ann", "+100")).await.unwrap();

        store.delete("id", "u1", DeleteMode::Soft).await.unwrap();
        assert!(store.delete("id", "u1", DeleteMode::Hard).await.unwrap());
        for visibility in [Visibility::Live, Visibility::All] {
            assert!(
                store
                    .get("id", "u1", visibility)
                    .await
                    .unwrap_err()
                    .is_not_found()
            );
        }
        assert!(!store.delete("id", "u1", DeleteMode::Hard).await.unwrap());

        db.close().await;
    }

    #[tokio::test]
    async fn test_display_order_not_reused_after_hard_delete() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Ann", "+1")).await.unwrap();
        store.create(&subject("u2", "Bob", "+2")).await.unwrap();
        let removed = store.get("id", "u2", Visibility::Live).await.unwrap();

        store.delete("id", "u2", DeleteMode::Hard).await.unwrap();
        store.create(&subject("u3", "Cid", "+3")).await.unwrap();

        let added = store.get("id", "u3", Visibility::Live).await.unwrap();
        assert!(added.display_order > removed.display_order);

        db.close().await;
    }

    #[tokio::test]
    async fn test_failed_create_does_not_consume_display_order() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Ann", "+1")).await.unwrap();
        assert!(store.create(&subject("u1", "Ann", "+1")).await.is_err());
        store.create(&subject("u2", "Bob", "+2")).await.unwrap();

        let second = store.get("id", "u2", Visibility::Live).await.unwrap();
        assert_eq!(second.display_order, 2);

        db.close().await;
    }

    #[tokio::test]
    async fn test_update_of_soft_deleted_is_not_found() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Ann", "+100")).await.unwrap();
        store.delete("id", "u1", DeleteMode::Soft).await.unwrap();

        let err = store.update(&subject("u1", "Anna", "+100")).await.unwrap_err();
        assert!(err.is_not_found());

        db.close().await;
    }

    #[tokio::test]
    async fn test_list_prefix_filter_and_count() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Alice", "+1")).await.unwrap();
        store.create(&subject("u2", "alfred", "+2")).await.unwrap();
        store.create(&subject("u3", "Bob", "+3")).await.unwrap();

        let req = ListRequest::new().prefix("first_name", "AL");
        let records = store.list(&req).await.unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);
        assert!(records.iter().all(|r| r.count == 2));

        db.close().await;
    }

    #[tokio::test]
    async fn test_list_prefix_folds_unicode_case() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Алиса", "+1")).await.unwrap();
        store.create(&subject("u2", "Ömer", "+2")).await.unwrap();
        store.create(&subject("u3", "Борис", "+3")).await.unwrap();

        for (prefix, id) in [("ал", "u1"), ("АЛИ", "u1"), ("öm", "u2"), ("ÖM", "u2")] {
            let records = store
                .list(&ListRequest::new().prefix("first_name", prefix))
                .await
                .unwrap();
            let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, vec![id], "prefix {prefix}");
        }

        // The folded copy follows updates.
        store.update(&subject("u3", "Вера", "+3")).await.unwrap();
        let records = store
            .list(&ListRequest::new().prefix("first_name", "вер"))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "u3");

        db.close().await;
    }

    #[tokio::test]
    async fn test_list_prefix_is_literal() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "100%", "+1")).await.unwrap();
        store.create(&subject("u2", "1000", "+2")).await.unwrap();

        let records = store
            .list(&ListRequest::new().prefix("first_name", "100%"))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "u1");

        db.close().await;
    }

    #[tokio::test]
    async fn test_list_pagination_count_ignores_window() {
        let (db, store) = subject_store().await;
        for i in 0..5 {
            store
                .create(&subject(&format!("u{i}"), "Ann", &format!("+{i}")))
                .await
                .unwrap();
        }

        let page = store.list(&ListRequest::new().page(2, 2)).await.unwrap();
        let ids: Vec<&str> = page.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["u2", "u3"]);
        assert!(page.iter().all(|r| r.count == 5));

        db.close().await;
    }

    #[tokio::test]
    async fn test_list_order_by_caller_column() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Ann", "+1")).await.unwrap();
        store.create(&subject("u2", "Cid", "+2")).await.unwrap();
        store.create(&subject("u3", "Bob", "+3")).await.unwrap();

        let records = store
            .list(&ListRequest::new().order_by("first_name desc"))
            .await
            .unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.first_name.as_str()).collect();
        assert_eq!(names, vec!["Cid", "Bob", "Ann"]);

        db.close().await;
    }

    #[tokio::test]
    async fn test_list_visibility() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Ann", "+1")).await.unwrap();
        store.create(&subject("u2", "Bob", "+2")).await.unwrap();
        store.delete("id", "u1", DeleteMode::Soft).await.unwrap();

        let live = store.list(&ListRequest::new()).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].count, 1);

        let all = store
            .list(&ListRequest::new().visibility(Visibility::All))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].count, 2);

        db.close().await;
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_order_column() {
        let (db, store) = subject_store().await;

        let err = store
            .list(&ListRequest::new().order_by("random()"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownField { .. }));

        db.close().await;
    }

    #[tokio::test]
    async fn test_change_credential_by_phone() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Ann", "+100")).await.unwrap();

        let changed = store
            .change_credential(&CredentialSelector::by_phone("+100"), "new-secret")
            .await
            .unwrap();
        assert!(changed);

        let found = store.get("id", "u1", Visibility::Live).await.unwrap();
        assert_eq!(found.password, "new-secret");
        assert!(found.updated_at.is_none());

        assert!(
            !store
                .change_credential(&CredentialSelector::by_phone("+404"), "x")
                .await
                .unwrap()
        );

        db.close().await;
    }

    #[tokio::test]
    async fn test_change_credential_rejects_unsupported_selector() {
        let (db, store) = subject_store().await;

        let err = store
            .change_credential(&CredentialSelector::by_email("a@example.com"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownField { .. }));

        let err = store
            .change_credential(&CredentialSelector::default(), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::QueryConstruction(_)));

        db.close().await;
    }

    #[tokio::test]
    async fn test_update_refresh_token_leaves_updated_at() {
        let (db, store) = subject_store().await;
        store.create(&subject("u1", "Ann", "+100")).await.unwrap();

        assert!(store.update_refresh_token("u1", "tok-2").await.unwrap());
        let found = store.get("id", "u1", Visibility::Live).await.unwrap();
        assert_eq!(found.refresh_token, "tok-2");
        assert!(found.updated_at.is_none());

        store.delete("id", "u1", DeleteMode::Soft).await.unwrap();
        assert!(!store.update_refresh_token("u1", "tok-3").await.unwrap());

        db.close().await;
    }
}
