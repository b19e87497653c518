use std::future::Future;
use std::time::Duration;

use roster_core::constants::DEFAULT_CONTEXT_TIMEOUT;
use roster_core::{CredentialSelector, DeleteMode, ListRequest, Visibility};
use roster_storage::{EntityStore, Record, StorageResult};
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Facade over an [`EntityStore`] that bounds every call by a timeout and
/// runs it inside a `record_service` tracing span.
///
/// On expiry the store future is dropped. SQLite may already have committed
/// the statement; the caller only learns that the outcome is unknown.
#[derive(Debug, Clone)]
pub struct RecordService<S> {
    store: S,
    timeout: Duration,
}

impl<S: EntityStore> RecordService<S> {
    pub fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Service with the default 30 second timeout.
    pub fn with_default_timeout(store: S) -> Self {
        Self::new(store, DEFAULT_CONTEXT_TIMEOUT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn call<T, F>(&self, operation: &'static str, fut: F) -> ServiceResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        let span = info_span!(
            "record_service",
            kind = <S::Record as Record>::KIND,
            operation
        );
        let timeout = self.timeout;

        async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(Ok(value)) => {
                    debug!("store call completed");
                    Ok(value)
                }
                Ok(Err(err)) => {
                    debug!(error = %err, "store call failed");
                    Err(ServiceError::Storage(err))
                }
                Err(_) => {
                    warn!(?timeout, "store call timed out");
                    Err(ServiceError::Timeout { operation, timeout })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Store a new record and return its id.
    ///
    /// A record submitted without an id receives a fresh UUIDv4.
    pub async fn create(&self, mut record: S::Record) -> ServiceResult<String> {
        if record.id().trim().is_empty() {
            record.set_id(Uuid::new_v4().to_string());
        }
        let id = record.id().to_string();

        self.call("create", self.store.create(&record)).await?;
        Ok(id)
    }

    pub async fn get(
        &self,
        field: &str,
        value: &str,
        visibility: Visibility,
    ) -> ServiceResult<S::Record> {
        self.call("get", self.store.get(field, value, visibility))
            .await
    }

    pub async fn list(&self, request: &ListRequest) -> ServiceResult<Vec<S::Record>> {
        self.call("list", self.store.list(request)).await
    }

    pub async fn update(&self, record: &S::Record) -> ServiceResult<()> {
        self.call("update", self.store.update(record)).await
    }

    pub async fn delete(&self, field: &str, value: &str, mode: DeleteMode) -> ServiceResult<bool> {
        self.call("delete", self.store.delete(field, value, mode))
            .await
    }

    pub async fn check_field(&self, field: &str, value: &str) -> ServiceResult<bool> {
        self.call("check_field", self.store.check_field(field, value))
            .await
    }

    pub async fn change_credential(
        &self,
        selector: &CredentialSelector,
        password: &str,
    ) -> ServiceResult<bool> {
        self.call(
            "change_credential",
            self.store.change_credential(selector, password),
        )
        .await
    }

    pub async fn update_refresh_token(&self, id: &str, token: &str) -> ServiceResult<bool> {
        self.call(
            "update_refresh_token",
            self.store.update_refresh_token(id, token),
        )
        .await
    }
}
