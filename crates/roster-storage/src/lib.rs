//! Storage layer for the roster record service.
//!
//! This crate provides SQLite-backed persistence for the two record kinds,
//! [`Subject`] and [`Staff`], behind one soft-delete-aware contract.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool manager with embedded migrations
//! - [`query`] - Parameterized statement construction
//! - [`Record`] - Per-kind capabilities (table, columns, update whitelist)
//! - [`EntityStore`] / [`SqliteStore`] - The store contract and its single,
//!   generic implementation
//!
//! # Core Concepts
//!
//! ## Soft Delete
//!
//! A row is live while `deleted_at` is unset. Reads see only live rows
//! unless the caller asks for [`Visibility::All`]; updates, credential and
//! token rotation never touch retired rows. A hard delete removes the row
//! whatever its state.
//!
//! ## Field Allowlist
//!
//! Field and ordering names arrive as caller text. They are resolved against
//! the record kind's column list before any SQL is assembled, and values are
//! always bound, so neither can alter the statement.
//!
//! # Examples
//!
//! ```no_run
//! use roster_storage::{Database, DatabaseConfig, EntityStore, SubjectStore};
//! use roster_storage::models::Subject;
//! use roster_core::{DeleteMode, ListRequest, Visibility};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("roster.db")).await?;
//! let store = SubjectStore::new(db.pool().clone());
//!
//! let subject = Subject {
//!     id: "u1".to_string(),
//!     first_name: "Ann".to_string(),
//!     phone_number: "+100".to_string(),
//!     ..Default::default()
//! };
//! store.create(&subject).await?;
//!
//! let page = store.list(&ListRequest::new().page(1, 20)).await?;
//! println!("{} of {}", page.len(), page.first().map_or(0, |s| s.count));
//!
//! store.delete("id", "u1", DeleteMode::Soft).await?;
//! assert!(store.get("id", "u1", Visibility::All).await?.deleted_at.is_some());
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod models;
pub mod query;
pub mod store;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use models::{Record, Staff, Subject};
pub use roster_core::{CredentialSelector, DeleteMode, ListRequest, Visibility};
pub use store::{EntityStore, SqliteStore, StaffStore, SubjectStore};
