//! Defaults shared by the storage, service and binary crates.
//!
//! Every value here can be overridden through configuration; these are the
//! fallbacks used when the environment leaves a key unset.
//!
//! ```
//! use roster_core::constants::*;
//!
//! assert_eq!(SUBJECT_CREATE_TOPIC, "api.user.create");
//! assert_eq!(DEFAULT_CONTEXT_TIMEOUT.as_secs(), 30);
//! ```

use std::time::Duration;

// ============================================================================
// Application Service
// ============================================================================

/// Upper bound on a single store call made through the application service.
pub const DEFAULT_CONTEXT_TIMEOUT: Duration = Duration::from_secs(30);

/// Application name reported in logs when `APP` is unset.
pub const DEFAULT_APP_NAME: &str = "roster";

/// Deployment environment when `ENVIRONMENT` is unset.
pub const DEFAULT_ENVIRONMENT: &str = "develop";

/// Environment name that switches log output to JSON.
pub const PRODUCTION_ENVIRONMENT: &str = "production";

/// Log filter directive when neither `RUST_LOG` nor `LOG_LEVEL` is set.
pub const DEFAULT_LOG_LEVEL: &str = "debug";

// ============================================================================
// Broker
// ============================================================================

/// Topic carrying subject creation requests.
pub const SUBJECT_CREATE_TOPIC: &str = "api.user.create";

/// Consumer group used for the creation topic.
pub const DEFAULT_CONSUMER_GROUP: &str = "1";

/// Broker bootstrap address.
pub const DEFAULT_BROKER_ADDRESS: &str = "localhost:29092";

/// Buffered messages held by the in-process broker before producers wait.
pub const DEFAULT_BROKER_CAPACITY: usize = 256;

// ============================================================================
// Storage
// ============================================================================

/// SQLite database file.
pub const DEFAULT_DATABASE_PATH: &str = "roster.db";

/// Object-storage bucket holding subject images.
pub const DEFAULT_OBJECT_STORAGE_BUCKET: &str = "user";
