use std::path::Path;
use std::time::Duration;

use roster_core::constants::DEFAULT_DATABASE_PATH;
use sqlx::ConnectOptions;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Where the database file lives and how the pool around it is sized.
///
/// The file and its parent directory are created when missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Wait for a pooled connection before failing with `ConnectionFailure`
    pub acquire_timeout: Duration,
    /// Wait on a locked database before a statement fails
    pub busy_timeout: Duration,
    /// Apply the embedded migrations when the pool opens
    pub auto_migrate: bool,
}

impl DatabaseConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(10),
            auto_migrate: true,
        }
    }

    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    #[must_use]
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min.min(self.max_connections);
        self
    }

    #[must_use]
    pub fn auto_migrate(mut self, migrate: bool) -> Self {
        self.auto_migrate = migrate;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_PATH)
    }
}

/// Pooled handle shared by every store and by the ingestion consumer.
///
/// Cloning is cheap; all clones draw from the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (and optionally migrate) the database described by `config`.
    ///
    /// ```no_run
    /// use roster_storage::connection::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = DatabaseConfig::new("roster.db")
    ///     .max_connections(10)
    ///     .auto_migrate(true);
    ///
    /// let db = Database::new(config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        let parent = Path::new(&config.path).parent();
        if let Some(dir) = parent.filter(|d| !d.as_os_str().is_empty() && !d.exists()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                StorageError::Configuration(format!(
                    "cannot create database directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        info!(
            path = %config.path,
            max_connections = config.max_connections,
            "database pool opened"
        );

        let db = Self { pool };

        if config.auto_migrate {
            db.migrate().await?;
        }

        Ok(db)
    }

    /// Create an in-memory database (primarily for testing)
    ///
    /// The pool holds exactly one connection that is never recycled, since
    /// each SQLite memory connection is its own database.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Apply the embedded schema under `migrations/`.
    ///
    /// Migration files are embedded at compile time by `sqlx::migrate!`;
    /// already-applied versions are skipped, so this is safe to call twice.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        debug!("database migrations applied");
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
