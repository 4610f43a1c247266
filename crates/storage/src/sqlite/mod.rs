use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use thiserror::Error;

use crate::repository::{AttemptRepository, CertificationRepository, QuestionRepository, Storage};

mod attempt_repo;
mod certification_repo;
mod mapping;
mod migrate;
mod question_repo;

/// Pooled `SQLite` handle implementing every repository trait.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open the database at the given `SQLite` URL, creating the file if it
    /// does not exist yet.
    ///
    /// Every pooled connection enforces foreign keys, journals in WAL mode,
    /// and waits up to five seconds on a locked database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL does not parse or the database
    /// cannot be opened.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply any pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a migration statement fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Build a `Storage` whose repositories all share one `SQLite` pool.
    ///
    /// Migrations run before the storage is handed out.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or
    /// migrated.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let certifications: Arc<dyn CertificationRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo);
        Ok(Self {
            certifications,
            questions,
            attempts,
        })
    }
}
