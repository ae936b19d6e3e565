use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{AnswerRepository, ResultRepository, Storage, TemplateRepository};

mod answer_repo;
mod mapping;
mod migrate;
mod result_repo;
mod template_repo;

/// Pool and connection settings for `SqliteRepository`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteConfig {
    pub max_connections: u32,
    /// How long to wait for a free pooled connection.
    pub acquire_timeout: Duration,
    /// How long a write waits on a locked database before failing.
    pub busy_timeout: Duration,
    pub wal: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            wal: true,
        }
    }
}

impl SqliteConfig {
    fn connect_options(&self, database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
        let journal = if self.wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        };
        Ok(SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .journal_mode(journal)
            .busy_timeout(self.busy_timeout))
    }
}

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
    /// Open a pool on `database_url` with the given settings.
    ///
    /// Foreign keys are always enforced.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL does not parse or no connection
    /// can be opened.
    pub async fn connect(
        database_url: &str,
        config: SqliteConfig,
    ) -> Result<Self, SqliteInitError> {
        let options = config.connect_options(database_url)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Apply pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// `SQLite`-backed storage with default pool settings, migrated.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations fail.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::sqlite_with(database_url, SqliteConfig::default()).await
    }

    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations fail.
    pub async fn sqlite_with(
        database_url: &str,
        config: SqliteConfig,
    ) -> Result<Self, SqliteInitError> {
        let repo = Arc::new(SqliteRepository::connect(database_url, config).await?);
        repo.migrate().await?;
        Ok(Self {
            templates: Arc::clone(&repo) as Arc<dyn TemplateRepository>,
            answers: Arc::clone(&repo) as Arc<dyn AnswerRepository>,
            results: repo as Arc<dyn ResultRepository>,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[test]
    fn config_builds_options_for_memory_urls() {
        let config = SqliteConfig {
            wal: false,
            ..SqliteConfig::default()
        };
        assert!(config.connect_options("sqlite::memory:").is_ok());
        assert!(
            config
                .connect_options("sqlite:file:cfg?mode=memory&cache=shared")
                .is_ok()
        );
    }

    #[tokio::test]
    async fn sqlite_with_custom_config_migrates() {
        let config = SqliteConfig {
            max_connections: 1,
            ..SqliteConfig::default()
        };
        let url = "sqlite:file:custom_cfg?mode=memory&cache=shared";
        let storage = Storage::sqlite_with(url, config).await.unwrap();
        assert!(storage.templates.list_templates(10).await.unwrap().is_empty());
    }
}
