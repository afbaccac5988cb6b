//! SQLite connection factory and migration tooling.
//!
//! All statements run on tokio-rusqlite's single background thread, so one
//! [`Database`] serializes every read and write issued through it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::Migration;
use thiserror::Error;
use tokio_rusqlite::Connection;

const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to create database directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Connection(String),

    #[error("invalid migration '{id}': {message}")]
    InvalidMigration { id: String, message: String },

    #[error("migration failed: {0}")]
    Migration(String),
}

/// Map a failed `Connection::call` into a [`DbError`].
pub fn call_error(e: impl std::fmt::Display) -> DbError {
    DbError::Connection(e.to_string())
}

/// Shared handle to the service's SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Connection>,
    path: String,
}

impl Database {
    /// Open (or create) the database described by `settings`.
    ///
    /// Missing parent directories of the database file are created first.
    pub async fn open(settings: &DatabaseSettings) -> Result<Self, DbError> {
        if settings.path == IN_MEMORY {
            return Self::open_in_memory().await;
        }

        ensure_parent_dir(Path::new(&settings.path)).await?;

        let conn = Connection::open(&settings.path).await.map_err(call_error)?;
        let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
        let journal_mode = conn
            .call(move |conn| {
                conn.busy_timeout(busy_timeout)?;
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })
            })
            .await
            .map_err(call_error)?;

        tracing::info!(
            target: "bookshelf-db",
            path = %settings.path,
            journal_mode = %journal_mode,
            "database opened"
        );

        Ok(Self {
            conn: Arc::new(conn),
            path: settings.path.clone(),
        })
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().await.map_err(call_error)?;
        Ok(Self {
            conn: Arc::new(conn),
            path: IN_MEMORY.to_string(),
        })
    }

    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Apply every pending migration, returning how many were applied.
    ///
    /// Applied migrations are tracked by refinery in `refinery_schema_history`,
    /// so running the same set twice is a no-op.
    pub async fn run_migrations(&self, migrations: &[(String, Migration)]) -> Result<usize, DbError> {
        let mut pending = Vec::with_capacity(migrations.len());
        for (module, migration) in migrations {
            let parsed = refinery::Migration::unapplied(migration.id, migration.up).map_err(|e| {
                DbError::InvalidMigration {
                    id: format!("{module}/{}", migration.id),
                    message: e.to_string(),
                }
            })?;
            pending.push(parsed);
        }

        let applied = self
            .conn
            .call(move |conn| {
                let report = refinery::Runner::new(&pending).run(conn)?;
                Ok::<_, refinery::Error>(report.applied_migrations().len())
            })
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;

        tracing::info!(target: "bookshelf-db", applied, "migrations complete");
        Ok(applied)
    }

    /// Close the connection once no other handle holds it.
    pub async fn close(self) -> Result<(), DbError> {
        match Arc::try_unwrap(self.conn) {
            Ok(conn) => conn.close().await.map_err(call_error),
            Err(_) => {
                tracing::debug!(target: "bookshelf-db", "connection still shared; leaving it open");
                Ok(())
            }
        }
    }
}

async fn ensure_parent_dir(path: &Path) -> Result<(), DbError> {
    let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
        return Ok(());
    };

    if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(());
    }

    tracing::info!(target: "bookshelf-db", dir = %dir.display(), "creating database directory");
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| DbError::Directory {
            path: dir.to_path_buf(),
            source,
        })
}
