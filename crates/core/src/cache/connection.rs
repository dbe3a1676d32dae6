//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database that backs every cache
//! store, applying pragmas for concurrency (WAL mode) and cascading deletes
//! (foreign keys), and running migrations.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Cache storage handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations on a
/// background thread. Cloning is cheap and every clone talks to the same
/// database, so the router's background writes and the lifecycle manager
/// share one storage.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies pragmas, and runs any
    /// pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::configure(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::configure(conn).await
    }

    async fn configure(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        tracing::debug!("cache storage ready");
        Ok(Self { conn })
    }

    /// Run raw SQL against the database, e.g. to install a failing trigger.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn execute_batch(&self, sql: &str) -> Result<(), Error> {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let version = db
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[tokio::test]
    async fn test_trigger_blocks_store_delete() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("golf-pwa-v1").await.unwrap();
        db.execute_batch(
            "CREATE TRIGGER keep_v1 BEFORE DELETE ON caches WHEN old.name = 'golf-pwa-v1'
             BEGIN SELECT RAISE(ABORT, 'locked'); END;",
        )
        .await
        .unwrap();

        assert!(matches!(db.delete_cache("golf-pwa-v1").await, Err(Error::Database(_))));
        assert!(db.has_cache("golf-pwa-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let enabled: i64 = db
            .conn
            .call(|conn| conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
