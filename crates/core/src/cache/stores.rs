//! Named cache stores.
//!
//! One store exists per generation. Stores are created on open, enumerated by
//! name, and deleted as a whole (entries cascade).

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Handle to one named store.
#[derive(Clone, Debug)]
pub struct CacheHandle {
    pub(crate) db: CacheDb,
    pub(crate) name: String,
}

impl CacheHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Summary of one store for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheSummary {
    pub name: String,
    pub created_at: String,
    pub entries: u64,
}

impl CacheDb {
    /// Open the named store, creating it if absent.
    pub async fn open_cache(&self, name: &str) -> Result<CacheHandle, Error> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("cache name cannot be empty".into()));
        }

        let owned = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)", params![owned, now])?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(CacheHandle { db: self.clone(), name: name.to_string() })
    }

    /// Handle to the named store without creating it.
    ///
    /// Reads through the handle see an empty store until the first write
    /// creates it.
    pub fn cache(&self, name: &str) -> CacheHandle {
        CacheHandle { db: self.clone(), name: name.to_string() }
    }

    /// Check whether a store with this name exists.
    pub async fn has_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every store, oldest first.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Stores whose name starts with `prefix`, with their entry counts.
    pub async fn cache_summaries(&self, prefix: &str) -> Result<Vec<CacheSummary>, Error> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        self.conn
            .call(move |conn| -> Result<Vec<CacheSummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT c.name, c.created_at, COUNT(e.key_hash)
                     FROM caches c LEFT JOIN entries e ON e.cache_name = c.name
                     WHERE c.name LIKE ?1 ESCAPE '\\'
                     GROUP BY c.name, c.created_at
                     ORDER BY c.created_at ASC, c.name ASC",
                )?;
                let summaries = stmt
                    .query_map(params![pattern], |row| {
                        Ok(CacheSummary {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(summaries)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns false if no store had this name.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
