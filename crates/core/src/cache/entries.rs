//! Entry operations on a single store.
//!
//! Entries are keyed by request identity (method + URL). Writes are
//! last-write-wins upserts; bulk population runs inside one transaction so a
//! store never holds part of an install attempt.

use super::stores::CacheHandle;
use crate::Error;
use crate::http::{Request, Response};
use crate::transport::Fetch;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

const UPSERT_ENTRY: &str = "INSERT INTO entries (
        cache_name, key_hash, method, url, status, status_text, headers_json, body, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(cache_name, key_hash) DO UPDATE SET
        method = excluded.method,
        url = excluded.url,
        status = excluded.status,
        status_text = excluded.status_text,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

/// Row ready to be written, with everything owned so it can cross into the
/// database thread.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Bytes,
}

impl EntryRow {
    fn new(request: &Request, response: &Response) -> Result<Self, Error> {
        Ok(Self {
            key_hash: request.cache_key(),
            method: request.method().to_string(),
            url: request.url().to_string(),
            status: response.status,
            status_text: response.status_text.clone(),
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.clone(),
        })
    }

    fn write(&self, conn: &rusqlite::Connection, cache_name: &str, stored_at: &str) -> Result<(), Error> {
        conn.execute(
            "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
            params![cache_name, stored_at],
        )?;
        conn.execute(
            UPSERT_ENTRY,
            params![
                cache_name,
                &self.key_hash,
                &self.method,
                &self.url,
                self.status,
                &self.status_text,
                &self.headers_json,
                &self.body[..],
                stored_at,
            ],
        )?;
        Ok(())
    }
}

impl CacheHandle {
    /// Look up the stored response for this exact request.
    pub async fn get(&self, request: &Request) -> Result<Option<Response>, Error> {
        let name = self.name.clone();
        let key = request.cache_key();
        self.db
            .conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, status_text, headers_json, body
                     FROM entries WHERE cache_name = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![name, key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                    ))
                });

                match result {
                    Ok((url, status, status_text, headers_json, body)) => Ok(Some(Response {
                        url: Some(url),
                        status,
                        status_text,
                        headers: serde_json::from_str(&headers_json)?,
                        body: Bytes::from(body),
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response under the request's identity, replacing any previous
    /// value.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        let row = EntryRow::new(request, response)?;
        let name = self.name.clone();
        let now = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> { row.write(conn, &name, &now) })
            .await
            .map_err(Error::from)
    }

    /// Store several responses atomically: either all land or none do.
    pub async fn put_all(&self, entries: &[(Request, Response)]) -> Result<(), Error> {
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let name = self.name.clone();
        let now = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for row in &rows {
                    row.write(&tx, &name, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Fetch every request and store all responses, all-or-nothing.
    ///
    /// A transport failure or a non-2xx status for any request aborts the
    /// whole batch before anything is written. Returns the number of entries
    /// stored.
    pub async fn add_all(&self, fetcher: &dyn Fetch, requests: &[Request]) -> Result<usize, Error> {
        let mut fetched = Vec::with_capacity(requests.len());
        for request in requests {
            let response = fetcher
                .fetch(request)
                .await
                .map_err(|e| Error::PopulationFailed { url: request.url().to_string(), reason: e.to_string() })?;

            if !response.ok() {
                return Err(Error::PopulationFailed {
                    url: request.url().to_string(),
                    reason: format!("status {}", response.status),
                });
            }

            fetched.push((request.clone(), response));
        }

        self.put_all(&fetched).await?;
        tracing::debug!(cache = %self.name, entries = fetched.len(), "populated store");
        Ok(fetched.len())
    }

    /// Remove the entry for this request. Returns false if none existed.
    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let name = self.name.clone();
        let key = request.cache_key();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted =
                    conn.execute("DELETE FROM entries WHERE cache_name = ?1 AND key_hash = ?2", params![name, key])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs of every stored entry, in URL order.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE cache_name = ?1 ORDER BY url ASC")?;
                let urls = stmt
                    .query_map(params![name], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored entries.
    pub async fn len(&self) -> Result<u64, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE cache_name = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len().await? == 0)
    }
}
