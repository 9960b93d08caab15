//! Entry reads and writes within partitions.
//!
//! Writes come in two flavours: [`CacheDb::put`] reports failures to the
//! caller, [`CacheDb::put_best_effort`] logs and swallows them. Strategy code
//! only ever uses the latter since a failed write must never reach the
//! response path.

use super::connection::CacheDb;
use super::hash::RequestKey;
use super::partitions::Partition;
use crate::{Error, Response, ResponseKind};
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Result of a fail-soft write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// The store rejected the write; the reason has already been logged.
    Skipped(String),
}

impl PutOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, PutOutcome::Stored)
    }
}

/// Raw column values of an entry row.
struct EntryRow {
    status: u16,
    status_text: String,
    kind: String,
    response_url: Option<String>,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            status: row.get(0)?,
            status_text: row.get(1)?,
            kind: row.get(2)?,
            response_url: row.get(3)?,
            headers_json: row.get(4)?,
            body: row.get(5)?,
        })
    }

    fn into_response(self) -> Result<Response, Error> {
        let kind: ResponseKind = self.kind.parse().map_err(Error::CorruptEntry)?;
        let headers: Vec<(String, String)> =
            serde_json::from_str(&self.headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        Ok(Response {
            url: self.response_url,
            status: self.status,
            status_text: self.status_text,
            headers,
            body: Bytes::from(self.body),
            kind,
        })
    }
}

const SELECT_COLUMNS: &str = "e.status, e.status_text, e.kind, e.response_url, e.headers_json, e.body";

fn check_cacheable_method(key: &RequestKey) -> Result<(), Error> {
    if key.method() != "GET" {
        return Err(Error::InvalidInput(format!("cannot cache {} request for {}", key.method(), key.url())));
    }
    Ok(())
}

fn insert_entry(
    conn: &rusqlite::Connection, partition: &str, key: &RequestKey, response: &Response, headers_json: &str,
    stored_at: &str,
) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO entries (
            partition, key_hash, method, url, status, status_text, kind,
            response_url, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(partition, key_hash) DO UPDATE SET
            status = excluded.status,
            status_text = excluded.status_text,
            kind = excluded.kind,
            response_url = excluded.response_url,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            partition,
            key.hash(),
            key.method(),
            key.url(),
            response.status,
            &response.status_text,
            response.kind.as_str(),
            &response.url,
            headers_json,
            response.body.as_ref(),
            stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Look up a request in one partition.
    pub async fn match_in(&self, partition: &Partition, key: &RequestKey) -> Result<Option<Response>, Error> {
        let name = partition.name().to_string();
        let hash = key.hash().to_string();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM entries e WHERE e.partition = ?1 AND e.key_hash = ?2"
                ))?;

                match stmt.query_row(params![name, hash], EntryRow::from_row) {
                    Ok(row) => row.into_response().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a request across every partition.
    ///
    /// Partitions are searched in creation order and the first hit wins.
    pub async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>, Error> {
        let hash = key.hash().to_string();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS}
                     FROM entries e
                     JOIN partitions p ON p.name = e.partition
                     WHERE e.key_hash = ?1
                     ORDER BY p.rowid ASC
                     LIMIT 1"
                ))?;

                match stmt.query_row(params![hash], EntryRow::from_row) {
                    Ok(row) => row.into_response().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response, replacing any previous entry for the same key.
    ///
    /// # Errors
    ///
    /// Fails for non-GET keys, for partitions that no longer exist, and on
    /// any database error.
    pub async fn put(&self, partition: &Partition, key: &RequestKey, response: &Response) -> Result<(), Error> {
        check_cacheable_method(key)?;
        let headers_json = serde_json::to_string(&response.headers).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let name = partition.name().to_string();
        let key = key.clone();
        let response = response.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                insert_entry(conn, &name, &key, &response, &headers_json, &stored_at)
            })
            .await
            .map_err(Error::from)
    }

    /// Store several responses in one transaction: all of them or none.
    pub async fn put_all(&self, partition: &Partition, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        let mut prepared = Vec::with_capacity(entries.len());
        for (key, response) in entries {
            check_cacheable_method(key)?;
            let headers_json =
                serde_json::to_string(&response.headers).map_err(|e| Error::InvalidInput(e.to_string()))?;
            prepared.push((key.clone(), response.clone(), headers_json));
        }
        let name = partition.name().to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for (key, response, headers_json) in &prepared {
                    insert_entry(&tx, &name, key, response, headers_json, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response without ever failing the caller.
    pub async fn put_best_effort(&self, partition: &Partition, key: &RequestKey, response: &Response) -> PutOutcome {
        match self.put(partition, key, response).await {
            Ok(()) => {
                tracing::debug!(partition = partition.name(), url = key.url(), "cached response");
                PutOutcome::Stored
            }
            Err(e) => {
                tracing::warn!(partition = partition.name(), url = key.url(), error = %e, "cache write skipped");
                PutOutcome::Skipped(e.to_string())
            }
        }
    }
}
