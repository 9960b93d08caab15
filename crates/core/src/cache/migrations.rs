//! Database schema migrations.
//!
//! Uses a simple version table approach to track applied migrations.
//! Each migration is a SQL batch that transforms the schema.

use std::num::ParseIntError;

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Migration list: (version, SQL).
///
/// Migrations must be applied in order. All migrations are idempotent
/// using CREATE IF NOT EXISTS.
const MIGRATIONS: &[(&str, &str)] = &[("1", include_str!("../../migrations/001_partitions.sql"))];

/// Run any pending migrations.
///
/// This creates the _migrations table if it doesn't exist, checks the
/// current version, and applies any migrations that haven't been run yet.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(Error::from)?;

        let current: i64 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
                row.get(0)
            })
            .map_err(Error::from)?;

        for (version, sql) in MIGRATIONS {
            let version_num: i64 = version
                .parse()
                .map_err(|e: ParseIntError| Error::MigrationFailed(e.to_string()))?;
            if version_num > current {
                tracing::debug!(version = version_num, "applying cache migration");
                conn.execute_batch(sql)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version_num, chrono::Utc::now().to_rfc3339()],
                )
                .map_err(Error::from)?;
            }
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_rusqlite::rusqlite;

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let tables: Vec<String> = conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('partitions', 'entries') ORDER BY name",
                )?;
                let names = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<_>, _>>()?;
                Ok::<_, rusqlite::Error>(names)
            })
            .await
            .unwrap();

        assert_eq!(tables, vec!["entries", "partitions"]);
    }

    #[tokio::test]
    async fn test_partition_delete_cascades_to_entries() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let remaining: i64 = conn
            .call(|conn| {
                conn.execute_batch(
                    "PRAGMA foreign_keys=ON;
                     INSERT INTO partitions (name, created_at) VALUES ('app-shell-v1', '2026-01-01T00:00:00Z');
                     INSERT INTO entries (partition, key_hash, method, url, status, status_text, kind,
                                          headers_json, body, stored_at)
                     VALUES ('app-shell-v1', 'abc', 'GET', 'http://localhost/', 200, 'OK', 'basic',
                             '[]', x'', '2026-01-01T00:00:00Z');
                     DELETE FROM partitions WHERE name = 'app-shell-v1';",
                )?;
                conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            })
            .await
            .unwrap();

        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_migrations_version_tracking() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let count: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)))
            .await
            .unwrap();

        assert_eq!(count, MIGRATIONS.len() as i64);
    }
}
