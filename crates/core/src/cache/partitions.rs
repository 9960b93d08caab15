//! Partition lifecycle: open, list, delete.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Handle to a named partition.
///
/// Obtained from [`CacheDb::open_partition`], which guarantees the partition
/// existed at the time of opening.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    name: String,
}

impl Partition {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Per-partition summary for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PartitionStats {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
}

impl CacheDb {
    /// Open a partition by name, creating it on first use.
    pub async fn open_partition(&self, name: &str) -> Result<Partition, Error> {
        if name.is_empty() {
            return Err(Error::InvalidInput("partition name cannot be empty".into()));
        }

        let owned = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO partitions (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![owned, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Partition { name: name.to_string() })
    }

    /// Whether a partition with this name exists.
    pub async fn has_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and every entry in it.
    ///
    /// Returns false if no partition had that name.
    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE partition = ?1", params![name])?;
                let deleted = tx.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// All partition names, in creation order.
    pub async fn partition_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry counts for every partition, in creation order.
    pub async fn partition_stats(&self) -> Result<Vec<PartitionStats>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PartitionStats>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT p.name, p.created_at, COUNT(e.key_hash)
                     FROM partitions p
                     LEFT JOIN entries e ON e.partition = p.name
                     GROUP BY p.name
                     ORDER BY p.rowid ASC",
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(PartitionStats {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::CacheDb;
    use crate::{Error, RequestKey, Response};

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let a = db.open_partition("app-shell-v1").await.unwrap();
        let b = db.open_partition("app-shell-v1").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(db.partition_names().await.unwrap(), vec!["app-shell-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_open_empty_name() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.open_partition("").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_names_in_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_partition("b").await.unwrap();
        db.open_partition("a").await.unwrap();
        db.open_partition("c").await.unwrap();
        assert_eq!(db.partition_names().await.unwrap(), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_delete_removes_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let partition = db.open_partition("app-runtime-v1").await.unwrap();
        let key = RequestKey::get(&url::Url::parse("https://example.com/app.js").unwrap());
        db.put(&partition, &key, &Response::new(200, "js")).await.unwrap();

        assert!(db.delete_partition("app-runtime-v1").await.unwrap());
        assert!(!db.has_partition("app-runtime-v1").await.unwrap());
        assert!(db.match_any(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(!db.delete_partition("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_counts_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let shell = db.open_partition("shell").await.unwrap();
        db.open_partition("empty").await.unwrap();
        for path in ["/", "/index.html"] {
            let key = RequestKey::get(&url::Url::parse("https://example.com").unwrap().join(path).unwrap());
            db.put(&shell, &key, &Response::new(200, "x")).await.unwrap();
        }

        let stats = db.partition_stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "shell");
        assert_eq!(stats[0].entries, 2);
        assert_eq!(stats[1].entries, 0);
    }
}
