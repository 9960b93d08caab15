//! Activation-time eviction of stale generations.

use serde::Serialize;
use shellcache_core::CacheDb;

use super::clients::ClientRegistry;

/// What activation removed and took over.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivationReport {
    pub generation: String,
    pub deleted: Vec<String>,
    /// Partitions that could not be deleted; left orphaned.
    pub failed: Vec<String>,
    pub claimed_clients: usize,
}

/// Delete every partition not in `whitelist`, then claim all clients.
///
/// Every delete is awaited before clients are claimed. Failed deletes are
/// logged and recorded but never stop activation.
pub async fn run(db: &CacheDb, clients: &ClientRegistry, generation: &str, whitelist: &[String]) -> ActivationReport {
    let mut report = ActivationReport { generation: generation.to_string(), ..Default::default() };

    let names = match db.partition_names().await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(error = %e, "could not list partitions, skipping reap");
            Vec::new()
        }
    };

    for name in names.into_iter().filter(|name| !whitelist.contains(name)) {
        match db.delete_partition(&name).await {
            Ok(_) => {
                tracing::info!(partition = %name, "deleted stale partition");
                report.deleted.push(name);
            }
            Err(e) => {
                tracing::warn!(partition = %name, error = %e, "failed to delete stale partition");
                report.failed.push(name);
            }
        }
    }

    report.claimed_clients = clients.claim(generation).await;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio_rusqlite::Connection;

    /// A file-backed store plus a second connection for tampering with it.
    struct SharedStore {
        db: CacheDb,
        side: Connection,
        path: PathBuf,
    }

    impl SharedStore {
        async fn open(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!("shellcache-reaper-{}-{name}.sqlite", std::process::id()));
            remove_files(&path);
            let db = CacheDb::open(&path).await.unwrap();
            let side = Connection::open(&path).await.unwrap();
            Self { db, side, path }
        }

        async fn execute(&self, sql: &'static str) {
            self.side.call(move |conn| conn.execute_batch(sql)).await.unwrap();
        }
    }

    impl Drop for SharedStore {
        fn drop(&mut self) {
            remove_files(&self.path);
        }
    }

    fn remove_files(path: &std::path::Path) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.as_os_str().to_owned();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }

    fn whitelist() -> Vec<String> {
        vec!["app-shell-v2".into(), "app-resource-v2".into(), "app-runtime-v2".into()]
    }

    #[tokio::test]
    async fn test_deletes_only_stale() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["app-shell-v1", "app-resource-v1", "app-shell-v2", "unrelated"] {
            db.open_partition(name).await.unwrap();
        }

        let report = run(&db, &ClientRegistry::new(), "v2", &whitelist()).await;
        assert_eq!(report.deleted, vec!["app-shell-v1", "app-resource-v1", "unrelated"]);
        assert!(report.failed.is_empty());
        assert_eq!(db.partition_names().await.unwrap(), vec!["app-shell-v2"]);
    }

    #[tokio::test]
    async fn test_claims_after_reaping() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let clients = ClientRegistry::new();
        clients.register("tab-1").await;
        clients.register("tab-2").await;
        clients.claim("v1").await;

        let report = run(&db, &clients, "v2", &whitelist()).await;
        assert_eq!(report.claimed_clients, 2);
        assert_eq!(clients.controlled_by("v2").await.len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_to_reap() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_partition("app-shell-v2").await.unwrap();

        let report = run(&db, &ClientRegistry::new(), "v2", &whitelist()).await;
        assert!(report.deleted.is_empty());
        assert_eq!(report.claimed_clients, 0);
    }

    #[tokio::test]
    async fn test_failed_delete_does_not_stop_activation() {
        let store = SharedStore::open("delete").await;
        for name in ["app-shell-v1", "app-resource-v1", "unrelated", "app-shell-v2"] {
            store.db.open_partition(name).await.unwrap();
        }
        store
            .execute(
                "CREATE TRIGGER pin_shell_v1 BEFORE DELETE ON partitions WHEN OLD.name = 'app-shell-v1'
                 BEGIN SELECT RAISE(ABORT, 'pinned'); END;",
            )
            .await;
        let clients = ClientRegistry::new();
        clients.register("tab-1").await;

        let report = run(&store.db, &clients, "v2", &whitelist()).await;
        assert_eq!(report.failed, vec!["app-shell-v1"]);
        assert_eq!(report.deleted, vec!["app-resource-v1", "unrelated"]);
        assert_eq!(report.claimed_clients, 1);
        assert_eq!(store.db.partition_names().await.unwrap(), vec!["app-shell-v1", "app-shell-v2"]);
    }

    #[tokio::test]
    async fn test_listing_failure_still_claims() {
        let store = SharedStore::open("listing").await;
        store.db.open_partition("app-shell-v1").await.unwrap();
        store.execute("DROP TABLE entries; DROP TABLE partitions;").await;
        let clients = ClientRegistry::new();
        clients.register("tab-1").await;

        let report = run(&store.db, &clients, "v2", &whitelist()).await;
        assert!(report.deleted.is_empty());
        assert!(report.failed.is_empty());
        assert_eq!(report.claimed_clients, 1);
        assert_eq!(clients.controller("tab-1").await.as_deref(), Some("v2"));
    }
}
