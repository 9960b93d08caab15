//! Registry of host clients and the generation controlling each.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Open clients keyed by id, each mapped to its controlling generation.
///
/// Owned by the host and shared by every worker generation it runs, so a
/// newly activated worker can take over clients an older one controlled.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<String, Option<String>>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an open client. Existing clients keep their controller.
    pub async fn register(&self, id: &str) {
        let mut clients = self.clients.write().await;
        clients.entry(id.to_string()).or_insert(None);
    }

    /// Put an uncontrolled client under `generation`.
    ///
    /// Returns false if the client is unknown or already controlled.
    pub async fn adopt(&self, id: &str, generation: &str) -> bool {
        let mut clients = self.clients.write().await;
        match clients.get_mut(id) {
            Some(slot) if slot.is_none() => {
                *slot = Some(generation.to_string());
                true
            }
            _ => false,
        }
    }

    /// Forget a closed client.
    pub async fn remove(&self, id: &str) -> bool {
        self.clients.write().await.remove(id).is_some()
    }

    /// Generation controlling `id`, if any.
    pub async fn controller(&self, id: &str) -> Option<String> {
        self.clients.read().await.get(id).cloned().flatten()
    }

    /// Make `generation` the controller of every open client.
    ///
    /// Returns the number of clients claimed.
    pub async fn claim(&self, generation: &str) -> usize {
        let mut clients = self.clients.write().await;
        for controller in clients.values_mut() {
            *controller = Some(generation.to_string());
        }
        tracing::info!(generation, clients = clients.len(), "claimed clients");
        clients.len()
    }

    /// Ids of clients controlled by `generation`, sorted.
    pub async fn controlled_by(&self, generation: &str) -> Vec<String> {
        let clients = self.clients.read().await;
        let mut ids: Vec<String> = clients
            .iter()
            .filter(|(_, controller)| controller.as_deref() == Some(generation))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_uncontrolled() {
        let clients = ClientRegistry::new();
        clients.register("tab-1").await;
        assert_eq!(clients.controller("tab-1").await, None);
        assert_eq!(clients.len().await, 1);
    }

    #[tokio::test]
    async fn test_claim_takes_every_client() {
        let clients = ClientRegistry::new();
        clients.register("tab-1").await;
        clients.register("tab-2").await;
        assert_eq!(clients.claim("v1").await, 2);
        assert_eq!(clients.claim("v2").await, 2);
        assert_eq!(clients.controlled_by("v2").await, vec!["tab-1", "tab-2"]);
        assert!(clients.controlled_by("v1").await.is_empty());
    }

    #[tokio::test]
    async fn test_register_keeps_controller() {
        let clients = ClientRegistry::new();
        clients.register("tab-1").await;
        clients.claim("v1").await;
        clients.register("tab-1").await;
        assert_eq!(clients.controller("tab-1").await.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_adopt_only_uncontrolled() {
        let clients = ClientRegistry::new();
        clients.register("tab-1").await;
        assert!(clients.adopt("tab-1", "v2").await);
        assert!(!clients.adopt("tab-1", "v3").await);
        assert!(!clients.adopt("ghost", "v2").await);
        assert_eq!(clients.controller("tab-1").await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_remove() {
        let clients = ClientRegistry::new();
        clients.register("tab-1").await;
        assert!(clients.remove("tab-1").await);
        assert!(!clients.remove("tab-1").await);
        assert!(clients.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let host = ClientRegistry::new();
        let worker_view = host.clone();
        host.register("tab-1").await;
        worker_view.claim("v3").await;
        assert_eq!(host.controller("tab-1").await.as_deref(), Some("v3"));
    }
}
