//! routing.rs — the one piece of shared mutable state in a node
//!
//! Mutated from three places: scanner inserts, gossip `down` removes, and
//! send-failure removes. Reads are snapshot-based so path planning never
//! holds the lock. Invariant: a node's own id always maps to its own
//! endpoint — removals of self are ignored.

use std::collections::HashMap;
use std::sync::Arc;

use relay_types::{Endpoint, PeerId};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone)]
pub struct RoutingTable {
    self_id: PeerId,
    inner: Arc<RwLock<HashMap<PeerId, Endpoint>>>,
}

impl RoutingTable {
    pub fn new(self_id: PeerId, self_endpoint: Endpoint) -> Self {
        let mut table = HashMap::new();
        table.insert(self_id, self_endpoint);
        Self { self_id, inner: Arc::new(RwLock::new(table)) }
    }

    pub fn self_id(&self) -> PeerId {
        self.self_id
    }

    pub async fn insert(&self, id: PeerId, endpoint: Endpoint) {
        // The self entry is pinned at construction; a peer claiming our id
        // cannot displace it.
        if id == self.self_id {
            return;
        }
        let mut table = self.inner.write().await;
        if table.insert(id, endpoint.clone()).as_ref() != Some(&endpoint) {
            debug!("Routing table: peer {id} at {endpoint}");
        }
    }

    /// Remove a peer. Removing self is a no-op.
    pub async fn remove(&self, id: PeerId) -> bool {
        if id == self.self_id {
            return false;
        }
        self.inner.write().await.remove(&id).is_some()
    }

    pub async fn get(&self, id: PeerId) -> Option<Endpoint> {
        self.inner.read().await.get(&id).cloned()
    }

    pub async fn contains(&self, id: PeerId) -> bool {
        self.inner.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Copy of the whole table, for planning and gossip fan-out.
    pub async fn snapshot(&self) -> HashMap<PeerId, Endpoint> {
        self.inner.read().await.clone()
    }
}
