//! Bookkeeping of known peers and their membership-group addresses.

use std::collections::BTreeMap;
use std::sync::Mutex;

use quorate_core::{GroupAddress, NodeId};

/// One registered peer: base address, derived group address, and - for
/// in-process peers - the node id it was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    pub base_address: String,
    pub group_address: GroupAddress,
    /// Unknown for remote peers registered by address only.
    pub node_id: Option<NodeId>,
}

/// Mutex-guarded peer table owned by one verifier instance. Deliberately
/// not a global: two verifiers never share registrations.
pub struct PeerRegistry {
    inner: Mutex<BTreeMap<String, PeerEntry>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a peer by base address, deriving its membership-group
    /// address. Re-registering an address replaces the entry.
    pub fn register(&self, base_address: &str, node_id: Option<NodeId>) -> PeerEntry {
        let entry = PeerEntry {
            base_address: base_address.to_string(),
            group_address: GroupAddress::from_base(base_address),
            node_id,
        };
        self.inner
            .lock()
            .unwrap()
            .insert(entry.base_address.clone(), entry.clone());
        entry
    }

    /// Remove a peer. Idempotent: unknown addresses are ignored.
    pub fn unregister(&self, base_address: &str) {
        self.inner.lock().unwrap().remove(base_address);
    }

    /// Look up a peer by base address.
    pub fn lookup(&self, base_address: &str) -> Option<PeerEntry> {
        self.inner.lock().unwrap().get(base_address).cloned()
    }

    /// All known group addresses, in stable order.
    pub fn group_addresses(&self) -> Vec<GroupAddress> {
        self.inner
            .lock()
            .unwrap()
            .values()
            .map(|e| e.group_address.clone())
            .collect()
    }

    /// All known base addresses, in stable order.
    pub fn base_addresses(&self) -> Vec<String> {
        self.inner.lock().unwrap().keys().cloned().collect()
    }

    /// Pick any one known peer uniformly at random and extend its base
    /// address with `path`. Returns `None` when the registry is empty.
    pub fn pick_random(&self, path: &str) -> Option<String> {
        use rand::seq::IteratorRandom;
        let inner = self.inner.lock().unwrap();
        let base = inner.keys().choose(&mut rand::thread_rng())?;
        let base = base.trim_end_matches('/');
        if path.is_empty() {
            Some(base.to_string())
        } else {
            Some(format!("{}/{}", base, path.trim_start_matches('/')))
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
