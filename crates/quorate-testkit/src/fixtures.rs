//! Test fixtures and helpers.
//!
//! Common setup code for convergence scenario tests.

use std::sync::Arc;

use quorate::{ConvergenceCriteria, GroupAddress, NodeId, Verifier, VerifierConfig};
use quorate_client::MemoryCluster;

/// An in-memory cluster with a verifier already pointed at it and every
/// member registered as a peer.
pub struct ClusterFixture {
    pub cluster: Arc<MemoryCluster>,
    pub verifier: Verifier,
    pub bases: Vec<String>,
    pub node_ids: Vec<NodeId>,
}

impl ClusterFixture {
    /// A fixture with `peer_count` members and default configuration.
    pub fn new(peer_count: usize) -> Self {
        Self::with_config(peer_count, VerifierConfig::default())
    }

    /// A fixture with `peer_count` members and explicit configuration.
    pub fn with_config(peer_count: usize, config: VerifierConfig) -> Self {
        let cluster = MemoryCluster::new();
        let verifier = Verifier::new(cluster.clone(), cluster.clone(), config);
        let mut bases = Vec::new();
        let mut node_ids = Vec::new();
        for i in 0..peer_count {
            let base = format!("http://127.0.0.1:80{:02}", i);
            let id = cluster.add_member(&base);
            verifier.register_peer(&base, id.clone());
            bases.push(base);
            node_ids.push(id);
        }
        Self {
            cluster,
            verifier,
            bases,
            node_ids,
        }
    }

    /// The registered group addresses.
    pub fn groups(&self) -> Vec<GroupAddress> {
        self.verifier.registry().group_addresses()
    }

    /// Criteria expecting every member healthy, with an exact total.
    pub fn full_health(&self) -> ConvergenceCriteria {
        ConvergenceCriteria::healthy(self.node_ids.len()).with_total(self.node_ids.len())
    }

    /// Stop the `index`-th member.
    pub fn stop(&self, index: usize) {
        self.cluster.stop(&self.node_ids[index]);
    }

    /// Restart the `index`-th member.
    pub fn restart(&self, index: usize) {
        self.cluster.restart(&self.node_ids[index]);
    }
}

/// Install a test tracing subscriber honoring `RUST_LOG`. Safe to call
/// from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_registers_every_member() {
        let fixture = ClusterFixture::new(3);
        assert_eq!(fixture.verifier.registry().len(), 3);
        assert_eq!(fixture.groups().len(), 3);
        assert_eq!(fixture.cluster.member_count(), 3);
    }

    #[test]
    fn test_full_health_criteria() {
        let fixture = ClusterFixture::new(2);
        let criteria = fixture.full_health();
        assert_eq!(criteria.expected_healthy, 2);
        assert_eq!(criteria.expected_total, Some(2));
        assert!(criteria.require_time_sync);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_fixture_converges_end_to_end() {
        init_tracing();
        let fixture = ClusterFixture::new(3);
        fixture
            .verifier
            .join_and_verify(fixture.full_health())
            .await
            .unwrap();

        fixture.stop(1);
        fixture.verifier.unregister_peer(&fixture.bases[1]);
        fixture
            .verifier
            .wait_for_convergence(ConvergenceCriteria::healthy(2))
            .await
            .unwrap();
    }
}
