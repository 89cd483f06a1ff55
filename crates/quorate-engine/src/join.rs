//! Pairwise join-mesh construction.
//!
//! Membership is seeded by telling every member to merge with every other
//! member. The mesh is deliberately redundant - O(n^2) join messages - so
//! membership propagates even when the underlying protocol does not gossip
//! transitively within the verification window. Convergence is verified
//! independently afterwards.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use quorate_client::{JoinPeerRequest, MembershipClient};
use quorate_core::GroupAddress;

use crate::barrier::CompletionBarrier;
use crate::error::Result;

/// Issues join requests between group endpoints, one barrier phase per
/// join so failure attribution stays unambiguous.
pub struct JoinCoordinator {
    client: Arc<dyn MembershipClient>,
    barrier: Arc<CompletionBarrier>,
}

impl JoinCoordinator {
    pub fn new(client: Arc<dyn MembershipClient>, barrier: Arc<CompletionBarrier>) -> Self {
        Self { client, barrier }
    }

    /// Build the full pairwise mesh over `groups`: for every ordered pair
    /// (target, member) with member != target, ask `member` to merge with
    /// `target`. The first failed join aborts the build.
    pub async fn join_mesh(
        &self,
        groups: &[GroupAddress],
        synchronization_quorum: Option<u32>,
        phase_timeout: Duration,
    ) -> Result<()> {
        for target in groups {
            for member in groups {
                if member == target {
                    continue;
                }
                self.join_one(member, target, synchronization_quorum, phase_timeout)
                    .await?;
            }
        }
        Ok(())
    }

    /// One join as a single-operation phase: begin(1), issue, wait.
    async fn join_one(
        &self,
        member: &GroupAddress,
        target: &GroupAddress,
        synchronization_quorum: Option<u32>,
        phase_timeout: Duration,
    ) -> Result<()> {
        tracing::debug!("joining {} through {}", member, target);
        self.barrier.begin(1)?;
        let deadline = Instant::now() + phase_timeout;

        let client = Arc::clone(&self.client);
        let barrier = Arc::clone(&self.barrier);
        let member = member.clone();
        let mut request = JoinPeerRequest::new(target.clone());
        if let Some(quorum) = synchronization_quorum {
            request = request.with_synchronization_quorum(quorum);
        }
        tokio::spawn(async move {
            match client.join(&member, request).await {
                Ok(()) => barrier.complete_one(),
                Err(err) => barrier.fail_once(err.into()),
            }
        });

        self.barrier.wait(deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use quorate_client::MemoryCluster;
    use quorate_core::NodeId;

    fn cluster_of(n: usize) -> (Arc<MemoryCluster>, Vec<NodeId>, Vec<GroupAddress>) {
        let cluster = MemoryCluster::new();
        let mut ids = Vec::new();
        let mut groups = Vec::new();
        for i in 0..n {
            let id = cluster.add_member(&format!("http://127.0.0.1:80{:02}", i));
            groups.push(cluster.group_of(&id).unwrap());
            ids.push(id);
        }
        (cluster, ids, groups)
    }

    fn coordinator(cluster: &Arc<MemoryCluster>) -> JoinCoordinator {
        JoinCoordinator::new(cluster.clone(), Arc::new(CompletionBarrier::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_mesh_join_connects_every_member() {
        let (cluster, _, groups) = cluster_of(3);
        coordinator(&cluster)
            .join_mesh(&groups, None, Duration::from_secs(5))
            .await
            .unwrap();

        for group in &groups {
            let snapshot = cluster.get_state(group).await.unwrap();
            assert_eq!(snapshot.total_node_count(), 3);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_join_aborts_mesh_build() {
        let (cluster, ids, groups) = cluster_of(3);
        cluster.stop(&ids[2]);

        let err = coordinator(&cluster)
            .join_mesh(&groups, None, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Operation(_)), "{:?}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_member_mesh_is_trivial() {
        let (cluster, _, groups) = cluster_of(1);
        coordinator(&cluster)
            .join_mesh(&groups, None, Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_synchronization_quorum_is_carried() {
        let (cluster, _, groups) = cluster_of(2);
        coordinator(&cluster)
            .join_mesh(&groups, Some(2), Duration::from_secs(5))
            .await
            .unwrap();

        let snapshot = cluster.get_state(&groups[0]).await.unwrap();
        let own = snapshot
            .nodes
            .values()
            .find(|n| snapshot.owner.ends_with(n.id.as_str()))
            .unwrap();
        assert_eq!(own.membership_quorum, 2);
    }
}
