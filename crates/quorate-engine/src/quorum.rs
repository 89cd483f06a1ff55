//! Quorum updates and their propagation.
//!
//! A quorum change is sent to one member per group; the membership
//! protocol fans it out to the rest of that group. Propagation is then
//! verified by re-polling every group until all node entries report the
//! new value.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use quorate_client::{MembershipClient, PatchRequest, UpdateQuorumRequest};
use quorate_core::GroupAddress;

use crate::barrier::CompletionBarrier;
use crate::error::{EngineError, Result};
use crate::poll::ConvergencePoller;

/// Broadcasts quorum changes and waits for them to propagate.
pub struct QuorumController {
    client: Arc<dyn MembershipClient>,
    barrier: Arc<CompletionBarrier>,
    poller: ConvergencePoller,
}

impl QuorumController {
    pub fn new(client: Arc<dyn MembershipClient>, barrier: Arc<CompletionBarrier>) -> Self {
        let poller = ConvergencePoller::new(Arc::clone(&client), Arc::clone(&barrier));
        Self {
            client,
            barrier,
            poller,
        }
    }

    /// Set the membership quorum on every group and wait until every node
    /// entry of every group reports it, or the deadline elapses.
    pub async fn set_quorum(
        &self,
        groups: &[GroupAddress],
        quorum: u32,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;

        for group in groups {
            self.send_update(group, quorum, timeout).await?;
        }

        loop {
            let round = self.poller.poll_round(groups, timeout).await?;
            if round.all_report_quorum(quorum) {
                tracing::debug!("quorum {} converged across {} groups", quorum, groups.len());
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(EngineError::ConvergenceTimeout(format!(
                    "not all nodes report membership quorum {}",
                    quorum
                )));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// One group-wide quorum update as a single-operation phase.
    async fn send_update(
        &self,
        group: &GroupAddress,
        quorum: u32,
        phase_timeout: Duration,
    ) -> Result<()> {
        self.barrier.begin(1)?;
        let deadline = Instant::now() + phase_timeout;

        let client = Arc::clone(&self.client);
        let barrier = Arc::clone(&self.barrier);
        let group = group.clone();
        tokio::spawn(async move {
            let request = PatchRequest::UpdateQuorum(UpdateQuorumRequest::group_wide(quorum));
            match client.patch(&group, request).await {
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
    use crate::join::JoinCoordinator;
    use quorate_client::MemoryCluster;
    use quorate_core::NodeId;

    async fn joined_cluster(n: usize) -> (Arc<MemoryCluster>, Vec<NodeId>, Vec<GroupAddress>) {
        let cluster = MemoryCluster::new();
        let mut ids = Vec::new();
        let mut groups = Vec::new();
        for i in 0..n {
            let id = cluster.add_member(&format!("http://127.0.0.1:80{:02}", i));
            groups.push(cluster.group_of(&id).unwrap());
            ids.push(id);
        }
        let barrier = Arc::new(CompletionBarrier::new());
        JoinCoordinator::new(cluster.clone(), barrier)
            .join_mesh(&groups, None, Duration::from_secs(5))
            .await
            .unwrap();
        (cluster, ids, groups)
    }

    #[tokio::test(start_paused = true)]
    async fn test_quorum_update_propagates() {
        let (cluster, _, groups) = joined_cluster(3).await;
        let controller =
            QuorumController::new(cluster.clone(), Arc::new(CompletionBarrier::new()));

        controller
            .set_quorum(
                &groups,
                2,
                Duration::from_secs(30),
                Duration::from_millis(200),
            )
            .await
            .unwrap();

        for group in &groups {
            let snapshot = cluster.get_state(group).await.unwrap();
            for node in snapshot.nodes.values() {
                assert_eq!(node.membership_quorum, 2);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_failure_surfaces_immediately() {
        let (cluster, ids, groups) = joined_cluster(3).await;
        cluster.stop(&ids[0]);

        let controller =
            QuorumController::new(cluster.clone(), Arc::new(CompletionBarrier::new()));
        let err = controller
            .set_quorum(
                &groups,
                2,
                Duration::from_secs(5),
                Duration::from_millis(200),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Operation(_)), "{:?}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_for_down_member_times_out() {
        let (cluster, ids, groups) = joined_cluster(3).await;
        // The stopped member's entry stays at the old quorum in everyone
        // else's view; updating only the live groups can never converge.
        cluster.stop(&ids[0]);

        let controller =
            QuorumController::new(cluster.clone(), Arc::new(CompletionBarrier::new()));
        let err = controller
            .set_quorum(
                &groups[1..],
                3,
                Duration::from_secs(2),
                Duration::from_millis(200),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, EngineError::ConvergenceTimeout(_)),
            "{:?}",
            err
        );
    }
}
