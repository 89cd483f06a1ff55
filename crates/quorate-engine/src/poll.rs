//! Parallel state-fetch rounds across all known groups.
//!
//! One phase per round, one spawned fetch per group. A failed fetch is
//! absorbed into a sentinel snapshot and still completes the phase: a down
//! node must not block evaluation of the rest of the cluster.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use quorate_client::MembershipClient;
use quorate_core::{ConvergenceRound, GroupAddress, GroupSnapshot};

use crate::barrier::CompletionBarrier;
use crate::error::Result;

/// Fans out concurrent state fetches and seals the results into a
/// [`ConvergenceRound`].
pub struct ConvergencePoller {
    client: Arc<dyn MembershipClient>,
    barrier: Arc<CompletionBarrier>,
}

impl ConvergencePoller {
    pub fn new(client: Arc<dyn MembershipClient>, barrier: Arc<CompletionBarrier>) -> Self {
        Self { client, barrier }
    }

    /// Fetch every group's state concurrently and seal the round. The
    /// returned round always has one entry per requested group; entries
    /// for failed fetches are sentinels.
    pub async fn poll_round(
        &self,
        groups: &[GroupAddress],
        phase_timeout: Duration,
    ) -> Result<ConvergenceRound> {
        self.barrier.begin(groups.len() as u64)?;
        let deadline = Instant::now() + phase_timeout;

        let collected: Arc<Mutex<BTreeMap<GroupAddress, GroupSnapshot>>> =
            Arc::new(Mutex::new(BTreeMap::new()));

        for group in groups {
            let client = Arc::clone(&self.client);
            let barrier = Arc::clone(&self.barrier);
            let collected = Arc::clone(&collected);
            let group = group.clone();
            tokio::spawn(async move {
                let snapshot = match client.get_state(&group).await {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        // Failure is expected here: the group's node may
                        // simply be down. Substitute the sentinel so the
                        // round still completes.
                        tracing::warn!("group {} failed state fetch: {}", group, err);
                        GroupSnapshot::sentinel()
                    }
                };
                let mut map = collected.lock().unwrap();
                map.insert(group, snapshot);
                barrier.complete_one();
            });
        }

        self.barrier.wait(deadline).await?;

        let per_group = std::mem::take(&mut *collected.lock().unwrap());
        Ok(ConvergenceRound::new(per_group))
    }
}
