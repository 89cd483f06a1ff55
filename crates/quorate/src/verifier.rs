//! The Verifier: unified API for cluster convergence verification.
//!
//! A Verifier owns the peer registry and the coordination machinery, and
//! drives the whole flow: build the join mesh, poll all groups, evaluate
//! each round, confirm with a second opinion, and report all-or-timeout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use quorate_client::{ConvergenceProbe, MembershipClient, PatchRequest};
use quorate_core::{
    evaluate_round, ConvergenceCriteria, ConvergenceRound, GroupConfig, NodeId, NodeState,
    RoundVerdict,
};
use quorate_engine::{
    CompletionBarrier, ConvergencePoller, EngineError, JoinCoordinator, PeerEntry, PeerRegistry,
    QuorumController,
};

use crate::error::{Result, VerifierError};

/// How many read passes the post-join membership sweep performs per group.
const SWEEP_ROUNDS: usize = 10;

/// Configuration for the Verifier.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Deadline for each verification wait and each barrier phase.
    pub timeout: Duration,
    /// Fastest maintenance interval configured on the nodes under test;
    /// the convergence loop sleeps twice this between rounds.
    pub maintenance_interval: Duration,
    /// Pause between propagation checks after a quorum update.
    pub quorum_poll_interval: Duration,
    /// Base addresses of externally managed peers. Non-empty switches the
    /// verifier into remote mode: peers are registered from this list and
    /// joins are skipped, since remote peers are assumed pre-joined.
    pub remote_peers: Vec<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            maintenance_interval: Duration::from_millis(100),
            quorum_poll_interval: Duration::from_millis(500),
            remote_peers: Vec::new(),
        }
    }
}

/// Drives a set of cluster nodes to a verified, converged membership view.
pub struct Verifier {
    client: Arc<dyn MembershipClient>,
    probe: Arc<dyn ConvergenceProbe>,
    registry: PeerRegistry,
    barrier: Arc<CompletionBarrier>,
    join: JoinCoordinator,
    poller: ConvergencePoller,
    quorum: QuorumController,
    config: VerifierConfig,
    /// Nodes last seen available in a converged round, for diagnostics.
    last_known_good: Mutex<HashMap<NodeId, NodeState>>,
    remote_mode: bool,
}

impl Verifier {
    /// Create a verifier over the given client and probe.
    pub fn new(
        client: Arc<dyn MembershipClient>,
        probe: Arc<dyn ConvergenceProbe>,
        config: VerifierConfig,
    ) -> Self {
        let barrier = Arc::new(CompletionBarrier::new());
        let registry = PeerRegistry::new();
        let remote_mode = !config.remote_peers.is_empty();
        for base in &config.remote_peers {
            registry.register(base, None);
        }
        let join = JoinCoordinator::new(Arc::clone(&client), Arc::clone(&barrier));
        let poller = ConvergencePoller::new(Arc::clone(&client), Arc::clone(&barrier));
        let quorum = QuorumController::new(Arc::clone(&client), Arc::clone(&barrier));
        Self {
            client,
            probe,
            registry,
            barrier,
            join,
            poller,
            quorum,
            config,
            last_known_good: Mutex::new(HashMap::new()),
            remote_mode,
        }
    }

    /// Register an in-process peer by base address.
    pub fn register_peer(&self, base_address: &str, node_id: NodeId) -> PeerEntry {
        self.registry.register(base_address, Some(node_id))
    }

    /// Remove a peer. Idempotent.
    pub fn unregister_peer(&self, base_address: &str) {
        self.registry.unregister(base_address);
    }

    /// Pick any one known peer's base address, extended with `path`.
    pub fn pick_random_peer(&self, path: &str) -> Option<String> {
        self.registry.pick_random(path)
    }

    /// The peer table.
    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// True when peers are externally managed and joins are skipped.
    pub fn is_remote_mode(&self) -> bool {
        self.remote_mode
    }

    /// Build the pairwise join mesh over all registered peers, wait for
    /// membership to converge, then sweep every group's membership with
    /// repeated reads.
    ///
    /// In remote mode the mesh build is skipped and the expected healthy
    /// count is forced to the registered peer count.
    pub async fn join_and_verify(&self, criteria: ConvergenceCriteria) -> Result<()> {
        let groups = self.registry.group_addresses();
        if groups.is_empty() {
            return Err(VerifierError::NoPeers);
        }
        let mut criteria = criteria;
        if self.remote_mode {
            criteria.expected_healthy = self.registry.len();
        } else {
            self.join
                .join_mesh(&groups, None, self.config.timeout)
                .await?;
        }
        self.wait_for_convergence(criteria).await?;
        self.sweep_membership(SWEEP_ROUNDS).await
    }

    /// Poll all groups until they agree per the criteria or the configured
    /// deadline elapses.
    ///
    /// On convergence the available nodes of the final round are recorded
    /// in the last-known-good table, and the convergence probe is consulted
    /// as a second opinion; a probe rejection triggers another round. On
    /// deadline every snapshot of the final round is dumped for diagnosis
    /// before the timeout is raised.
    pub async fn wait_for_convergence(&self, criteria: ConvergenceCriteria) -> Result<()> {
        let groups = self.registry.group_addresses();
        if groups.is_empty() {
            return Err(VerifierError::NoPeers);
        }
        let deadline = Instant::now() + self.config.timeout;
        let pause = self.config.maintenance_interval * 2;

        loop {
            let round = self.poller.poll_round(&groups, self.config.timeout).await?;

            match evaluate_round(&round, &criteria)? {
                RoundVerdict::Converged => {
                    self.record_last_known_good(&round);
                    if !criteria.require_time_sync {
                        return Ok(());
                    }
                    match round.snapshots().next() {
                        Some((_, representative)) => {
                            match self.probe.check(representative).await {
                                Ok(()) => return Ok(()),
                                Err(err) => {
                                    tracing::info!(
                                        "convergence probe rejected round, will retry: {}",
                                        err
                                    );
                                }
                            }
                        }
                        None => return Ok(()),
                    }
                }
                RoundVerdict::NotConverged { reason } => {
                    tracing::debug!("not converged yet: {}", reason);
                }
            }

            if Instant::now() >= deadline {
                dump_round(&round);
                return Err(EngineError::ConvergenceTimeout(
                    "membership did not converge".to_string(),
                )
                .into());
            }
            tokio::time::sleep(pause).await;
        }
    }

    /// Set the membership quorum on every group and wait for every node to
    /// report it.
    pub async fn set_quorum(&self, quorum: u32) -> Result<()> {
        let groups = self.registry.group_addresses();
        if groups.is_empty() {
            return Err(VerifierError::NoPeers);
        }
        self.quorum
            .set_quorum(
                &groups,
                quorum,
                self.config.timeout,
                self.config.quorum_poll_interval,
            )
            .await?;
        Ok(())
    }

    /// Replace the group configuration on every registered group.
    pub async fn set_group_config(&self, config: GroupConfig) -> Result<()> {
        let groups = self.registry.group_addresses();
        if groups.is_empty() {
            return Err(VerifierError::NoPeers);
        }
        self.barrier.begin(groups.len() as u64)?;
        let deadline = Instant::now() + self.config.timeout;
        for group in &groups {
            let client = Arc::clone(&self.client);
            let barrier = Arc::clone(&self.barrier);
            let group = group.clone();
            let config = config.clone();
            tokio::spawn(async move {
                match client.patch(&group, PatchRequest::ReplaceConfig(config)).await {
                    Ok(()) => barrier.complete_one(),
                    Err(err) => barrier.fail_once(err.into()),
                }
            });
        }
        self.barrier.wait(deadline).await?;
        Ok(())
    }

    /// Read every group's membership `rounds` times concurrently, logging
    /// any group that reports fewer members than there are registered
    /// peers. Exercises read fan-out after a join without failing the
    /// verification.
    pub async fn sweep_membership(&self, rounds: usize) -> Result<()> {
        let groups = self.registry.group_addresses();
        if groups.is_empty() || rounds == 0 {
            return Ok(());
        }
        let known = groups.len();
        self.barrier.begin((groups.len() * rounds) as u64)?;
        let deadline = Instant::now() + self.config.timeout;
        for _ in 0..rounds {
            for group in &groups {
                let client = Arc::clone(&self.client);
                let barrier = Arc::clone(&self.barrier);
                let group = group.clone();
                tokio::spawn(async move {
                    match client.get_state(&group).await {
                        Ok(snapshot) => {
                            if snapshot.total_node_count() < known {
                                tracing::warn!(
                                    "group {} reports {} members",
                                    group,
                                    snapshot.total_node_count()
                                );
                            }
                        }
                        Err(err) => {
                            tracing::warn!("group {} failed sweep fetch: {}", group, err);
                        }
                    }
                    barrier.complete_one();
                });
            }
        }
        self.barrier.wait(deadline).await?;
        Ok(())
    }

    /// Snapshot of the last-known-good node table.
    pub fn last_known_good(&self) -> HashMap<NodeId, NodeState> {
        self.last_known_good.lock().unwrap().clone()
    }

    /// Switch into teardown mode: failures from straggling completions are
    /// discarded from here on.
    pub fn shutdown(&self) {
        self.barrier.shutdown();
    }

    fn record_last_known_good(&self, round: &ConvergenceRound) {
        let mut table = self.last_known_good.lock().unwrap();
        for (_, snapshot) in round.snapshots() {
            for node in snapshot.nodes.values() {
                if node.is_available() {
                    table.insert(node.id.clone(), node.clone());
                }
            }
        }
    }
}

/// Dump every snapshot of a round, one warning per group.
fn dump_round(round: &ConvergenceRound) {
    for (group, snapshot) in round.snapshots() {
        let body = serde_json::to_string_pretty(snapshot)
            .unwrap_or_else(|err| format!("<unserializable snapshot: {}>", err));
        tracing::warn!("{} reports {}", group, body);
    }
}
