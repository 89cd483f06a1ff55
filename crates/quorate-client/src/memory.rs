//! Deterministic in-memory cluster for testing the engine.
//!
//! Each member holds its own membership view. Views converge through lazy
//! anti-entropy: every state fetch first merges the views of the member's
//! reachable peers (higher document version wins, then newer update time)
//! and marks unreachable peers unavailable. Repeated polling therefore
//! genuinely converges over rounds, the way a live cluster does, without
//! sockets or background tasks.
//!
//! Time is a logical counter, not the wall clock, so tests are
//! reproducible.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use quorate_core::{GroupAddress, GroupConfig, GroupSnapshot, NodeId, NodeState, NodeStatus};

use crate::client::{ConvergenceProbe, MembershipClient};
use crate::error::{ClientError, Result, TransportFailure};
use crate::messages::{JoinPeerRequest, PatchRequest};

/// One simulated cluster member.
struct Member {
    node_id: NodeId,
    up: bool,
    /// This member's view of its group, keyed by node id.
    nodes: BTreeMap<NodeId, NodeState>,
    config: GroupConfig,
}

struct ClusterInner {
    members: BTreeMap<GroupAddress, Member>,
    /// Reverse index: node id to the group address it is served from.
    homes: HashMap<NodeId, GroupAddress>,
    clock_micros: i64,
}

/// An in-memory cluster of membership endpoints.
///
/// Implements [`MembershipClient`] and [`ConvergenceProbe`] so a verifier
/// can be pointed straight at it.
pub struct MemoryCluster {
    inner: Mutex<ClusterInner>,
}

impl MemoryCluster {
    /// Create an empty cluster.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ClusterInner {
                members: BTreeMap::new(),
                homes: HashMap::new(),
                clock_micros: 1_000_000,
            }),
        })
    }

    /// Add a member at the given base address, initially knowing only
    /// itself. Returns the generated node id.
    pub fn add_member(&self, base_address: &str) -> NodeId {
        let mut inner = self.inner.lock().unwrap();
        let now = inner.tick();

        let node_id = NodeId::random();
        let group = GroupAddress::from_base(base_address);
        let mut state = NodeState::available(node_id.clone(), group.clone());
        state.document_update_time_micros = now;

        let mut nodes = BTreeMap::new();
        nodes.insert(node_id.clone(), state);

        inner.homes.insert(node_id.clone(), group.clone());
        inner.members.insert(
            group,
            Member {
                node_id: node_id.clone(),
                up: true,
                nodes,
                config: GroupConfig::default(),
            },
        );
        node_id
    }

    /// Stop a member: its endpoint starts failing and its peers will mark
    /// it unavailable as they notice. Returns false for unknown ids.
    pub fn stop(&self, node: &NodeId) -> bool {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let Some(group) = inner.homes.get(node) else {
            return false;
        };
        match inner.members.get_mut(group) {
            Some(member) => {
                member.up = false;
                true
            }
            None => false,
        }
    }

    /// Bring a stopped member back. Its self entry is republished so peers
    /// pick the newer version up on their next fetch.
    pub fn restart(&self, node: &NodeId) -> bool {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let Some(group) = inner.homes.get(node).cloned() else {
            return false;
        };
        let now = inner.tick();
        match inner.members.get_mut(&group) {
            Some(member) => {
                member.up = true;
                if let Some(entry) = member.nodes.get_mut(node) {
                    entry.status = NodeStatus::Available;
                    entry.document_version += 1;
                    entry.document_update_time_micros = now;
                }
                true
            }
            None => false,
        }
    }

    /// Number of members ever added.
    pub fn member_count(&self) -> usize {
        self.inner.lock().unwrap().members.len()
    }

    /// Group address a node is served from.
    pub fn group_of(&self, node: &NodeId) -> Option<GroupAddress> {
        self.inner.lock().unwrap().homes.get(node).cloned()
    }
}

impl ClusterInner {
    fn tick(&mut self) -> i64 {
        self.clock_micros += 1_000;
        self.clock_micros
    }

    fn ensure_up(&self, group: &GroupAddress) -> Result<()> {
        match self.members.get(group) {
            Some(member) if member.up => Ok(()),
            Some(member) => Err(ClientError::unreachable(format!(
                "member {} is stopped",
                member.node_id
            ))),
            None => Err(ClientError::Transport(TransportFailure::status(404))),
        }
    }

    /// One lazy anti-entropy pass for the member at `group`: merge the
    /// views of reachable peers, mark unreachable ones unavailable.
    fn refresh(&mut self, group: &GroupAddress) -> Result<()> {
        self.ensure_up(group)?;

        let member = self.members.get(group).expect("member exists");
        let self_id = member.node_id.clone();
        let peers: Vec<(NodeId, GroupAddress)> = member
            .nodes
            .values()
            .filter(|n| n.id != self_id)
            .map(|n| (n.id.clone(), n.group_reference.clone()))
            .collect();

        let mut incoming = Vec::new();
        let mut unreachable = Vec::new();
        for (peer_id, peer_group) in peers {
            match self.members.get(&peer_group) {
                Some(peer) if peer.up => incoming.extend(peer.nodes.values().cloned()),
                _ => unreachable.push(peer_id),
            }
        }

        let now = self.tick();
        let member = self.members.get_mut(group).expect("member exists");
        for state in incoming {
            merge_entry(&mut member.nodes, state);
        }
        for peer_id in unreachable {
            if let Some(entry) = member.nodes.get_mut(&peer_id) {
                if entry.status != NodeStatus::Unavailable {
                    tracing::debug!("member {} marks {} unavailable", self_id, peer_id);
                    entry.status = NodeStatus::Unavailable;
                    entry.document_version += 1;
                    entry.document_update_time_micros = now;
                }
            }
        }
        Ok(())
    }

    fn snapshot(&self, group: &GroupAddress) -> GroupSnapshot {
        let member = self.members.get(group).expect("member exists");
        GroupSnapshot {
            membership_update_time_micros: membership_time(member),
            nodes: member.nodes.clone(),
            owner: member.node_id.as_str().to_string(),
            config: member.config.clone(),
        }
    }

    fn handle_join(&mut self, group: &GroupAddress, request: JoinPeerRequest) -> Result<()> {
        let target = request.target_group_address.clone();
        if &target == group {
            return Ok(());
        }
        self.ensure_up(group)?;
        self.ensure_up(&target)?;

        let from_target: Vec<NodeState> = self.members[&target].nodes.values().cloned().collect();
        let from_member: Vec<NodeState> = self.members[group].nodes.values().cloned().collect();

        let member = self.members.get_mut(group).expect("member exists");
        for state in from_target {
            merge_entry(&mut member.nodes, state);
        }
        let member = self.members.get_mut(&target).expect("member exists");
        for state in from_member {
            merge_entry(&mut member.nodes, state);
        }

        if let Some(quorum) = request.synchronization_quorum {
            let now = self.tick();
            self.set_self_quorum(group, quorum, now);
            self.set_self_quorum(&target, quorum, now);
        }
        Ok(())
    }

    fn handle_patch(&mut self, group: &GroupAddress, request: PatchRequest) -> Result<()> {
        self.ensure_up(group)?;
        match request {
            PatchRequest::UpdateQuorum(update) => {
                let now = self.tick();
                if update.is_group_update {
                    // Fan out: every reachable member named in the
                    // receiver's view applies the quorum to its own entry.
                    let ids: Vec<NodeId> = self.members[group].nodes.keys().cloned().collect();
                    for id in ids {
                        let home = match self.homes.get(&id) {
                            Some(home) => home.clone(),
                            None => continue,
                        };
                        let reachable =
                            self.members.get(&home).map(|m| m.up).unwrap_or(false);
                        if reachable {
                            self.set_self_quorum(&home, update.membership_quorum, now);
                        }
                    }
                } else {
                    self.set_self_quorum(group, update.membership_quorum, now);
                }
            }
            PatchRequest::ReplaceConfig(config) => {
                if let Some(member) = self.members.get_mut(group) {
                    member.config = config;
                }
            }
        }
        Ok(())
    }

    /// Apply a quorum to the member's own entry in its own view.
    fn set_self_quorum(&mut self, group: &GroupAddress, quorum: u32, now: i64) {
        if let Some(member) = self.members.get_mut(group) {
            let self_id = member.node_id.clone();
            if let Some(entry) = member.nodes.get_mut(&self_id) {
                if entry.membership_quorum != quorum {
                    entry.membership_quorum = quorum;
                    entry.document_version += 1;
                    entry.document_update_time_micros = now;
                }
            }
        }
    }
}

/// The membership-update time a member reports: the latest change it has
/// observed across all entries in its view.
fn membership_time(member: &Member) -> i64 {
    member
        .nodes
        .values()
        .map(|n| n.document_update_time_micros)
        .max()
        .unwrap_or(0)
}

/// Merge one incoming entry into a view. Higher document version wins,
/// then newer update time; equal entries are left alone.
fn merge_entry(nodes: &mut BTreeMap<NodeId, NodeState>, incoming: NodeState) {
    match nodes.entry(incoming.id.clone()) {
        Entry::Occupied(mut occupied) => {
            let current = occupied.get();
            let newer = (incoming.document_version, incoming.document_update_time_micros)
                > (
                    current.document_version,
                    current.document_update_time_micros,
                );
            if newer {
                occupied.insert(incoming);
            }
        }
        Entry::Vacant(vacant) => {
            vacant.insert(incoming);
        }
    }
}

#[async_trait]
impl MembershipClient for MemoryCluster {
    async fn get_state(&self, group: &GroupAddress) -> Result<GroupSnapshot> {
        let mut inner = self.inner.lock().unwrap();
        inner.refresh(group)?;
        Ok(inner.snapshot(group))
    }

    async fn join(&self, group: &GroupAddress, request: JoinPeerRequest) -> Result<()> {
        self.inner.lock().unwrap().handle_join(group, request)
    }

    async fn patch(&self, group: &GroupAddress, request: PatchRequest) -> Result<()> {
        self.inner.lock().unwrap().handle_patch(group, request)
    }
}

#[async_trait]
impl ConvergenceProbe for MemoryCluster {
    async fn check(&self, snapshot: &GroupSnapshot) -> Result<()> {
        let inner = self.inner.lock().unwrap();
        for node in snapshot.nodes.values() {
            if node.status != NodeStatus::Available {
                continue;
            }
            let member = match inner.members.get(&node.group_reference) {
                Some(member) if member.up => member,
                _ => {
                    return Err(ClientError::Convergence(format!(
                        "member {} is not reachable",
                        node.id
                    )))
                }
            };
            let time = membership_time(member);
            if time != snapshot.membership_update_time_micros {
                return Err(ClientError::Convergence(format!(
                    "member {} reports membership time {}, snapshot has {}",
                    node.id, time, snapshot.membership_update_time_micros
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::UpdateQuorumRequest;

    async fn join(cluster: &MemoryCluster, member: &GroupAddress, target: &GroupAddress) {
        cluster
            .join(member, JoinPeerRequest::new(target.clone()))
            .await
            .unwrap();
    }

    fn three_members(cluster: &MemoryCluster) -> Vec<(NodeId, GroupAddress)> {
        (0..3)
            .map(|i| {
                let id = cluster.add_member(&format!("http://127.0.0.1:800{}", i));
                let group = cluster.group_of(&id).unwrap();
                (id, group)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_new_member_knows_only_itself() {
        let cluster = MemoryCluster::new();
        let id = cluster.add_member("http://127.0.0.1:8000");
        let group = cluster.group_of(&id).unwrap();

        let snapshot = cluster.get_state(&group).await.unwrap();
        assert_eq!(snapshot.total_node_count(), 1);
        assert_eq!(snapshot.healthy_node_count(), 1);
        assert_eq!(snapshot.owner, id.as_str());
    }

    #[tokio::test]
    async fn test_join_unions_both_views() {
        let cluster = MemoryCluster::new();
        let members = three_members(&cluster);
        join(&cluster, &members[1].1, &members[0].1).await;

        let a = cluster.get_state(&members[0].1).await.unwrap();
        let b = cluster.get_state(&members[1].1).await.unwrap();
        assert_eq!(a.total_node_count(), 2);
        assert_eq!(b.total_node_count(), 2);
    }

    #[tokio::test]
    async fn test_partial_joins_converge_through_gossip() {
        let cluster = MemoryCluster::new();
        let members = three_members(&cluster);
        // Only a chain of joins, no full mesh.
        join(&cluster, &members[1].1, &members[0].1).await;
        join(&cluster, &members[2].1, &members[1].1).await;

        // Member 0 has not seen member 2 yet, but learns of it by pulling
        // from member 1 on its next fetch.
        let a = cluster.get_state(&members[0].1).await.unwrap();
        assert_eq!(a.total_node_count(), 3);

        // After everyone pulled once more, all views agree on one
        // membership time.
        let mut times = std::collections::BTreeSet::new();
        for (_, group) in &members {
            let snapshot = cluster.get_state(group).await.unwrap();
            times.insert(snapshot.membership_update_time_micros);
        }
        assert_eq!(times.len(), 1);
    }

    #[tokio::test]
    async fn test_stopped_member_fails_fetch_and_is_marked() {
        let cluster = MemoryCluster::new();
        let members = three_members(&cluster);
        join(&cluster, &members[1].1, &members[0].1).await;
        join(&cluster, &members[2].1, &members[0].1).await;
        join(&cluster, &members[2].1, &members[1].1).await;

        assert!(cluster.stop(&members[2].0));

        let err = cluster.get_state(&members[2].1).await.unwrap_err();
        match err {
            ClientError::Transport(failure) => {
                assert!(!failure.timeout);
                assert_eq!(failure.status, 503);
            }
            other => panic!("expected transport failure, got {:?}", other),
        }

        let a = cluster.get_state(&members[0].1).await.unwrap();
        assert_eq!(a.healthy_node_count(), 2);
        assert_eq!(a.total_node_count(), 3);
        assert_eq!(
            a.nodes[&members[2].0].status,
            NodeStatus::Unavailable
        );
    }

    #[tokio::test]
    async fn test_restart_republishes_availability() {
        let cluster = MemoryCluster::new();
        let members = three_members(&cluster);
        join(&cluster, &members[1].1, &members[0].1).await;

        cluster.stop(&members[1].0);
        let a = cluster.get_state(&members[0].1).await.unwrap();
        assert_eq!(a.healthy_node_count(), 1);

        cluster.restart(&members[1].0);
        let a = cluster.get_state(&members[0].1).await.unwrap();
        assert_eq!(a.healthy_node_count(), 2);
    }

    #[tokio::test]
    async fn test_group_wide_quorum_fans_out() {
        let cluster = MemoryCluster::new();
        let members = three_members(&cluster);
        join(&cluster, &members[1].1, &members[0].1).await;
        join(&cluster, &members[2].1, &members[0].1).await;
        join(&cluster, &members[2].1, &members[1].1).await;

        cluster
            .patch(
                &members[0].1,
                PatchRequest::UpdateQuorum(UpdateQuorumRequest::group_wide(2)),
            )
            .await
            .unwrap();

        // Each member immediately reports the quorum for itself; stale
        // entries for peers catch up as views merge on subsequent fetches.
        for _ in 0..3 {
            for (_, group) in &members {
                let _ = cluster.get_state(group).await.unwrap();
            }
        }
        for (id, group) in &members {
            let snapshot = cluster.get_state(group).await.unwrap();
            for node in snapshot.nodes.values() {
                assert_eq!(
                    node.membership_quorum, 2,
                    "entry {} in view of {} still has old quorum",
                    node.id, id
                );
            }
        }
    }

    #[tokio::test]
    async fn test_probe_accepts_stable_view_and_rejects_stale_one() {
        let cluster = MemoryCluster::new();
        let members = three_members(&cluster);
        join(&cluster, &members[1].1, &members[0].1).await;
        join(&cluster, &members[2].1, &members[0].1).await;
        join(&cluster, &members[2].1, &members[1].1).await;

        for _ in 0..2 {
            for (_, group) in &members {
                let _ = cluster.get_state(group).await.unwrap();
            }
        }
        let snapshot = cluster.get_state(&members[0].1).await.unwrap();
        cluster.check(&snapshot).await.unwrap();

        // Stop a member the snapshot still lists as available.
        cluster.stop(&members[1].0);
        let err = cluster.check(&snapshot).await.unwrap_err();
        assert!(matches!(err, ClientError::Convergence(_)));
    }

    #[tokio::test]
    async fn test_replace_config() {
        let cluster = MemoryCluster::new();
        let id = cluster.add_member("http://127.0.0.1:8000");
        let group = cluster.group_of(&id).unwrap();

        let config = GroupConfig {
            node_removal_delay_micros: 5_000_000,
        };
        cluster
            .patch(&group, PatchRequest::ReplaceConfig(config.clone()))
            .await
            .unwrap();

        let snapshot = cluster.get_state(&group).await.unwrap();
        assert_eq!(snapshot.config, config);
    }

    #[tokio::test]
    async fn test_unknown_group_is_not_found() {
        let cluster = MemoryCluster::new();
        let err = cluster
            .get_state(&GroupAddress::new("http://127.0.0.1:9999/core/node-groups/default"))
            .await
            .unwrap_err();
        match err {
            ClientError::Transport(failure) => assert_eq!(failure.status, 404),
            other => panic!("expected transport failure, got {:?}", other),
        }
    }
}
