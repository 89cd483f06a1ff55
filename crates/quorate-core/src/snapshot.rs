//! Membership snapshots and polling rounds.
//!
//! A [`GroupSnapshot`] is what one group endpoint reports; a
//! [`ConvergenceRound`] is the set of snapshots collected across all known
//! groups in a single polling pass.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{GroupAddress, NodeId, NodeState};

/// Per-group configuration carried alongside membership state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
    /// How long an unavailable node is retained before removal (microseconds).
    pub node_removal_delay_micros: i64,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            // One hour, matching the default maintenance policy of the nodes.
            node_removal_delay_micros: 3_600_000_000,
        }
    }
}

/// The membership view reported by one group endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSnapshot {
    /// Every member this endpoint knows about, keyed by node id.
    pub nodes: BTreeMap<NodeId, NodeState>,
    /// The latest membership change this endpoint has observed.
    pub membership_update_time_micros: i64,
    /// Id of the node that produced this view.
    pub owner: String,
    /// Group configuration as seen by this endpoint.
    #[serde(default)]
    pub config: GroupConfig,
}

impl GroupSnapshot {
    /// Empty placeholder substituted for a group whose state fetch failed.
    ///
    /// A sentinel keeps the round complete: a down node must not block
    /// evaluation of the rest of the cluster.
    pub fn sentinel() -> Self {
        Self {
            nodes: BTreeMap::new(),
            membership_update_time_micros: 0,
            owner: String::new(),
            config: GroupConfig::default(),
        }
    }

    /// True when this snapshot is the failed-fetch placeholder.
    pub fn is_sentinel(&self) -> bool {
        self.nodes.is_empty() && self.owner.is_empty()
    }

    /// Number of members reporting `Available`.
    pub fn healthy_node_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_available()).count()
    }

    /// Total number of members, regardless of status.
    pub fn total_node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// All snapshots collected in one polling pass, keyed by the group address
/// they were fetched from. Built fresh every round; never mutated after the
/// round closes.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceRound {
    per_group: BTreeMap<GroupAddress, GroupSnapshot>,
}

impl ConvergenceRound {
    /// Seal a completed round.
    pub fn new(per_group: BTreeMap<GroupAddress, GroupSnapshot>) -> Self {
        Self { per_group }
    }

    /// Iterate snapshots with the address each was fetched from.
    pub fn snapshots(&self) -> impl Iterator<Item = (&GroupAddress, &GroupSnapshot)> {
        self.per_group.iter()
    }

    /// Look up the snapshot for one group.
    pub fn get(&self, group: &GroupAddress) -> Option<&GroupSnapshot> {
        self.per_group.get(group)
    }

    /// Number of groups polled this round.
    pub fn len(&self) -> usize {
        self.per_group.len()
    }

    /// True when no groups were polled.
    pub fn is_empty(&self) -> bool {
        self.per_group.is_empty()
    }

    /// The distinct membership-update timestamps observed across all
    /// snapshots. A converged, time-synchronized cluster reports exactly one.
    pub fn membership_update_times(&self) -> BTreeSet<i64> {
        self.per_group
            .values()
            .map(|s| s.membership_update_time_micros)
            .collect()
    }

    /// True when every snapshot is present (not a sentinel) and every node
    /// entry in every snapshot reports the given membership quorum.
    pub fn all_report_quorum(&self, quorum: u32) -> bool {
        !self.per_group.is_empty()
            && self.per_group.values().all(|s| {
                !s.is_sentinel() && s.nodes.values().all(|n| n.membership_quorum == quorum)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeStatus, NodeId};

    fn snapshot_with(nodes: Vec<NodeState>, time: i64) -> GroupSnapshot {
        let owner = nodes
            .first()
            .map(|n| n.id.as_str().to_string())
            .unwrap_or_default();
        GroupSnapshot {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            membership_update_time_micros: time,
            owner,
            config: GroupConfig::default(),
        }
    }

    fn node(id: &str, status: NodeStatus) -> NodeState {
        let mut state = NodeState::new(NodeId::new(id), GroupAddress::new("http://host/g"));
        state.status = status;
        state
    }

    #[test]
    fn test_sentinel_is_recognized() {
        assert!(GroupSnapshot::sentinel().is_sentinel());
        let real = snapshot_with(vec![node("a", NodeStatus::Available)], 1);
        assert!(!real.is_sentinel());
    }

    #[test]
    fn test_healthy_node_count() {
        let snapshot = snapshot_with(
            vec![
                node("a", NodeStatus::Available),
                node("b", NodeStatus::Unavailable),
                node("c", NodeStatus::Available),
            ],
            1,
        );
        assert_eq!(snapshot.healthy_node_count(), 2);
        assert_eq!(snapshot.total_node_count(), 3);
    }

    #[test]
    fn test_round_update_times_are_distinct() {
        let mut per_group = BTreeMap::new();
        per_group.insert(
            GroupAddress::new("http://a/g"),
            snapshot_with(vec![node("a", NodeStatus::Available)], 7),
        );
        per_group.insert(
            GroupAddress::new("http://b/g"),
            snapshot_with(vec![node("b", NodeStatus::Available)], 7),
        );
        per_group.insert(
            GroupAddress::new("http://c/g"),
            snapshot_with(vec![node("c", NodeStatus::Available)], 9),
        );
        let round = ConvergenceRound::new(per_group);
        let times = round.membership_update_times();
        assert_eq!(times.len(), 2);
        assert!(times.contains(&7) && times.contains(&9));
    }

    #[test]
    fn test_all_report_quorum() {
        let mut a = node("a", NodeStatus::Available);
        a.membership_quorum = 2;
        let mut b = node("b", NodeStatus::Available);
        b.membership_quorum = 2;

        let mut per_group = BTreeMap::new();
        per_group.insert(
            GroupAddress::new("http://a/g"),
            snapshot_with(vec![a.clone(), b.clone()], 1),
        );
        let round = ConvergenceRound::new(per_group.clone());
        assert!(round.all_report_quorum(2));
        assert!(!round.all_report_quorum(3));

        // A sentinel entry means some group is not reporting at all.
        per_group.insert(GroupAddress::new("http://b/g"), GroupSnapshot::sentinel());
        let round = ConvergenceRound::new(per_group);
        assert!(!round.all_report_quorum(2));
    }

    #[test]
    fn test_empty_round_never_reports_quorum() {
        assert!(!ConvergenceRound::default().all_report_quorum(1));
    }
}
