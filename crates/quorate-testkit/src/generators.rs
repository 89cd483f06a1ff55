//! Proptest strategies and round builders for membership state.

use std::collections::BTreeMap;

use proptest::prelude::*;

use quorate_core::{
    ConvergenceRound, GroupAddress, GroupConfig, GroupSnapshot, NodeId, NodeState, NodeStatus,
};

/// Strategy for node ids in the wire's usual shape (16 hex characters).
pub fn arb_node_id() -> impl Strategy<Value = NodeId> {
    "[0-9a-f]{16}".prop_map(|s| NodeId::new(s))
}

/// Strategy over all node statuses.
pub fn arb_node_status() -> impl Strategy<Value = NodeStatus> {
    prop_oneof![
        Just(NodeStatus::Unknown),
        Just(NodeStatus::Available),
        Just(NodeStatus::Unavailable),
        Just(NodeStatus::Synchronizing),
        Just(NodeStatus::Replaced),
    ]
}

/// Strategy for node entries homed in the given group.
pub fn arb_node_state(group: &str) -> impl Strategy<Value = NodeState> {
    let group = GroupAddress::new(group);
    (
        arb_node_id(),
        arb_node_status(),
        1u32..=5,
        0u64..50,
        0i64..1_000_000,
    )
        .prop_map(move |(id, status, quorum, version, time)| {
            let mut state = NodeState::new(id, group.clone());
            state.status = status;
            state.membership_quorum = quorum;
            state.document_version = version;
            state.document_update_time_micros = time;
            state
        })
}

/// A fully converged round: `n` groups, each seeing the same `n` available
/// members and the same membership-update time.
pub fn converged_round(n: usize) -> ConvergenceRound {
    let groups: Vec<GroupAddress> = (0..n)
        .map(|i| {
            GroupAddress::new(format!(
                "http://127.0.0.1:80{:02}/core/node-groups/default",
                i
            ))
        })
        .collect();

    let mut nodes = BTreeMap::new();
    for (i, group) in groups.iter().enumerate() {
        let mut state =
            NodeState::available(NodeId::new(format!("node-{:02}", i)), group.clone());
        state.document_update_time_micros = 64;
        nodes.insert(state.id.clone(), state);
    }

    let mut per_group = BTreeMap::new();
    for (i, group) in groups.iter().enumerate() {
        per_group.insert(
            group.clone(),
            GroupSnapshot {
                nodes: nodes.clone(),
                membership_update_time_micros: 64,
                owner: format!("node-{:02}", i),
                config: GroupConfig::default(),
            },
        );
    }
    ConvergenceRound::new(per_group)
}
