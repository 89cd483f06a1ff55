//! Strong type definitions for membership state.
//!
//! Identifiers are newtypes to prevent misuse at compile time: a node id
//! is never interchangeable with a group address.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known path of the default membership group on every node.
pub const DEFAULT_GROUP_PATH: &str = "/core/node-groups/default";

/// Unique identifier for a cluster node.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create from a caller-supplied identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random node id (16 hex characters).
    pub fn random() -> Self {
        use rand::Rng;
        let bytes: [u8; 8] = rand::thread_rng().gen();
        Self(hex::encode(bytes))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty identifier (invalid on the wire).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Address of one group's membership endpoint, e.g.
/// `http://127.0.0.1:8000/core/node-groups/default`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupAddress(String);

impl GroupAddress {
    /// Wrap an already-complete group address.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Derive the default membership-group address from a node's base address.
    pub fn from_base(base: &str) -> Self {
        Self::from_base_with_path(base, DEFAULT_GROUP_PATH)
    }

    /// Derive a group address from a base address and an explicit group path.
    pub fn from_base_with_path(base: &str, path: &str) -> Self {
        let base = base.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Self(format!("{}/{}", base, path))
    }

    /// Borrow the raw address.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty address (invalid on the wire).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupAddress({})", self.0)
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reported status of a node, as carried in membership documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    /// Status has not been determined yet.
    Unknown,
    /// Node is healthy and participating.
    Available,
    /// Node is known but currently unreachable.
    Unavailable,
    /// Node is catching up with the group.
    Synchronizing,
    /// Node was replaced by a newer instance at the same address.
    Replaced,
}

/// Capability tag a node advertises to its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeOption {
    /// Full peer: replicates and votes.
    Peer,
    /// Observer: receives membership updates but does not vote.
    Observer,
}

/// The capability set expected of a node when no explicit expectation is
/// configured for its group.
pub fn default_options() -> BTreeSet<NodeOption> {
    let mut set = BTreeSet::new();
    set.insert(NodeOption::Peer);
    set
}

/// One node's entry in a membership document. Read-only from the engine's
/// perspective: nodes produce these, the engine only inspects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    /// The node's unique identifier.
    pub id: NodeId,
    /// Address of the membership group this entry belongs to.
    pub group_reference: GroupAddress,
    /// Reported health.
    pub status: NodeStatus,
    /// Advertised capability flags.
    pub options: BTreeSet<NodeOption>,
    /// Minimum number of nodes that must agree for membership-affecting
    /// decisions.
    pub membership_quorum: u32,
    /// Version of this entry; higher versions supersede lower ones.
    pub document_version: u64,
    /// When this entry last changed (microseconds).
    pub document_update_time_micros: i64,
    /// Id of the node that owns this entry.
    pub document_owner: String,
}

impl NodeState {
    /// Create an entry with `Unknown` status and default capabilities.
    pub fn new(id: NodeId, group_reference: GroupAddress) -> Self {
        Self {
            document_owner: id.as_str().to_string(),
            id,
            group_reference,
            status: NodeStatus::Unknown,
            options: default_options(),
            membership_quorum: 1,
            document_version: 0,
            document_update_time_micros: 0,
        }
    }

    /// Create an entry already marked `Available`.
    pub fn available(id: NodeId, group_reference: GroupAddress) -> Self {
        let mut state = Self::new(id, group_reference);
        state.status = NodeStatus::Available;
        state
    }

    /// True when the node reports itself healthy.
    pub fn is_available(&self) -> bool {
        self.status == NodeStatus::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_address_from_base() {
        let addr = GroupAddress::from_base("http://127.0.0.1:8000");
        assert_eq!(
            addr.as_str(),
            "http://127.0.0.1:8000/core/node-groups/default"
        );
    }

    #[test]
    fn test_group_address_trailing_slash() {
        let a = GroupAddress::from_base("http://host:1/");
        let b = GroupAddress::from_base("http://host:1");
        assert_eq!(a, b);
    }

    #[test]
    fn test_group_address_custom_path() {
        let addr = GroupAddress::from_base_with_path("http://host:1", "/core/node-groups/custom");
        assert_eq!(addr.as_str(), "http://host:1/core/node-groups/custom");
    }

    #[test]
    fn test_node_id_random_is_unique() {
        let a = NodeId::random();
        let b = NodeId::random();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn test_node_state_defaults() {
        let state = NodeState::new(NodeId::new("n1"), GroupAddress::new("http://host/g"));
        assert_eq!(state.status, NodeStatus::Unknown);
        assert_eq!(state.membership_quorum, 1);
        assert!(state.options.contains(&NodeOption::Peer));
        assert_eq!(state.document_owner, "n1");
    }

    #[test]
    fn test_status_wire_form() {
        let json = serde_json::to_string(&NodeStatus::Available).unwrap();
        assert_eq!(json, "\"AVAILABLE\"");
        let json = serde_json::to_string(&NodeOption::Peer).unwrap();
        assert_eq!(json, "\"PEER\"");
    }

    #[test]
    fn test_node_state_wire_form() {
        let state = NodeState::available(NodeId::new("n1"), GroupAddress::new("http://host/g"));
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"membershipQuorum\":1"));
        assert!(json.contains("\"documentUpdateTimeMicros\":0"));
    }

    proptest::proptest! {
        #[test]
        fn from_base_always_appends_group_path(
            host in "[a-z]{1,8}",
            port in 1024u16..9999,
            slash in proptest::bool::ANY,
        ) {
            let base = format!("http://{}:{}{}", host, port, if slash { "/" } else { "" });
            let addr = GroupAddress::from_base(&base);
            proptest::prop_assert!(addr.as_str().ends_with(DEFAULT_GROUP_PATH));
            proptest::prop_assert!(!addr.as_str().contains("//core"));
        }
    }
}
