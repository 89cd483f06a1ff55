//! Request bodies accepted by membership endpoints.

use serde::{Deserialize, Serialize};

use quorate_core::{GroupAddress, GroupConfig};

/// Body of a join POST: tells the receiving group to merge with the
/// membership of `target_group_address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPeerRequest {
    /// The group whose membership the receiver should merge with.
    pub target_group_address: GroupAddress,
    /// Optional quorum the receiver should adopt while synchronizing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synchronization_quorum: Option<u32>,
}

impl JoinPeerRequest {
    /// Join request with no synchronization quorum.
    pub fn new(target_group_address: GroupAddress) -> Self {
        Self {
            target_group_address,
            synchronization_quorum: None,
        }
    }

    /// Also carry a synchronization quorum.
    pub fn with_synchronization_quorum(mut self, quorum: u32) -> Self {
        self.synchronization_quorum = Some(quorum);
        self
    }
}

/// Body of a quorum-update PATCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuorumRequest {
    /// When true the receiving member fans the update out to every node
    /// in its group; when false only the receiver updates itself.
    pub is_group_update: bool,
    /// The new membership quorum.
    pub membership_quorum: u32,
}

impl UpdateQuorumRequest {
    /// A group-wide quorum update: send to any one member and the
    /// protocol propagates it to the rest of the group.
    pub fn group_wide(membership_quorum: u32) -> Self {
        Self {
            is_group_update: true,
            membership_quorum,
        }
    }
}

/// The bodies a membership endpoint accepts via PATCH.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchRequest {
    /// Update the group's membership quorum.
    UpdateQuorum(UpdateQuorumRequest),
    /// Replace the group configuration.
    ReplaceConfig(GroupConfig),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_request_wire_form() {
        let req = JoinPeerRequest::new(GroupAddress::new("http://host/g"));
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, "{\"targetGroupAddress\":\"http://host/g\"}");

        let req = req.with_synchronization_quorum(2);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"synchronizationQuorum\":2"));
    }

    #[test]
    fn test_quorum_update_wire_form() {
        let req = UpdateQuorumRequest::group_wide(3);
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, "{\"isGroupUpdate\":true,\"membershipQuorum\":3}");
    }
}
