//! Error types for snapshot validation.

use thiserror::Error;

use crate::types::{GroupAddress, NodeId, NodeOption};

/// Structural problems in a membership snapshot.
///
/// These are hard failures, not retryable disagreement: a snapshot that
/// names no owner or carries an empty node id will not fix itself with
/// another polling round.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("group {group} reports a node with an empty id")]
    MissingNodeId { group: GroupAddress },

    #[error("node {node} in group {group} has no group reference")]
    MissingGroupReference { node: NodeId, group: GroupAddress },

    #[error("group {group} owner {owner:?} matches {matches} member nodes, expected exactly one")]
    OwnerMismatch {
        group: GroupAddress,
        owner: String,
        matches: usize,
    },

    #[error("node {node} is missing expected capability {missing:?}")]
    MissingCapability { node: NodeId, missing: NodeOption },
}
