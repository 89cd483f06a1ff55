//! Convergence evaluation over a polling round.
//!
//! A round converges when every snapshot agrees on healthy count, total
//! membership (when a target is given), and - when time synchronization is
//! required - a single membership-update timestamp across all groups.

use std::collections::{BTreeSet, HashMap};

use crate::error::ValidationError;
use crate::snapshot::{ConvergenceRound, GroupSnapshot};
use crate::types::{default_options, GroupAddress, NodeOption};

/// What "converged" means for one wait.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    /// Number of nodes every group must report as `Available`.
    pub expected_healthy: usize,
    /// Exact total membership every group must report, if bounded.
    pub expected_total: Option<usize>,
    /// Capability flags every node of a given group must advertise.
    /// Groups without an entry are held to [`default_options`].
    pub expected_options: HashMap<GroupAddress, BTreeSet<NodeOption>>,
    /// Whether all groups must also agree on one membership-update
    /// timestamp.
    pub require_time_sync: bool,
}

impl ConvergenceCriteria {
    /// Criteria requiring `expected_healthy` available nodes per group and
    /// time synchronization, with no bound on total membership.
    pub fn healthy(expected_healthy: usize) -> Self {
        Self {
            expected_healthy,
            expected_total: None,
            expected_options: HashMap::new(),
            require_time_sync: true,
        }
    }

    /// Also require an exact total member count per group.
    pub fn with_total(mut self, expected_total: usize) -> Self {
        self.expected_total = Some(expected_total);
        self
    }

    /// Do not require the groups to agree on a membership timestamp.
    pub fn without_time_sync(mut self) -> Self {
        self.require_time_sync = false;
        self
    }

    /// Expect a specific capability set for nodes of one group.
    pub fn expect_options(
        mut self,
        group: GroupAddress,
        options: BTreeSet<NodeOption>,
    ) -> Self {
        self.expected_options.insert(group, options);
        self
    }
}

/// Outcome of evaluating one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundVerdict {
    /// All snapshots agree; the cluster has converged.
    Converged,
    /// At least one snapshot disagrees; worth retrying until the deadline.
    NotConverged {
        /// Human-readable description of the first disagreement found.
        reason: String,
    },
}

impl RoundVerdict {
    /// True when the round converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, RoundVerdict::Converged)
    }
}

/// Evaluate one polling round against the given criteria.
///
/// Count disagreements come back as [`RoundVerdict::NotConverged`];
/// structural problems come back as [`ValidationError`] and should abort
/// the wait rather than be retried.
pub fn evaluate_round(
    round: &ConvergenceRound,
    criteria: &ConvergenceCriteria,
) -> Result<RoundVerdict, ValidationError> {
    for (group, snapshot) in round.snapshots() {
        if let Some(expected_total) = criteria.expected_total {
            let total = snapshot.total_node_count();
            if total != expected_total {
                return Ok(RoundVerdict::NotConverged {
                    reason: format!(
                        "group {} reports {} members, expected {}",
                        group, total, expected_total
                    ),
                });
            }
        }

        let healthy = snapshot.healthy_node_count();
        if healthy != criteria.expected_healthy {
            return Ok(RoundVerdict::NotConverged {
                reason: format!(
                    "group {} reports {} healthy members, expected {}",
                    group, healthy, criteria.expected_healthy
                ),
            });
        }

        validate_nodes(group, snapshot, &criteria.expected_options)?;
    }

    if criteria.require_time_sync {
        let times = round.membership_update_times();
        if times.len() != 1 {
            return Ok(RoundVerdict::NotConverged {
                reason: format!("membership update times did not converge: {:?}", times),
            });
        }
    }

    Ok(RoundVerdict::Converged)
}

/// Structural validation of one snapshot.
///
/// Every node must carry a non-empty id and group reference and advertise
/// at least the expected capability set for its group; exactly one node's
/// id must match the snapshot's declared owner.
pub fn validate_nodes(
    group: &GroupAddress,
    snapshot: &GroupSnapshot,
    expected_options: &HashMap<GroupAddress, BTreeSet<NodeOption>>,
) -> Result<(), ValidationError> {
    let mut owner_matches = 0;

    for node in snapshot.nodes.values() {
        if node.id.is_empty() {
            return Err(ValidationError::MissingNodeId {
                group: group.clone(),
            });
        }
        if node.group_reference.is_empty() {
            return Err(ValidationError::MissingGroupReference {
                node: node.id.clone(),
                group: group.clone(),
            });
        }
        if snapshot.owner.ends_with(node.id.as_str()) {
            owner_matches += 1;
        }

        let expected = expected_options
            .get(&node.group_reference)
            .cloned()
            .unwrap_or_else(default_options);
        for option in expected {
            if !node.options.contains(&option) {
                return Err(ValidationError::MissingCapability {
                    node: node.id.clone(),
                    missing: option,
                });
            }
        }
    }

    if owner_matches != 1 {
        return Err(ValidationError::OwnerMismatch {
            group: group.clone(),
            owner: snapshot.owner.clone(),
            matches: owner_matches,
        });
    }

    Ok(())
}
