//! Client traits for membership endpoints.
//!
//! Implementations must be thread-safe (Send + Sync); the engine fans
//! calls out from spawned tasks.

use async_trait::async_trait;

use quorate_core::{GroupAddress, GroupSnapshot};

use crate::error::Result;
use crate::messages::{JoinPeerRequest, PatchRequest};

/// The three logical operations a membership endpoint exposes.
#[async_trait]
pub trait MembershipClient: Send + Sync {
    /// Fetch the group's membership state, with node details expanded.
    async fn get_state(&self, group: &GroupAddress) -> Result<GroupSnapshot>;

    /// Ask the member at `group` to merge with another group's membership.
    async fn join(&self, group: &GroupAddress, request: JoinPeerRequest) -> Result<()>;

    /// Update quorum or replace configuration on the member at `group`.
    async fn patch(&self, group: &GroupAddress, request: PatchRequest) -> Result<()>;
}

/// Second-opinion convergence check, consulted after a round already looks
/// converged from the outside. Typically backed by the cluster's own
/// convergence utility endpoint.
#[async_trait]
pub trait ConvergenceProbe: Send + Sync {
    /// Confirm, against the live cluster, that the membership view in
    /// `snapshot` is stable. A rejection delays success but carries no
    /// verdict on the snapshot's structure.
    async fn check(&self, snapshot: &GroupSnapshot) -> Result<()>;
}
