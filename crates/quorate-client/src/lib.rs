//! # Quorate Client
//!
//! The membership-endpoint abstraction the verification engine drives.
//!
//! ## Overview
//!
//! Every cluster node exposes its membership group through three logical
//! operations:
//!
//! - fetch the group's membership state (GET)
//! - ask the group to merge with another group (POST)
//! - update quorum or replace the group configuration (PATCH)
//!
//! [`MembershipClient`] captures exactly those three; transport and
//! encoding are the implementor's concern. [`ConvergenceProbe`] is the
//! second-opinion collaborator consulted once a round looks converged.
//!
//! ## Failure model
//!
//! Every failed call carries a [`TransportFailure`]: whether the call timed
//! out, an HTTP-like status code, and an optional structured error body.
//!
//! ## Testing
//!
//! [`memory::MemoryCluster`] implements both traits over a deterministic
//! in-memory cluster whose members converge through lazy anti-entropy, so
//! the engine can be exercised without sockets.

pub mod client;
pub mod error;
pub mod memory;
pub mod messages;

pub use client::{ConvergenceProbe, MembershipClient};
pub use error::{ClientError, Result, ServiceErrorBody, TransportFailure};
pub use memory::MemoryCluster;
pub use messages::{JoinPeerRequest, PatchRequest, UpdateQuorumRequest};
