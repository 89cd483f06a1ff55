//! # Quorate
//!
//! Cluster membership convergence verification: join a set of nodes into a
//! membership mesh and prove, from the outside, that their reported views
//! agree on health, quorum, and version within a bounded time.
//!
//! ## Overview
//!
//! Quorate is a client of each node's membership endpoint. It does not
//! implement the membership protocol itself; it only issues requests,
//! reads back snapshots, and evaluates them:
//!
//! ```text
//! join mesh (n^2 pairwise joins)
//!      |
//!      v
//! +-> poll every group concurrently ──► one ConvergenceRound
//! |    |
//! |    v
//! |  evaluate: healthy count / total / options / one update time
//! |    |
//! |    +── converged ──► second-opinion probe ──► done
//! |    |                       | rejected
//! +────+── not converged ◄─────+
//!  sleep, until deadline ──► ConvergenceTimeout + full round dump
//! ```
//!
//! Individual poll failures never abort a round: a down node's snapshot is
//! replaced with an empty sentinel and evaluation proceeds on the rest.
//! Verification is all-or-timeout; there is no partial success.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quorate::{ConvergenceCriteria, Verifier, VerifierConfig};
//! use quorate::client::MemoryCluster;
//!
//! async fn example() {
//!     let cluster = MemoryCluster::new();
//!     let verifier = Verifier::new(
//!         cluster.clone(),
//!         cluster.clone(),
//!         VerifierConfig::default(),
//!     );
//!
//!     for i in 0..3 {
//!         let base = format!("http://127.0.0.1:800{}", i);
//!         let id = cluster.add_member(&base);
//!         verifier.register_peer(&base, id);
//!     }
//!
//!     verifier
//!         .join_and_verify(ConvergenceCriteria::healthy(3))
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `quorate::core` - types, snapshots, and evaluation
//! - `quorate::client` - the membership endpoint abstraction
//! - `quorate::engine` - barrier, registry, poller, quorum control

pub mod error;
pub mod verifier;

// Re-export component crates
pub use quorate_client as client;
pub use quorate_core as core;
pub use quorate_engine as engine;

// Re-export main types for convenience
pub use error::{Result, VerifierError};
pub use verifier::{Verifier, VerifierConfig};

// Re-export commonly used component types
pub use quorate_client::{ConvergenceProbe, MembershipClient};
pub use quorate_core::{
    ConvergenceCriteria, ConvergenceRound, GroupAddress, GroupConfig, GroupSnapshot, NodeId,
    NodeOption, NodeState, NodeStatus, RoundVerdict,
};
pub use quorate_engine::{CompletionBarrier, PeerRegistry};
