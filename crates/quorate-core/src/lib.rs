//! # Quorate Core
//!
//! Pure types and evaluation logic for cluster membership convergence.
//!
//! This crate contains no I/O, no timers, no networking. It is pure
//! computation over membership snapshots reported by cluster nodes.
//!
//! ## Key Types
//!
//! - [`NodeState`] - One node's view of one member, as reported over the wire
//! - [`GroupSnapshot`] - A full membership view fetched from one group endpoint
//! - [`ConvergenceRound`] - All snapshots collected in one polling round
//! - [`ConvergenceCriteria`] - What "converged" means for a given wait
//!
//! ## Evaluation
//!
//! [`evaluate_round`] decides whether a round of snapshots agrees on healthy
//! count, total membership, and membership version. Structural problems
//! (missing ids, wrong owner, missing capabilities) are hard errors rather
//! than retryable disagreement - see [`ValidationError`].

pub mod error;
pub mod evaluate;
pub mod snapshot;
pub mod types;

pub use error::ValidationError;
pub use evaluate::{evaluate_round, validate_nodes, ConvergenceCriteria, RoundVerdict};
pub use snapshot::{ConvergenceRound, GroupConfig, GroupSnapshot};
pub use types::{
    default_options, GroupAddress, NodeId, NodeOption, NodeState, NodeStatus, DEFAULT_GROUP_PATH,
};
