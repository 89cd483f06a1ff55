//! # Quorate Engine
//!
//! Coordination machinery for driving many concurrent membership
//! operations to a single verdict.
//!
//! ## Overview
//!
//! The engine turns callback-style completions of fanned-out endpoint
//! calls into synchronous join points:
//!
//! ```text
//! begin(N) ──► spawn op ──► completion ──► complete_one() ─┐
//!         ├──► spawn op ──► completion ──► complete_one() ─┤
//!         └──► spawn op ──► failure ─────► fail_once(err) ─┤
//!                                                          ▼
//!                     wait(deadline) ◄── remaining == 0 / first error
//! ```
//!
//! - [`CompletionBarrier`] - one-shot phase coordination with first-failure
//!   capture and a deadline
//! - [`PeerRegistry`] - bookkeeping of known peers and their group
//!   addresses
//! - [`JoinCoordinator`] - builds the pairwise join mesh
//! - [`ConvergencePoller`] - fans out one state fetch per group and seals
//!   a round, absorbing individual failures
//! - [`QuorumController`] - broadcasts quorum updates and waits for them
//!   to propagate
//!
//! Everything here uses `tokio::time`, so tests run under the paused
//! virtual clock with no real sleeps.

pub mod barrier;
pub mod error;
pub mod join;
pub mod poll;
pub mod quorum;
pub mod registry;

pub use barrier::CompletionBarrier;
pub use error::{EngineError, Result};
pub use join::JoinCoordinator;
pub use poll::ConvergencePoller;
pub use quorum::QuorumController;
pub use registry::{PeerEntry, PeerRegistry};
