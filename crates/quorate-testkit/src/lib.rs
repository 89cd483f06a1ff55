//! # Quorate Testkit
//!
//! Testing utilities for Quorate.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a ready-wired in-memory cluster plus verifier for
//!   scenario tests
//! - **Generators**: proptest strategies for membership states, snapshots,
//!   and whole rounds
//!
//! ## Fixtures
//!
//! ```rust
//! use quorate_testkit::fixtures::ClusterFixture;
//!
//! let fixture = ClusterFixture::new(3);
//! assert_eq!(fixture.verifier.registry().len(), 3);
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use quorate_testkit::generators::arb_node_state;
//!
//! proptest! {
//!     #[test]
//!     fn healthy_is_bounded(state in arb_node_state("http://host/g")) {
//!         prop_assert!(state.membership_quorum >= 1);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{init_tracing, ClusterFixture};
pub use generators::{arb_node_id, arb_node_state, arb_node_status, converged_round};
