//! # Broker Cluster Test Suite
//!
//! Cross-crate flows that drive the control manager and the cluster view
//! together, with logging captured through `bc-telemetry`.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks for the view keeper
//! └── src/
//!     ├── fixtures.rs   # Log capture and shared builders
//!     └── integration/
//!         ├── cluster_flows.rs   # Delete, fencing and removed-list gossip
//!         └── restart_flows.rs   # Persist, restart and reconcile
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bc-tests
//! cargo test -p bc-tests integration::restart_flows
//! cargo bench -p bc-tests
//! ```

pub mod fixtures;
pub mod integration;
