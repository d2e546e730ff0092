//! Shared test utilities for sellsync integration tests.
//!
//! - `TestHarness` for temp directories and on-disk snapshot stores
//! - scripted mocks for the remote draft API and the AI endpoint
//! - `ConfigBuilder` for configs without JSON boilerplate

pub mod builders;
pub mod harness;
pub mod mocks;

pub use builders::*;
pub use harness::TestHarness;
pub use mocks::*;
