//! Shared test utilities for reportq integration tests.
//!
//! This module provides `TestHarness`: a file-backed queue in a temporary
//! directory that tests can open extra, independent connections to.

pub mod harness;

pub use harness::TestHarness;
