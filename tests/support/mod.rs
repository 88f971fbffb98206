//! Test support module
//!
//! Shared stub collaborators (fixtures) and file helpers for integration tests.

#![allow(dead_code)]

pub mod helpers;

// Re-export rstest fixtures for convenient use in tests
pub mod fixtures;
