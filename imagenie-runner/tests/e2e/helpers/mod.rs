//! Shared E2E test helpers.

pub mod harness;
pub mod mocks;
