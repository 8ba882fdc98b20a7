#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Registry errors (`RegistryError`)
//! - [`client`]: Listing API seam (`RegistryClient`) and Docker Hub client (`HubRegistryClient`)
//! - [`discovery`]: Pagination and silent truncation (`Discovery`)

pub mod client;
pub mod discovery;
pub mod error;

// --- Public API Re-exports ---

pub use client::{HubRegistryClient, RegistryClient, RegistryPage};
pub use discovery::{DEFAULT_MAX_PAGES, Discovery, DiscoveryOutcome, StopReason};
pub use error::RegistryError;
