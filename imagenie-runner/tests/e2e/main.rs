//! End-to-end tests for the imagenie batch pipeline.
//!
//! Every external collaborator (registry, puller, scanner, converter, object
//! store) is replaced by an in-memory mock; the staging directory is a real
//! temporary directory so cleanup can be observed.
//!
//! # Test Structure
//!
//! - `helpers/` -- mocks and the `Harness` that wires them to an `Orchestrator`
//! - `scenarios/` -- one file per behaviour area
//!
//! # Running
//!
//! ```bash
//! cargo test -p imagenie-runner --test e2e
//! ```

mod helpers;
mod scenarios;
