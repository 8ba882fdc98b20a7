//! One batch invocation.

use std::collections::HashSet;

use imagenie_core::retry::RetryPolicy;
use tracing::warn;
use uuid::Uuid;

/// State of a single run: identity, target and the discovered container list.
///
/// The container list is set once, after discovery; duplicates are dropped
/// so that per-task staging paths and destination keys never collide.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    run_id: Uuid,
    namespace: String,
    destination: String,
    db_policy: RetryPolicy,
    containers: Vec<String>,
}

impl PipelineRun {
    /// Starts a run with a fresh v4 id and no containers.
    pub fn new(
        namespace: impl Into<String>,
        destination: impl Into<String>,
        db_policy: RetryPolicy,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            namespace: namespace.into(),
            destination: destination.into(),
            db_policy,
            containers: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Retry policy for vulnerability database preparation.
    pub fn db_policy(&self) -> &RetryPolicy {
        &self.db_policy
    }

    /// Discovered names in discovery order, without duplicates.
    pub fn containers(&self) -> &[String] {
        &self.containers
    }

    /// Records the discovery result. Returns how many duplicates were dropped.
    pub fn set_containers(&mut self, names: Vec<String>) -> usize {
        let mut seen = HashSet::with_capacity(names.len());
        let mut kept = Vec::with_capacity(names.len());
        let mut dropped = 0;

        for name in names {
            if seen.contains(&name) {
                warn!(container = name.as_str(), "duplicate container name in listing, ignoring");
                dropped += 1;
                continue;
            }
            seen.insert(name.clone());
            kept.push(name);
        }

        self.containers = kept;
        dropped
    }
}
