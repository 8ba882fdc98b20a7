//! Namespace discovery.
//!
//! [`Discovery`] pages through a [`RegistryClient`] and collects repository
//! names. Pagination ends on the first empty page, a page without a `next`
//! link, the page limit, or the first error. Errors are logged and swallowed:
//! the caller always receives the names gathered so far.

use std::fmt;
use std::sync::Arc;

use imagenie_core::metrics as m;
use tracing::{debug, info, warn};

use crate::client::RegistryClient;

/// Default upper bound on pages requested in one discovery.
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

/// Why pagination stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A page came back with no names.
    EmptyPage,
    /// The registry reported no following page.
    LastPage,
    /// The page limit was reached.
    PageLimit,
    /// A request failed; the listing may be incomplete.
    Error {
        /// Page that failed
        page: u32,
        /// Failure description
        cause: String,
    },
}

impl StopReason {
    /// True when the listing may be missing names.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::PageLimit)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPage => write!(f, "empty page"),
            Self::LastPage => write!(f, "last page"),
            Self::PageLimit => write!(f, "page limit reached"),
            Self::Error { page, cause } => write!(f, "page {page} failed: {cause}"),
        }
    }
}

/// Result of one discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOutcome {
    /// Names in page order, duplicates preserved.
    pub names: Vec<String>,
    /// Pages that returned successfully.
    pub pages_fetched: u32,
    /// Why pagination ended.
    pub stopped: StopReason,
}

/// Discovery service over a registry client.
pub struct Discovery<C: RegistryClient> {
    client: Arc<C>,
    max_pages: u32,
}

impl<C: RegistryClient> Discovery<C> {
    /// Creates a discovery service with the default page limit.
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Overrides the page limit (minimum 1).
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Returns every repository name under `namespace`, in page order.
    ///
    /// Never fails. A failed request ends the listing early.
    pub async fn discover(&self, namespace: &str) -> Vec<String> {
        self.discover_detailed(namespace).await.names
    }

    /// Like [`discover`](Self::discover) but also reports how pagination ended.
    pub async fn discover_detailed(&self, namespace: &str) -> DiscoveryOutcome {
        let mut names = Vec::new();
        let mut pages_fetched = 0;

        let stopped = loop {
            let page = pages_fetched + 1;
            if page > self.max_pages {
                warn!(
                    namespace,
                    max_pages = self.max_pages,
                    "registry page limit reached, listing may be incomplete"
                );
                break StopReason::PageLimit;
            }

            match self.client.fetch_page(namespace, page).await {
                Ok(result) => {
                    pages_fetched = page;
                    metrics::counter!(m::REGISTRY_PAGES_TOTAL).increment(1);

                    if result.names.is_empty() {
                        break StopReason::EmptyPage;
                    }
                    debug!(namespace, page, count = result.names.len(), "registry page fetched");
                    names.extend(result.names);
                    if !result.has_next {
                        break StopReason::LastPage;
                    }
                }
                Err(e) => {
                    warn!(
                        namespace,
                        page,
                        error = %e,
                        "registry listing stopped early"
                    );
                    break StopReason::Error {
                        page,
                        cause: e.to_string(),
                    };
                }
            }
        };

        info!(
            namespace,
            discovered = names.len(),
            pages = pages_fetched,
            stopped = %stopped,
            "discovery finished"
        );

        DiscoveryOutcome {
            names,
            pages_fetched,
            stopped,
        }
    }
}
