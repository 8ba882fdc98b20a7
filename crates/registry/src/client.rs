//! Registry listing API abstraction.
//!
//! The [`RegistryClient`] trait is the only way discovery talks to a registry,
//! so tests can swap in an in-memory client while production uses
//! [`HubRegistryClient`].
//!
//! # Namespace Validation
//!
//! [`HubRegistryClient`] validates the namespace before building a URL:
//! it must be non-empty and contain only `[a-z0-9._-]`. Anything else is
//! rejected as [`RegistryError::InvalidNamespace`] without a request.

use std::future::Future;
use std::time::Duration;

use imagenie_core::config::RegistryConfig;
use imagenie_core::types::validate_namespace;
use serde::Deserialize;
use tracing::debug;

use crate::error::RegistryError;

/// One page of repository names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryPage {
    /// Repository names in the order the registry returned them.
    pub names: Vec<String>,
    /// Whether the registry advertised a following page.
    pub has_next: bool,
}

/// Trait abstracting the registry listing API.
///
/// Pages are 1-based. The trait is `Send + Sync + 'static` so one client can
/// be shared across tasks behind an `Arc`.
pub trait RegistryClient: Send + Sync + 'static {
    /// Fetches page `page` of the repositories under `namespace`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Status`]: non-success HTTP status
    /// - [`RegistryError::Transport`]: no response was received
    /// - [`RegistryError::Decode`]: the body was not a listing
    /// - [`RegistryError::InvalidNamespace`]: rejected before sending
    fn fetch_page(
        &self,
        namespace: &str,
        page: u32,
    ) -> impl Future<Output = Result<RegistryPage, RegistryError>> + Send;
}

/// Docker Hub listing body: `{ "next": <url|null>, "results": [{ "name": ... }] }`
#[derive(Debug, Deserialize)]
struct HubListing {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<HubRepository>,
}

#[derive(Debug, Deserialize)]
struct HubRepository {
    name: String,
}

/// Parses a Docker Hub listing body into a [`RegistryPage`].
///
/// A missing `results` array is treated as an empty page.
pub fn parse_listing(body: &str) -> Result<RegistryPage, RegistryError> {
    let listing: HubListing =
        serde_json::from_str(body).map_err(|e| RegistryError::Decode(e.to_string()))?;
    Ok(RegistryPage {
        names: listing.results.into_iter().map(|r| r.name).collect(),
        has_next: listing.next.is_some_and(|n| !n.is_empty()),
    })
}

/// Production client for the Docker Hub v2 repository listing.
#[derive(Debug, Clone)]
pub struct HubRegistryClient {
    base_url: String,
    page_size: u32,
    client: reqwest::Client,
}

impl HubRegistryClient {
    /// Creates a client with the given request timeout.
    pub fn new(
        base_url: impl Into<String>,
        page_size: u32,
        timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("imagenie/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RegistryError::Client(e.to_string()))?;
        Ok(Self::with_client(base_url, page_size, client))
    }

    /// Creates a client around a preconfigured `reqwest::Client`.
    pub fn with_client(base_url: impl Into<String>, page_size: u32, client: reqwest::Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            page_size,
            client,
        }
    }

    /// Builds a client from the `[registry]` config section.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        Self::new(
            config.base_url.clone(),
            config.page_size,
            config.request_timeout(),
        )
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of one listing page.
    pub fn page_url(&self, namespace: &str, page: u32) -> String {
        format!(
            "{}/v2/repositories/{}/?page={}&page_size={}",
            self.base_url, namespace, page, self.page_size
        )
    }
}

impl RegistryClient for HubRegistryClient {
    async fn fetch_page(&self, namespace: &str, page: u32) -> Result<RegistryPage, RegistryError> {
        validate_namespace(namespace).map_err(|reason| RegistryError::InvalidNamespace {
            namespace: namespace.to_owned(),
            reason,
        })?;

        let url = self.page_url(namespace, page);
        debug!(url = url.as_str(), "fetching registry page");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                page,
            });
        }

        let body = response.text().await?;
        parse_listing(&body)
    }
}
