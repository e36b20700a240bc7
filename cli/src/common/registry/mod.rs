//! # DevStack Registry Client
//!
//! File: cli/src/common/registry/mod.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!

//! ## Overview
//!
//! This module implements the small slice of the Docker Registry HTTP API v2
//! that the image freshness check needs: anonymous pull-token acquisition and
//! a manifest `HEAD` request whose `Docker-Content-Digest` response header
//! identifies the image content currently published under a tag. Comparing
//! that remote digest against the digest recorded for the local image tells
//! DevStack whether a tag has moved since the image was last pulled.
//!
//! ## Architecture
//!
//! - **`Registry`**: the known registry endpoints (Docker Hub and
//!   `us.gcr.io`), each pairing a token service URL with a manifest base URL.
//!   Image references naming any other registry host are rejected rather than
//!   guessed at.
//! - **`parse_repo`**: normalizes a repository reference the way Docker does.
//!   A bare name (`postgres`) belongs to the Hub's `library/` namespace; a
//!   first path segment containing a dot (`us.gcr.io/...`) names a registry
//!   host and is stripped from the repository.
//! - **`fetch_pull_token`**: obtains a short-lived anonymous token scoped to
//!   `repository:<repo>:pull`. Tokens are requested fresh for every check and
//!   never cached; a check runs at most once per service per invocation.
//! - **`remote_image_digest`**: the full pipeline from an `IMAGE:TAG`
//!   reference to the remote content digest.
//! - **`DigestPair`**: a local/remote digest pairing with the staleness
//!   comparison used by the container reconciler.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::registry;
//! use crate::core::error::Result;
//!
//! # async fn run_example() -> Result<()> {
//! let client = registry::http_client()?;
//! let remote = registry::remote_image_digest(&client, "postgres:9.6").await?;
//! println!("remote postgres:9.6 {}", remote);
//! # Ok(())
//! # }
//! ```
//!
use crate::core::error::{DevstackError, Result};
use anyhow::{anyhow, Context};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tracing::{debug, instrument};

/// Media type requested when heading a manifest. Without it the registry
/// serves the legacy v1 manifest, whose digest does not match the digest
/// Docker records locally in `RepoDigests`.
const MANIFEST_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// A registry DevStack knows how to talk to.
///
/// Each variant carries a fixed pair of endpoints: the token service that
/// issues anonymous pull tokens and the base URL under which manifests are
/// served. The table is deliberately closed; an image reference naming an
/// unlisted registry host fails with `DevstackError::UnsupportedRegistry`
/// instead of sending tokens to an unverified endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registry {
    /// Docker Hub, the implied registry for un-prefixed image references.
    DockerHub,
    /// Google Container Registry's US mirror (`us.gcr.io`).
    UsGcr,
}

impl Registry {
    /// Looks up the registry serving a dotted host prefix from an image
    /// reference (e.g. `us.gcr.io`).
    ///
    /// # Arguments
    ///
    /// * `host` - The registry host parsed out of a repository reference.
    ///
    /// # Returns
    ///
    /// * `Result<Registry>` - The matching registry.
    ///
    /// # Errors
    ///
    /// Returns `DevstackError::UnsupportedRegistry` when the host is not in
    /// the endpoint table.
    pub fn from_host(host: &str) -> Result<Self> {
        match host {
            "us.gcr.io" => Ok(Registry::UsGcr),
            _ => Err(anyhow!(DevstackError::UnsupportedRegistry {
                host: host.to_string(),
            })),
        }
    }

    /// URL of the token service that issues anonymous pull tokens.
    pub fn token_url(&self) -> &'static str {
        match self {
            Registry::DockerHub => "https://auth.docker.io/token?service=registry.docker.io",
            Registry::UsGcr => "https://us.gcr.io/v2/token?service=gcr.io",
        }
    }

    /// Base URL under which `<repo>/manifests/<tag>` is served.
    pub fn manifest_base(&self) -> &'static str {
        match self {
            Registry::DockerHub => "https://index.docker.io/v2/",
            Registry::UsGcr => "https://us.gcr.io/v2/",
        }
    }
}

/// A local/remote digest pairing for one image reference.
///
/// Produced by the freshness check and consumed by the container reconciler
/// when deciding whether a running service is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestPair {
    /// Digest recorded for the image in the local daemon (`RepoDigests`).
    pub local: String,
    /// Digest currently published for the tag by the registry.
    pub remote: String,
}

impl DigestPair {
    /// Whether the tag has moved since the local image was pulled.
    pub fn is_stale(&self) -> bool {
        self.local != self.remote
    }
}

/// Successful response body from a registry token service.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Builds the HTTP client shared by all registry requests in one invocation.
///
/// # Returns
///
/// * `Result<reqwest::Client>` - A client identifying itself as this build
///   of DevStack.
///
/// # Errors
///
/// Returns `DevstackError::RegistryHttp` if the TLS backend cannot be
/// initialized.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("devstack/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| anyhow!(DevstackError::RegistryHttp { source: e }))
        .context("Failed to construct the registry HTTP client")
}

/// Splits an `IMAGE:TAG` reference into its repository and tag parts.
///
/// # Arguments
///
/// * `image` - The full image reference from a service definition.
///
/// # Returns
///
/// * `Result<(&str, &str)>` - The `(repository, tag)` pair.
///
/// # Errors
///
/// Returns `DevstackError::Registry` when either side of the `:` is empty
/// or the separator is missing entirely. Config validation enforces the
/// same shape earlier, so hitting this indicates a caller bug.
pub fn split_image_reference(image: &str) -> Result<(&str, &str)> {
    match image.split_once(':') {
        Some((repo, tag)) if !repo.is_empty() && !tag.is_empty() => Ok((repo, tag)),
        _ => Err(anyhow!(DevstackError::Registry(format!(
            "Image reference '{}' must be in 'REPO:TAG' form",
            image
        )))),
    }
}

/// Resolves a repository reference to its registry and the repository path
/// the registry expects.
///
/// Mirrors Docker's own reference handling: a bare name maps into Docker
/// Hub's `library/` namespace, a first path segment containing a dot names
/// a registry host, and anything else is a Hub repository used verbatim.
///
/// # Arguments
///
/// * `repo` - The repository part of an image reference (no tag).
///
/// # Returns
///
/// * `Result<(Registry, String)>` - The registry to query and the
///   repository path relative to it.
///
/// # Errors
///
/// Returns `DevstackError::UnsupportedRegistry` for dotted hosts outside
/// the endpoint table.
pub fn parse_repo(repo: &str) -> Result<(Registry, String)> {
    match repo.split_once('/') {
        // Bare official images live under the `library/` namespace.
        None => Ok((Registry::DockerHub, format!("library/{}", repo))),
        // A dot in the first segment marks it as a registry host.
        Some((head, rest)) if head.contains('.') => {
            Ok((Registry::from_host(head)?, rest.to_string()))
        }
        // Namespaced Hub repository, e.g. `getsentry/snuba`.
        Some(_) => Ok((Registry::DockerHub, repo.to_string())),
    }
}

/// Fetches an anonymous pull token for one repository.
///
/// The token is scoped to `repository:<repo>:pull` and requested fresh for
/// every digest check.
///
/// # Arguments
///
/// * `client` - The shared registry HTTP client.
/// * `registry` - The registry whose token service to ask.
/// * `repo` - Repository path relative to the registry (already normalized
///   by `parse_repo`).
///
/// # Returns
///
/// * `Result<String>` - The bearer token.
///
/// # Errors
///
/// Returns `DevstackError::RegistryHttp` for transport failures and
/// non-success status codes, and a context-wrapped decode error when the
/// token response is not the expected JSON shape.
#[instrument(skip(client))]
pub async fn fetch_pull_token(
    client: &reqwest::Client,
    registry: Registry,
    repo: &str,
) -> Result<String> {
    let url = format!("{}&scope=repository:{}:pull", registry.token_url(), repo);
    debug!("Requesting pull token: {}", url);

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| anyhow!(DevstackError::RegistryHttp { source: e }))
        .with_context(|| format!("Token request for repository '{}' failed", repo))?
        .error_for_status()
        .map_err(|e| anyhow!(DevstackError::RegistryHttp { source: e }))
        .with_context(|| format!("Registry refused to issue a pull token for '{}'", repo))?;

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| anyhow!(DevstackError::RegistryHttp { source: e }))
        .context("Malformed token response from registry")?;

    Ok(body.token)
}

/// Resolves the digest currently published for an image tag.
///
/// Splits the reference, resolves the registry, fetches a pull token, and
/// issues a manifest `HEAD` request. The digest is read from the
/// `Docker-Content-Digest` response header; the manifest body itself is
/// never downloaded.
///
/// # Arguments
///
/// * `client` - The shared registry HTTP client.
/// * `image` - Full `IMAGE:TAG` reference from the service definition.
///
/// # Returns
///
/// * `Result<String>` - The remote content digest (e.g. `sha256:...`).
///
/// # Errors
///
/// Returns an `Err` if:
/// - The reference is malformed or names an unsupported registry.
/// - Token acquisition or the manifest request fails (`RegistryHttp`).
/// - The response carries no `Docker-Content-Digest` header
///   (`DevstackError::Registry`).
#[instrument(skip(client))]
pub async fn remote_image_digest(client: &reqwest::Client, image: &str) -> Result<String> {
    let (repo, tag) = split_image_reference(image)?;
    let (registry, repo) = parse_repo(repo)?;

    let token = fetch_pull_token(client, registry, &repo).await?;

    let url = format!("{}{}/manifests/{}", registry.manifest_base(), repo, tag);
    debug!("Heading manifest: {}", url);

    let response = client
        .head(&url)
        .header(AUTHORIZATION, format!("Bearer {}", token))
        .header(ACCEPT, MANIFEST_MEDIA_TYPE)
        .send()
        .await
        .map_err(|e| anyhow!(DevstackError::RegistryHttp { source: e }))
        .with_context(|| format!("Manifest request for '{}' failed", image))?
        .error_for_status()
        .map_err(|e| anyhow!(DevstackError::RegistryHttp { source: e }))
        .with_context(|| format!("Registry rejected the manifest request for '{}'", image))?;

    let digest = response
        .headers()
        .get("Docker-Content-Digest")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            anyhow!(DevstackError::Registry(format!(
                "Registry response for '{}' is missing the Docker-Content-Digest header",
                image
            )))
        })?;

    Ok(digest.to_string())
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    // A bare official image maps into Docker Hub's library namespace.
    #[test]
    fn test_parse_repo_bare_name_gets_library_prefix() {
        let (registry, repo) = parse_repo("postgres").unwrap();
        assert_eq!(registry, Registry::DockerHub);
        assert_eq!(repo, "library/postgres");
    }

    // A namespaced Hub repository passes through unchanged.
    #[test]
    fn test_parse_repo_namespaced_name_unchanged() {
        let (registry, repo) = parse_repo("getsentry/snuba").unwrap();
        assert_eq!(registry, Registry::DockerHub);
        assert_eq!(repo, "getsentry/snuba");
    }

    // A dotted first segment selects the registry and is stripped from the
    // repository path.
    #[test]
    fn test_parse_repo_dotted_host_selects_registry() {
        let (registry, repo) = parse_repo("us.gcr.io/myorg/myimage").unwrap();
        assert_eq!(registry, Registry::UsGcr);
        assert_eq!(repo, "myorg/myimage");
    }

    // Hosts outside the endpoint table are rejected, not guessed at.
    #[test]
    fn test_parse_repo_unknown_host_rejected() {
        let err = parse_repo("quay.io/prometheus/node-exporter").unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("quay.io"), "unexpected error: {}", msg);
        assert!(msg.contains("No registry endpoints configured"));
    }

    // Tag splitting accepts REPO:TAG and nothing else.
    #[test]
    fn test_split_image_reference() {
        assert_eq!(
            split_image_reference("redis:5.0-alpine").unwrap(),
            ("redis", "5.0-alpine")
        );
        assert!(split_image_reference("redis").is_err());
        assert!(split_image_reference(":5.0").is_err());
        assert!(split_image_reference("redis:").is_err());
    }

    // Endpoint table entries are fixed strings; pin them so a refactor
    // cannot silently point the checker somewhere else.
    #[test]
    fn test_registry_endpoints() {
        assert_eq!(
            Registry::DockerHub.token_url(),
            "https://auth.docker.io/token?service=registry.docker.io"
        );
        assert_eq!(
            Registry::DockerHub.manifest_base(),
            "https://index.docker.io/v2/"
        );
        assert_eq!(
            Registry::UsGcr.token_url(),
            "https://us.gcr.io/v2/token?service=gcr.io"
        );
        assert_eq!(Registry::UsGcr.manifest_base(), "https://us.gcr.io/v2/");
        assert_eq!(
            MANIFEST_MEDIA_TYPE,
            "application/vnd.docker.distribution.manifest.v2+json"
        );
    }

    // Staleness is a plain digest comparison.
    #[test]
    fn test_digest_pair_staleness() {
        let fresh = DigestPair {
            local: "sha256:abc".into(),
            remote: "sha256:abc".into(),
        };
        assert!(!fresh.is_stale());

        let stale = DigestPair {
            local: "sha256:abc".into(),
            remote: "sha256:def".into(),
        };
        assert!(stale.is_stale());
    }

    // TODO: Add mocked HTTP tests for `fetch_pull_token` and
    // `remote_image_digest` once a test double for the registry exists.
    // - fetch_pull_token: scope query parameter, non-200 handling.
    // - remote_image_digest: Accept header, missing digest header error.
}
