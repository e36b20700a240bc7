//! # DevStack Docker Image Operations
//!
//! File: cli/src/common/docker/images.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!

//! ## Overview
//!
//! This module provides functions for interacting with Docker images stored
//! locally on the Docker host. The freshness checker reads the locally pinned
//! repo digest through `local_image_digest`, and the reconciler invokes
//! `pull_image` whenever an image is missing or needs refreshing.
//!
//! ## Architecture
//!
//! Key functions implemented:
//! - **`inspect_image`**: Retrieves detailed metadata about a specific image, mapping the 404 case to `DevstackError::ImageNotFound`.
//! - **`local_image_digest`**: Extracts the `sha256:` content digest the local daemon recorded for an image reference. Images without a repo digest (e.g. built locally, never pulled) are reported as missing so the caller pulls a published copy.
//! - **`pull_image`**: Pulls an image from its registry, draining the progress stream and surfacing any mid-stream error the daemon reports.
//!
//! All functions handle communication with the Docker daemon via the
//! `connect_docker` helper and map Docker API errors to appropriate
//! `DevstackError` variants.
//!
//! ## Usage
//!
//! These functions are called by the service reconciler, usually as a
//! pull-then-retry pair when an image is absent.
//!
//! ```rust
//! use crate::common::docker::images;
//! use crate::core::error::Result;
//!
//! # async fn run_example() -> Result<()> {
//! // Pull an image, then read the digest the daemon pinned for it.
//! images::pull_image("redis:5.0").await?;
//! let digest = images::local_image_digest("redis:5.0").await?;
//! println!("Local digest: {}", digest);
//! # Ok(())
//! # }
//! ```
//!
use crate::core::error::{DevstackError, Result}; // Use standard Result and custom Error
use anyhow::anyhow; // For error context wrapping
use bollard::{
    image::CreateImageOptions,                 // Options struct for pulling images
    models::{CreateImageInfo, ImageInspect},   // Pull progress and inspect response types
};
use futures_util::stream::StreamExt; // For draining the pull progress stream
use tracing::{debug, error, info, instrument, warn}; // Logging utilities

// Use the shared connection helper from the sibling module.
use super::connect::connect_docker;

/// Inspects a Docker image by name or ID to retrieve detailed metadata.
///
/// # Arguments
///
/// * `name_or_id` - The name (e.g., "redis:5.0") or ID (full or prefix) of the image to inspect.
///
/// # Returns
///
/// * `Result<ImageInspect>` - A struct containing the detailed image information on success.
///
/// # Errors
///
/// * `DevstackError::ImageNotFound` - If no image matching the provided name or ID exists locally (maps Docker 404).
/// * `DevstackError::DockerApi` - For other errors during communication with the Docker daemon.
#[instrument(skip(name_or_id), fields(image = %name_or_id))] // Tracing span
pub async fn inspect_image(name_or_id: &str) -> Result<ImageInspect> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;
    debug!("Inspecting image: {}", name_or_id); // Log action

    // Call the bollard inspect_image function.
    docker
        .inspect_image(name_or_id)
        .await
        // Map potential errors to our custom error types.
        .map_err(|e| match e {
            // Handle the specific case where the image is not found (404).
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => {
                debug!("Image '{}' was not found locally.", name_or_id);
                // Create our specific ImageNotFound error.
                anyhow!(DevstackError::ImageNotFound {
                    name: name_or_id.to_string()
                })
            }
            // Handle all other Docker API errors generically.
            _ => {
                error!("Failed to inspect image '{}': {:?}", name_or_id, e);
                // Wrap the original bollard error in our DockerApi error.
                anyhow!(DevstackError::DockerApi { source: e })
                    .context(format!("Failed to inspect image '{}'", name_or_id))
            }
        })
}

/// Returns the content digest the local daemon has pinned for an image.
///
/// Docker records pulled images under `RepoDigests` entries of the form
/// `repository@sha256:<hex>`; the digest part is what the freshness check
/// compares against the registry. An image that exists but carries no repo
/// digest (one built locally rather than pulled) is reported as
/// `ImageNotFound` so the caller falls back to pulling a published copy.
///
/// # Arguments
///
/// * `name_or_id` - The image reference to look up (e.g., "redis:5.0").
///
/// # Returns
///
/// * `Result<String>` - The digest, e.g. `sha256:abc123...`.
///
/// # Errors
///
/// * `DevstackError::ImageNotFound` - The image is absent or has no usable repo digest.
/// * `DevstackError::DockerApi` - For other errors during communication with the Docker daemon.
#[instrument(skip(name_or_id), fields(image = %name_or_id))] // Tracing span
pub async fn local_image_digest(name_or_id: &str) -> Result<String> {
    let details = inspect_image(name_or_id).await?;
    let repo_digests = details.repo_digests.unwrap_or_default();

    match digest_from_repo_digests(&repo_digests) {
        Some(digest) => {
            debug!("Local digest for '{}': {}", name_or_id, digest);
            Ok(digest)
        }
        None => {
            // Present but digestless; treat like a miss so the caller pulls.
            warn!("Image '{}' has no repo digest.", name_or_id);
            Err(anyhow!(DevstackError::ImageNotFound {
                name: name_or_id.to_string()
            }))
        }
    }
}

/// Extracts the digest from the first `repository@digest` entry, if any.
fn digest_from_repo_digests(repo_digests: &[String]) -> Option<String> {
    repo_digests
        .first()
        .and_then(|entry| entry.split_once('@'))
        .map(|(_, digest)| digest.to_string())
}

/// Pulls an image from its registry via the Docker daemon.
///
/// The daemon resolves the registry from the image reference itself, so this
/// works for Docker Hub and mirrored registries alike. Progress events are
/// drained and logged at debug level; an error event anywhere in the stream
/// fails the pull.
///
/// # Arguments
///
/// * `name_or_id` - The image reference to pull (e.g., "redis:5.0").
///
/// # Returns
///
/// * `Result<()>` - Returns `Ok(())` once the pull completes.
///
/// # Errors
///
/// * `DevstackError::Docker` - If the daemon reports an error event mid-pull.
/// * `DevstackError::DockerApi` - For transport-level errors during the pull.
#[instrument(skip(name_or_id), fields(image = %name_or_id))] // Tracing span
pub async fn pull_image(name_or_id: &str) -> Result<()> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;
    info!("Pulling image '{}'...", name_or_id); // Log action

    // Prepare options; the reference may embed a tag ("redis:5.0").
    let options = Some(CreateImageOptions {
        from_image: name_or_id.to_string(),
        ..Default::default()
    });

    // The pull API streams progress events until the image is complete.
    let mut pull_stream = docker.create_image(options, None, None);
    while let Some(event) = pull_stream.next().await {
        match event {
            // The daemon signals failures (e.g. manifest unknown) as an
            // error field inside an otherwise ordinary event.
            Ok(CreateImageInfo {
                error: Some(e), ..
            }) => {
                error!("Docker reported pull error for '{}': {}", name_or_id, e);
                return Err(anyhow!(DevstackError::Docker(format!(
                    "Failed to pull image '{}': {}",
                    name_or_id, e
                ))));
            }
            Ok(progress) => {
                if let Some(status) = progress.status {
                    debug!(
                        "Pull '{}': {} {}",
                        name_or_id,
                        status,
                        progress.progress.unwrap_or_default()
                    );
                }
            }
            Err(e) => {
                error!("Pull stream error for image '{}': {:?}", name_or_id, e);
                return Err(anyhow!(DevstackError::DockerApi { source: e })
                    .context(format!("Failed to pull image '{}'", name_or_id)));
            }
        }
    }

    info!("Image '{}' pulled successfully.", name_or_id);
    Ok(())
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    /// The digest is everything after the '@' of the first entry.
    #[test]
    fn test_digest_from_repo_digests() {
        let entries = vec!["redis@sha256:abc123".to_string()];
        assert_eq!(
            digest_from_repo_digests(&entries),
            Some("sha256:abc123".to_string())
        );
    }

    /// Registry-qualified repositories keep only the digest part.
    #[test]
    fn test_digest_from_qualified_repository() {
        let entries =
            vec!["us.gcr.io/sentryio/snuba@sha256:feedface".to_string()];
        assert_eq!(
            digest_from_repo_digests(&entries),
            Some("sha256:feedface".to_string())
        );
    }

    /// Only the first entry is consulted; later tags are aliases.
    #[test]
    fn test_digest_prefers_first_entry() {
        let entries = vec![
            "redis@sha256:first".to_string(),
            "mirror.example.com/redis@sha256:second".to_string(),
        ];
        assert_eq!(
            digest_from_repo_digests(&entries),
            Some("sha256:first".to_string())
        );
    }

    /// Locally built images have no repo digest at all.
    #[test]
    fn test_digest_missing_for_local_builds() {
        assert_eq!(digest_from_repo_digests(&[]), None);
        // A malformed entry without '@' is treated the same way.
        let malformed = vec!["redis:latest".to_string()];
        assert_eq!(digest_from_repo_digests(&malformed), None);
    }

    /// A reference that was never pulled reports as missing.
    #[tokio::test]
    #[ignore] // Requires a running Docker daemon.
    async fn test_local_digest_for_missing_image() {
        let err = local_image_digest("devstack-test/no-such-image:none")
            .await
            .unwrap_err();
        assert!(err
            .downcast_ref::<DevstackError>()
            .is_some_and(|e| matches!(e, DevstackError::ImageNotFound { .. })));
    }
}
