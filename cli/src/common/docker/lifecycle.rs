//! # DevStack Docker Lifecycle Operations
//!
//! File: cli/src/common/docker/lifecycle.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!

//! ## Overview
//!
//! This module provides functions dedicated to managing the **lifecycle** of
//! Docker resources owned by a project: containers, the project network, and
//! named volumes. Everything here changes daemon state; read-only queries live
//! in the sibling `state` module and the decision-making in `reconcile`.
//!
//! ## Architecture
//!
//! Container functions:
//! - **`start_container`**: Starts a stopped container. Handles the "already running" case gracefully (Docker 304 response).
//! - **`stop_container`**: Stops a running container within an optional timeout. Handles the "already stopped" case gracefully (Docker 304 response).
//! - **`remove_container`**: Removes a container. Absence (404) counts as success since the goal is absence.
//!
//! Network and volume functions:
//! - **`ensure_network` / `ensure_volume`**: Create-if-missing helpers. Creation announces itself on stderr so a first `up` shows where the namespace came from.
//! - **`list_volumes`**: Enumerates volumes so callers can match them against the project prefix.
//! - **`remove_volume` / `remove_network`**: Teardown helpers that tolerate absence.
//!
//! All functions use the shared `connect::connect_docker` helper and map
//! Docker API errors to consistent `DevstackError` types.
//!
//! ## Usage
//!
//! These functions are primarily used by the reconciler and the teardown
//! command handlers.
//!
//! ```rust
//! use crate::common::docker::lifecycle;
//! use crate::core::error::Result;
//!
//! # async fn run_example() -> Result<()> {
//! // Make sure the project network exists before any container joins it.
//! lifecycle::ensure_network("acme").await?;
//!
//! // Start a service container (no-op if already running).
//! lifecycle::start_container("acme_redis").await?;
//!
//! // Stop it with a 5-second grace period, then remove it.
//! lifecycle::stop_container("acme_redis", Some(5)).await?;
//! lifecycle::remove_container("acme_redis").await?;
//! # Ok(())
//! # }
//! ```
//!
use crate::core::error::{DevstackError, Result}; // Standard Result and custom Error types
use anyhow::anyhow; // For error context wrapping
use bollard::{
    container::{
        // Options structs for container lifecycle operations
        RemoveContainerOptions,
        StartContainerOptions,
        StopContainerOptions,
    },
    models::Volume,
    network::{CreateNetworkOptions, InspectNetworkOptions},
    volume::{CreateVolumeOptions, ListVolumesOptions, RemoveVolumeOptions},
};
use tracing::{debug, error, info, instrument, warn}; // Logging utilities

// Import the shared connection helper from the sibling module.
use super::connect::connect_docker;

/// Starts a stopped Docker container identified by its name or ID.
///
/// If the container is already running, this function treats it as a success (idempotent).
/// It handles the Docker API's 304 (Not Modified) response code gracefully.
///
/// # Arguments
///
/// * `name_or_id` - The name or ID of the container to start.
///
/// # Returns
///
/// * `Result<()>` - Returns `Ok(())` if the container was successfully started or was already running.
///
/// # Errors
///
/// * `DevstackError::ContainerNotFound` - If the specified container does not exist (Docker 404).
/// * `DevstackError::DockerApi` - For other errors during communication with the Docker daemon.
#[instrument(skip(name_or_id), fields(container = %name_or_id))] // Tracing span
pub async fn start_container(name_or_id: &str) -> Result<()> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;
    info!("Attempting to start container '{}'...", name_or_id); // Log action

    // Call the bollard start_container function.
    match docker
        .start_container(name_or_id, None::<StartContainerOptions<String>>) // No specific start options used
        .await
    {
        // Start successful.
        Ok(_) => {
            info!("Container '{}' started successfully.", name_or_id);
            Ok(())
        }
        // Handle specific Docker error codes.
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 304, .. // 304 means "Not Modified", i.e., already running.
        }) => {
            info!("Container '{}' was already started.", name_or_id);
            Ok(()) // Treat as success.
        }
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, .. // 404 means "Not Found".
        }) => {
            warn!(
                "Start failed because container '{}' was not found.",
                name_or_id
            );
            // Return our specific ContainerNotFound error.
            Err(anyhow!(DevstackError::ContainerNotFound {
                name: name_or_id.to_string()
            }))
        }
        // Handle any other Docker API errors.
        Err(e) => {
            error!("Failed to start container '{}': {:?}", name_or_id, e);
            // Wrap the error and provide context.
            Err(anyhow!(DevstackError::DockerApi { source: e })
                .context(format!("Failed to start container '{}'", name_or_id)))
        }
    }
}

/// Stops a running Docker container identified by its name or ID.
///
/// Attempts a graceful shutdown using SIGTERM, waiting for the specified `timeout_secs`
/// before Docker forcibly kills the container (usually with SIGKILL).
/// If the container is already stopped, this function treats it as a success (idempotent).
///
/// # Arguments
///
/// * `name_or_id` - The name or ID of the container to stop.
/// * `timeout_secs` - An optional duration (in seconds) to wait for graceful shutdown.
///                    If `None`, Docker's default timeout (typically 10 seconds) is used.
///
/// # Returns
///
/// * `Result<()>` - Returns `Ok(())` if the container was successfully stopped or was already stopped.
///
/// # Errors
///
/// * `DevstackError::ContainerNotFound` - If the specified container does not exist (Docker 404).
/// * `DevstackError::DockerApi` - For other errors during communication with the Docker daemon.
#[instrument(skip(name_or_id, timeout_secs), fields(container = %name_or_id))] // Tracing span
pub async fn stop_container(name_or_id: &str, timeout_secs: Option<u32>) -> Result<()> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;
    // Prepare the options struct for the stop_container API call.
    // Convert the Option<u32> timeout to the i64 expected by bollard.
    let options = timeout_secs.map(|t| StopContainerOptions { t: t as i64 });
    // Log the action with the specified timeout.
    info!(
        "Attempting to stop container '{}' (Timeout: {:?} seconds)...",
        name_or_id,
        timeout_secs.map_or_else(|| "default (10)".to_string(), |t| t.to_string()) // Log default clearly
    );

    // Call the bollard stop_container function.
    match docker.stop_container(name_or_id, options).await {
        // Stop successful.
        Ok(_) => {
            info!("Container '{}' stopped successfully.", name_or_id);
            Ok(())
        }
        // Handle specific Docker error codes.
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 304, .. // 304 means "Not Modified", i.e., already stopped.
        }) => {
            info!("Container '{}' was already stopped.", name_or_id);
            Ok(()) // Treat as success.
        }
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, .. // 404 means "Not Found".
        }) => {
            warn!(
                "Stop failed because container '{}' was not found.",
                name_or_id
            );
            // Return our specific ContainerNotFound error.
            Err(anyhow!(DevstackError::ContainerNotFound {
                name: name_or_id.to_string()
            }))
        }
        // Handle any other Docker API errors.
        Err(e) => {
            error!("Failed to stop container '{}': {:?}", name_or_id, e);
            // Wrap the error and provide context.
            Err(anyhow!(DevstackError::DockerApi { source: e })
                .context(format!("Failed to stop container '{}'", name_or_id)))
        }
    }
}

/// Removes a Docker container identified by its name or ID.
///
/// Callers stop containers before removing them, so no force flag is exposed.
/// A container that is already gone counts as success: the goal is absence.
///
/// # Arguments
///
/// * `name_or_id` - The name or ID of the container to remove.
///
/// # Returns
///
/// * `Result<()>` - Returns `Ok(())` if the container was successfully removed or did not exist.
///
/// # Errors
///
/// * `DevstackError::Docker` - For conflicts preventing removal (Docker 409), e.g. the container is still running.
/// * `DevstackError::DockerApi` - For other errors during communication with the Docker daemon.
#[instrument(skip(name_or_id), fields(container = %name_or_id))] // Tracing span
pub async fn remove_container(name_or_id: &str) -> Result<()> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;
    info!("Attempting to remove container '{}'...", name_or_id);

    // Prepare options for the remove_container API call.
    let options = Some(RemoveContainerOptions {
        force: false, // Callers stop first; never kill a container implicitly.
        v: false,     // Named volumes are removed explicitly by `rm`, not here.
        link: false,  // Deprecated option, set to false.
    });

    // Call the bollard remove_container function.
    match docker.remove_container(name_or_id, options).await {
        // Removal successful.
        Ok(_) => {
            info!("Container '{}' removed successfully.", name_or_id);
            Ok(())
        }
        // Handle specific Docker error codes.
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, .. // 404 means "Not Found".
        }) => {
            info!(
                "Container '{}' not found during removal attempt.",
                name_or_id
            );
            Ok(()) // Treat as success if the goal is absence.
        }
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 409, // 409 means "Conflict" (e.g., still running).
            message,          // Docker often provides a reason.
        }) => {
            error!(
                "Conflict removing container '{}': {}",
                name_or_id, message
            );
            Err(anyhow!(DevstackError::Docker(format!(
                "Conflict removing container '{}': {}. Try stopping it first.",
                name_or_id, message
            ))))
        }
        // Handle any other Docker API errors.
        Err(e) => {
            error!("Failed to remove container '{}': {:?}", name_or_id, e);
            // Wrap the error and provide context.
            Err(anyhow!(DevstackError::DockerApi { source: e })
                .context(format!("Failed to remove container '{}'", name_or_id)))
        }
    }
}

/// Ensures a user-defined bridge network with the given name exists.
///
/// Creating the network is announced on stderr so the first `up` of a project
/// shows where the namespace came from. An existing network is left untouched.
///
/// # Arguments
///
/// * `name` - The network name, conventionally the project name.
///
/// # Errors
///
/// Returns `DevstackError::DockerApi` wrapped in `anyhow::Error` if the
/// inspect or create call fails for reasons other than 404.
#[instrument(skip(name), fields(network = %name))] // Tracing span
pub async fn ensure_network(name: &str) -> Result<()> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;

    match docker
        .inspect_network(name, None::<InspectNetworkOptions<String>>)
        .await
    {
        // Network already exists; nothing to do.
        Ok(_) => {
            debug!("Network '{}' already exists.", name);
            Ok(())
        }
        // 404 means the network is missing; create it.
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => {
            eprintln!("> Creating '{}' network", name);
            docker
                .create_network(CreateNetworkOptions::<String> {
                    name: name.to_string(),
                    ..Default::default()
                })
                .await
                .map_err(|e| {
                    error!("Failed to create network '{}': {:?}", name, e);
                    anyhow!(DevstackError::DockerApi { source: e })
                        .context(format!("Failed to create network '{}'", name))
                })?;
            debug!("Network '{}' created.", name);
            Ok(())
        }
        // Any other inspect error is a real failure.
        Err(e) => {
            error!("Failed to inspect network '{}': {:?}", name, e);
            Err(anyhow!(DevstackError::DockerApi { source: e })
                .context(format!("Failed to inspect network '{}'", name)))
        }
    }
}

/// Ensures a named Docker volume with the given name exists.
///
/// Volume names arrive here already namespaced (`{project}_{volume}`), so a
/// volume created for one project can never collide with another project's.
///
/// # Arguments
///
/// * `name` - The namespaced volume name.
///
/// # Errors
///
/// Returns `DevstackError::DockerApi` wrapped in `anyhow::Error` if the
/// inspect or create call fails for reasons other than 404.
#[instrument(skip(name), fields(volume = %name))] // Tracing span
pub async fn ensure_volume(name: &str) -> Result<()> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;

    match docker.inspect_volume(name).await {
        // Volume already exists; data inside it is preserved.
        Ok(_) => {
            debug!("Volume '{}' already exists.", name);
            Ok(())
        }
        // 404 means the volume is missing; create it.
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => {
            eprintln!("> Creating '{}' volume", name);
            docker
                .create_volume(CreateVolumeOptions::<String> {
                    name: name.to_string(),
                    ..Default::default()
                })
                .await
                .map_err(|e| {
                    error!("Failed to create volume '{}': {:?}", name, e);
                    anyhow!(DevstackError::DockerApi { source: e })
                        .context(format!("Failed to create volume '{}'", name))
                })?;
            debug!("Volume '{}' created.", name);
            Ok(())
        }
        // Any other inspect error is a real failure.
        Err(e) => {
            error!("Failed to inspect volume '{}': {:?}", name, e);
            Err(anyhow!(DevstackError::DockerApi { source: e })
                .context(format!("Failed to inspect volume '{}'", name)))
        }
    }
}

/// Lists all Docker volumes known to the daemon.
///
/// Callers filter the result by the project prefix; the daemon offers no
/// native "starts with" filter for volume names.
///
/// # Returns
///
/// * `Result<Vec<Volume>>` - All volumes, or an empty vector when none exist.
///
/// # Errors
///
/// Returns `DevstackError::DockerApi` wrapped in `anyhow::Error` if the Docker API call fails.
#[instrument]
pub async fn list_volumes() -> Result<Vec<Volume>> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;
    debug!("Listing volumes...");

    let response = docker
        .list_volumes(None::<ListVolumesOptions<String>>)
        .await
        .map_err(|e| {
            error!("Failed to list volumes: {:?}", e);
            anyhow!(DevstackError::DockerApi { source: e }).context("Failed to list volumes")
        })?;

    // The daemon may report warnings alongside the listing; surface them.
    for warning in response.warnings.unwrap_or_default() {
        warn!("Docker volume listing warning: {}", warning);
    }

    Ok(response.volumes.unwrap_or_default())
}

/// Removes a named Docker volume, discarding its data.
///
/// A volume that is already gone is tolerated with a warning so that teardown
/// keeps going over the remaining resources.
///
/// # Arguments
///
/// * `name` - The namespaced volume name to remove.
///
/// # Errors
///
/// * `DevstackError::Docker` - If the volume is still in use by a container (Docker 409).
/// * `DevstackError::DockerApi` - For other errors during communication with the Docker daemon.
#[instrument(skip(name), fields(volume = %name))] // Tracing span
pub async fn remove_volume(name: &str) -> Result<()> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;
    info!("Attempting to remove volume '{}'...", name);

    match docker
        .remove_volume(name, None::<RemoveVolumeOptions>)
        .await
    {
        Ok(_) => {
            info!("Volume '{}' removed successfully.", name);
            Ok(())
        }
        // Already gone; teardown continues.
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => {
            warn!("Volume '{}' not found during removal attempt.", name);
            Ok(())
        }
        // Still referenced by a container.
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message,
        }) => {
            error!("Conflict removing volume '{}': {}", name, message);
            Err(anyhow!(DevstackError::Docker(format!(
                "Conflict removing volume '{}': {}. Remove the containers using it first.",
                name, message
            ))))
        }
        Err(e) => {
            error!("Failed to remove volume '{}': {:?}", name, e);
            Err(anyhow!(DevstackError::DockerApi { source: e })
                .context(format!("Failed to remove volume '{}'", name)))
        }
    }
}

/// Removes the project network if it exists.
///
/// Removal is announced on stderr, mirroring the creation message from
/// `ensure_network`. A missing network is a silent no-op since full teardown
/// may run against a project that was never brought up.
///
/// # Arguments
///
/// * `name` - The network name, conventionally the project name.
///
/// # Errors
///
/// Returns `DevstackError::DockerApi` wrapped in `anyhow::Error` if the
/// inspect or remove call fails for reasons other than 404.
#[instrument(skip(name), fields(network = %name))] // Tracing span
pub async fn remove_network(name: &str) -> Result<()> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;

    // Inspect first so absence stays quiet and removal is announced.
    match docker
        .inspect_network(name, None::<InspectNetworkOptions<String>>)
        .await
    {
        Ok(_) => {
            eprintln!("> Removing '{}' network", name);
            docker.remove_network(name).await.map_err(|e| {
                error!("Failed to remove network '{}': {:?}", name, e);
                anyhow!(DevstackError::DockerApi { source: e })
                    .context(format!("Failed to remove network '{}'", name))
            })?;
            info!("Network '{}' removed successfully.", name);
            Ok(())
        }
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => {
            debug!("Network '{}' not found, no removal needed.", name);
            Ok(())
        }
        Err(e) => {
            error!("Failed to inspect network '{}': {:?}", name, e);
            Err(anyhow!(DevstackError::DockerApi { source: e })
                .context(format!("Failed to inspect network '{}'", name)))
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    // These wrappers translate daemon status codes into the crate's error
    // vocabulary; the checks below exercise the 304/404 tolerance against a
    // live daemon and run with `cargo test -- --ignored`.

    /// Starting a container that does not exist yields ContainerNotFound.
    #[tokio::test]
    #[ignore] // Requires a running Docker daemon.
    async fn test_start_missing_container_is_not_found() {
        let err = start_container("devstack-test-no-such-container")
            .await
            .unwrap_err();
        assert!(err
            .downcast_ref::<DevstackError>()
            .is_some_and(|e| matches!(e, DevstackError::ContainerNotFound { .. })));
    }

    /// Stopping a container that does not exist yields ContainerNotFound.
    #[tokio::test]
    #[ignore] // Requires a running Docker daemon.
    async fn test_stop_missing_container_is_not_found() {
        let err = stop_container("devstack-test-no-such-container", Some(1))
            .await
            .unwrap_err();
        assert!(err
            .downcast_ref::<DevstackError>()
            .is_some_and(|e| matches!(e, DevstackError::ContainerNotFound { .. })));
    }

    /// Removal treats absence as success.
    #[tokio::test]
    #[ignore] // Requires a running Docker daemon.
    async fn test_remove_missing_container_is_ok() {
        let result = remove_container("devstack-test-no-such-container").await;
        assert!(result.is_ok(), "removal failed: {:?}", result.err());
    }

    /// Volume teardown tolerates a volume that was never created.
    #[tokio::test]
    #[ignore] // Requires a running Docker daemon.
    async fn test_remove_missing_volume_is_ok() {
        let result = remove_volume("devstack-test-no-such-volume").await;
        assert!(result.is_ok(), "removal failed: {:?}", result.err());
    }

    /// ensure_volume then remove_volume round-trips on a live daemon.
    #[tokio::test]
    #[ignore] // Requires a running Docker daemon.
    async fn test_ensure_and_remove_volume() {
        let name = "devstack-test-scratch-volume";
        ensure_volume(name).await.expect("create failed");
        // Idempotent: a second ensure must not fail.
        ensure_volume(name).await.expect("re-ensure failed");
        remove_volume(name).await.expect("remove failed");
    }

    /// Network teardown tolerates a network that was never created.
    #[tokio::test]
    #[ignore] // Requires a running Docker daemon.
    async fn test_remove_missing_network_is_ok() {
        let result = remove_network("devstack-test-no-such-network").await;
        assert!(result.is_ok(), "removal failed: {:?}", result.err());
    }
}
