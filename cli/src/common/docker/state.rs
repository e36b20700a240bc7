//! # DevStack Docker State Querying
//!
//! File: cli/src/common/docker/state.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!

//! ## Overview
//!
//! This module provides utility functions focused on **querying the state**
//! of Docker containers without causing any modifications. The reconciler and
//! the `rm` command use it to decide whether a service container exists before
//! acting, and `down` uses it to enumerate a project's containers. State is
//! never cached between calls: every decision re-queries the daemon, so the
//! daemon stays the single source of truth across repeated invocations.
//!
//! ## Architecture
//!
//! The module centralizes state-querying logic using the `bollard` crate:
//! - **`inspect_container`**: Wraps the `bollard` `inspect_container` call, returning the full `ContainerInspectResponse` or a specific `DevstackError::ContainerNotFound` error for the 404 case.
//! - **`container_exists`**: A boolean convenience built on `inspect_container`, interpreting `ContainerNotFound` as `Ok(false)`.
//! - **`list_containers`**: Wraps the `bollard` `list_containers` call, allowing inclusion of stopped containers and arbitrary Docker API filters.
//!
//! All functions use the shared `connect::connect_docker` helper and map relevant Docker API errors to the application's standard `Result` and `DevstackError` types.
//!
//! ## Usage
//!
//! These functions are used by the reconciler and command handlers to make decisions based on the current Docker state.
//!
//! ```rust
//! use crate::common::docker::state;
//! use crate::core::error::Result;
//!
//! # async fn run_example() -> Result<()> {
//! // Check if the service container exists before trying to interact.
//! if state::container_exists("acme_redis").await? {
//!     println!("Container 'acme_redis' exists.");
//! }
//!
//! // List all containers (running and stopped).
//! let all = state::list_containers(true, None).await?;
//! println!("Found {} containers.", all.len());
//! # Ok(())
//! # }
//! ```
//!
use crate::core::error::{DevstackError, Result}; // Use standard Result and custom Error
use anyhow::anyhow; // For error context wrapping
use bollard::{
    container::{InspectContainerOptions, ListContainersOptions}, // Options for inspect/list
    models::{ContainerInspectResponse, ContainerSummary},        // Response types
                                                                 // Docker client is obtained via connect_docker
};
use std::collections::HashMap; // For list_containers filters map
use tracing::{debug, error, info, instrument, warn}; // Logging utilities

// Import the shared connection helper from the sibling module.
use super::connect::connect_docker;

/// Inspects a container by name or ID to retrieve detailed information.
///
/// Fetches the full JSON response from the Docker `inspect` API endpoint for containers.
///
/// # Arguments
///
/// * `name_or_id` - The name or ID of the container to inspect.
///
/// # Returns
///
/// * `Result<ContainerInspectResponse>` - A struct containing the detailed container inspection information.
///
/// # Errors
///
/// * `DevstackError::ContainerNotFound` - If the container doesn't exist (maps Docker 404).
/// * `DevstackError::DockerApi` - For other errors during communication with the Docker daemon.
#[instrument(skip(name_or_id), fields(container = %name_or_id))] // Tracing span
pub async fn inspect_container(name_or_id: &str) -> Result<ContainerInspectResponse> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;
    debug!("Inspecting container: {}", name_or_id); // Log action

    // Call the bollard inspect_container function.
    docker
        .inspect_container(name_or_id, None::<InspectContainerOptions>) // No specific options needed
        .await
        // Map potential errors to our custom error types.
        .map_err(|e| match e {
            // Handle the specific case where the container is not found (404).
            // For the reconciler this is an expected branch, not an anomaly,
            // so keep it at debug level.
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => {
                debug!("Container '{}' was not found (404).", name_or_id);
                // Create our specific ContainerNotFound error.
                anyhow!(DevstackError::ContainerNotFound {
                    name: name_or_id.to_string()
                })
            }
            // Handle all other Docker API errors generically.
            _ => {
                error!("Failed to inspect container '{}': {:?}", name_or_id, e);
                // Wrap the original bollard error in our DockerApi error.
                anyhow!(DevstackError::DockerApi { source: e })
                    .context(format!("Failed to inspect container '{}'", name_or_id))
            }
        })
}

/// Checks if a Docker container exists locally by name or ID.
///
/// This function uses `inspect_container` and interprets its "Not Found"
/// outcome as `false`, while other errors are propagated.
///
/// # Arguments
///
/// * `name_or_id` - The name or ID of the container to check.
///
/// # Returns
///
/// * `Result<bool>` - `Ok(true)` if the container exists, `Ok(false)` if it does not,
///                    or an `Err` for other Docker API communication issues.
///
/// # Errors
///
/// Returns `DevstackError::DockerApi` wrapped in `anyhow::Error` for non-404 Docker errors during inspection.
#[instrument(skip(name_or_id), fields(container = %name_or_id))] // Tracing span
pub async fn container_exists(name_or_id: &str) -> Result<bool> {
    debug!("Checking existence for container: {}", name_or_id); // Log action

    // Attempt to inspect the container.
    match inspect_container(name_or_id).await {
        // Inspection succeeded, meaning the container exists.
        Ok(_) => {
            debug!("Container '{}' exists.", name_or_id);
            Ok(true)
        }
        // Inspection failed. Check if it was because the container wasn't found.
        Err(e)
            if e.downcast_ref::<DevstackError>().is_some_and(|err| {
                // Use downcast_ref for safe error type checking.
                matches!(err, DevstackError::ContainerNotFound { .. })
            }) =>
        {
            debug!("Container '{}' does not exist.", name_or_id);
            Ok(false) // Absence is a normal answer here, not a failure.
        }
        // Inspection failed for some other reason.
        Err(e) => {
            warn!(
                "Existence check for container '{}' failed: {:?}",
                name_or_id, e
            );
            Err(e) // Propagate the underlying error.
        }
    }
}

/// Lists Docker containers, with options to include stopped containers and apply filters.
///
/// Wraps the `bollard` `list_containers` function, providing filtering capabilities
/// based on the Docker API standard filters (e.g., by label, status, name).
///
/// # Arguments
///
/// * `all` - If `true`, includes stopped and exited containers in the list. If `false`, only running containers are returned.
/// * `filters` - An optional `HashMap` where keys are Docker filter names (strings like "label", "status", "name")
///   and values are vectors of strings representing the filter criteria.
///
/// # Returns
///
/// * `Result<Vec<ContainerSummary>>` - A vector containing summary information for each container matching the criteria.
///
/// # Errors
///
/// Returns `DevstackError::DockerApi` wrapped in `anyhow::Error` if the Docker API call fails.
#[instrument(skip(all, filters), fields(all = %all, filters = ?filters))] // Tracing span
pub async fn list_containers(
    all: bool,
    filters: Option<HashMap<String, Vec<String>>>,
) -> Result<Vec<ContainerSummary>> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;
    // Prepare options for the list_containers API call.
    let options = Some(ListContainersOptions {
        all,                                  // Include all states or just running?
        filters: filters.unwrap_or_default(), // Use provided filters or empty map.
        ..Default::default()                  // Use defaults for other options (e.g., limit, size).
    });

    // Log the action being taken.
    info!(
        "Listing containers (All: {}, Filters: {:?})...",
        all,
        options.as_ref().map(|o| &o.filters) // Log filters if present.
    );

    // Call the bollard list_containers function and map potential errors.
    docker.list_containers(options).await.map_err(|e| {
        error!("Failed to list containers: {:?}", e);
        anyhow!(DevstackError::DockerApi { source: e }).context("Failed to list containers")
    })
}
