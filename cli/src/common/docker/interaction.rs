//! # DevStack Docker Container Interaction
//!
//! File: cli/src/common/docker/interaction.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!

//! ## Overview
//!
//! This module streams output from running service containers to the host
//! terminal. It backs `devstack attach`, which tails a service's logs in the
//! foreground until the stream ends or the user interrupts it.
//!
//! ## Architecture
//!
//! - **`stream_container_logs`**: Streams logs (stdout/stderr) from a
//!   specified container directly to the host's standard output.
//!   - Supports following logs in real-time (`follow` flag).
//!   - Supports a `since` cutoff (Unix timestamp) so an attach to an
//!     already-running service replays only recent history instead of the
//!     container's whole life.
//!
//! The function uses asynchronous I/O (`tokio`) and the `bollard` crate to
//! manage the log stream from the Docker daemon. Error handling maps Docker
//! API errors to specific `DevstackError` types.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::docker::interaction;
//! use crate::core::error::Result;
//!
//! # async fn run_examples() -> Result<()> {
//! // Replay everything and exit.
//! interaction::stream_container_logs("acme_redis", false, None).await?;
//!
//! // Follow new output starting 20 seconds ago (blocks until interrupted).
//! // let since = chrono::Utc::now().timestamp() - 20;
//! // interaction::stream_container_logs("acme_redis", true, Some(since)).await?;
//! # Ok(())
//! # }
//! ```
//!
use crate::core::error::{DevstackError, Result}; // Use Result/Error from core module
use anyhow::{anyhow, Context}; // For error context
use bollard::container::LogsOptions; // Options for the logs API call
use futures_util::StreamExt; // Required for processing the log stream
use std::io::{self, Write}; // Standard IO traits (used for stdout flushing)
use tracing::{debug, error, info, instrument, warn}; // Logging framework utilities

// Import functions from sibling modules needed for prerequisites.
use super::connect::connect_docker; // Get Docker client connection
use super::state::container_exists; // Check container status

/// Streams logs from a container to the host's standard output.
///
/// Connects to the Docker daemon, requests the logs for the given container,
/// and pipes the resulting stream directly to `stdout`. With `follow` the call
/// blocks until the stream ends (container stopped or removed) or the caller's
/// task is cancelled; `attach` relies on that cancellation for its teardown.
///
/// # Arguments
///
/// * `name_or_id` - The name or ID of the target container.
/// * `follow` - If `true`, continuously stream new log entries as the container produces them. If `false`, fetch existing logs and return.
/// * `since` - Optional Unix timestamp; only entries logged at or after this moment are returned. `None` replays from the beginning.
///
/// # Returns
///
/// * `Result<()>` - Returns `Ok(())` if log streaming completes without error.
///
/// # Errors
///
/// * `DevstackError::ContainerNotFound` - If the specified container does not exist.
/// * `DevstackError::DockerApi` - For errors during communication with the Docker daemon or while processing the log stream.
#[instrument(skip(name_or_id, follow, since), fields(container = %name_or_id))] // Tracing span
pub async fn stream_container_logs(
    name_or_id: &str,
    follow: bool,
    since: Option<i64>,
) -> Result<()> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;

    // Perform an upfront check for container existence for a clearer error message.
    if !container_exists(name_or_id).await? {
        warn!(
            "Cannot stream logs because container '{}' was not found.",
            name_or_id
        );
        // Return the specific error immediately.
        return Err(anyhow!(DevstackError::ContainerNotFound {
            name: name_or_id.to_string()
        }));
    }

    // Log the requested action.
    info!(
        "Streaming logs for container '{}' (Follow: {}, Since: {:?})",
        name_or_id, follow, since
    );

    // Configure options for the Docker `logs` API call.
    let options = LogsOptions {
        stdout: true,                // Include stdout stream.
        stderr: true,                // Include stderr stream.
        follow,                      // Follow new logs?
        since: since.unwrap_or(0),   // 0 means "from the beginning".
        tail: "all".to_string(),     // The since cutoff does the trimming.
        ..Default::default()         // Use defaults for other options (until, timestamps).
    };

    // Get the log stream from the Docker API.
    let mut log_stream = docker.logs(name_or_id, Some(options));
    // Get a handle to the host's standard output.
    let mut stdout_handle = io::stdout();

    // Process the log stream asynchronously.
    while let Some(log_result) = log_stream.next().await {
        match log_result {
            // Successfully received a log chunk (stdout or stderr).
            Ok(log_output) => {
                // Get the raw bytes from the LogOutput chunk.
                let bytes_to_write = log_output.into_bytes();
                // Write the bytes directly to the host's stdout.
                stdout_handle
                    .write_all(&bytes_to_write)
                    .context("Failed to write log chunk to stdout")?;
                // Flush stdout to ensure the output is immediately visible.
                stdout_handle.flush().context("Failed to flush stdout")?;
            }
            // Error occurred while reading from the log stream.
            Err(e) => {
                error!(
                    "Error receiving log stream for container '{}': {:?}",
                    name_or_id, e
                );
                // Propagate the error, wrapping it with context.
                // Note: Errors can occur if the container stops unexpectedly during follow.
                return Err(anyhow!(DevstackError::DockerApi { source: e })
                    .context(format!("Error reading logs for container '{}'", name_or_id)));
            }
        }
    }

    // The stream ends naturally when the container stops (or immediately
    // when not following).
    debug!("Log stream ended for container '{}'.", name_or_id);

    Ok(()) // Indicate overall success.
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    /// Streaming from a missing container fails with the specific error.
    #[tokio::test]
    #[ignore] // Requires a running Docker daemon.
    async fn test_stream_logs_for_missing_container() {
        let err = stream_container_logs("devstack-test-no-such-container", false, None)
            .await
            .unwrap_err();
        assert!(err
            .downcast_ref::<DevstackError>()
            .is_some_and(|e| matches!(e, DevstackError::ContainerNotFound { .. })));
    }
}
