//! # DevStack Docker Connection Helper
//!
//! File: cli/src/common/docker/connect.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!

//! ## Overview
//!
//! This internal utility module standardizes how DevStack reaches the local
//! Docker daemon. `connect_docker` establishes a connection with `bollard`'s
//! platform defaults; `connect_and_ping` additionally verifies the daemon is
//! actually answering before any command starts mutating state. Every command
//! handler goes through `connect_and_ping` first, so a stopped daemon fails
//! fast with a remediation hint instead of surfacing halfway through a
//! bring-up.
//!
//! ## Architecture
//!
//! - **`connect_docker`**: wraps `Docker::connect_with_local_defaults()`,
//!   mapping failures to `DevstackError::DockerApi` with context.
//! - **`connect_and_ping`**: connects, then issues a `ping` request. A
//!   daemon that cannot be reached yields the canonical hint
//!   "Make sure Docker is running.".
//!
//! ## Usage
//!
//! ```rust
//! // Example within another docker module (e.g., common/docker/state.rs)
//! use super::connect::connect_and_ping; // Import from sibling
//! use crate::core::error::Result;
//! use bollard::Docker;
//!
//! async fn perform_container_operation() -> Result<()> {
//!     // Get a verified connection to the Docker daemon.
//!     let docker: Docker = connect_and_ping().await?;
//!     // Use the 'docker' client instance...
//!     // docker.list_containers::<String>(None).await?;
//!     Ok(())
//! }
//! ```
//!
use crate::core::error::{DevstackError, Result};
use anyhow::{anyhow, Context};
use bollard::Docker;
use tracing::{debug, instrument};

/// Establishes a connection to the local Docker daemon using default settings.
///
/// Connects to the daemon at its standard location (`/var/run/docker.sock`
/// on Unix, named pipe on Windows) via
/// `bollard::Docker::connect_with_local_defaults`. No request is sent yet;
/// use `connect_and_ping` when the daemon must be known to be live.
///
/// # Returns
///
/// * `Result<Docker>` - A `bollard::Docker` client instance on success.
///
/// # Errors
///
/// Returns an `Err` wrapping `DevstackError::DockerApi` if the client cannot
/// be constructed for the local endpoint.
#[instrument]
pub async fn connect_docker() -> Result<Docker> {
    Docker::connect_with_local_defaults()
        .map_err(|e| anyhow!(DevstackError::DockerApi { source: e }))
        .context("Failed to connect to Docker daemon. Make sure Docker is running.")
}

/// Connects to the local Docker daemon and verifies it responds to a ping.
///
/// Command handlers call this once, up front, before resolving services or
/// touching containers. Connection construction can succeed even when the
/// daemon is down (the socket path is only dialed lazily), so the ping is
/// what actually proves liveness.
///
/// # Returns
///
/// * `Result<Docker>` - A verified `bollard::Docker` client instance.
///
/// # Errors
///
/// Returns an `Err` wrapping `DevstackError::DockerApi` with the hint
/// "Make sure Docker is running." if the daemon does not answer.
#[instrument]
pub async fn connect_and_ping() -> Result<Docker> {
    let docker = connect_docker().await?;
    docker
        .ping()
        .await
        .map_err(|e| anyhow!(DevstackError::DockerApi { source: e }))
        .context("Docker daemon did not respond. Make sure Docker is running.")?;
    debug!("Docker daemon answered ping");
    Ok(docker)
}
