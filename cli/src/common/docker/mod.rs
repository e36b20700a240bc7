//! # DevStack Docker Module Interface
//!
//! File: cli/src/common/docker/mod.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!

//! ## Overview
//!
//! This module serves as the central public interface for interacting with
//! Docker within the DevStack CLI. It organizes Docker-related functionality
//! into logical submodules and re-exports the entry points command handlers
//! reach for most, abstracting the underlying `bollard` crate interactions.
//!
//! ## Architecture
//!
//! The `common::docker` module delegates tasks to the following specialized submodules:
//!
//! - **`connect`**: Handles establishing the connection to the Docker daemon.
//! - **`state`**: Queries the status of containers (existence, inspection, listing) without mutating anything.
//! - **`lifecycle`**: Controls the lifecycle of containers, the project network, and named volumes (start, stop, remove, ensure).
//! - **`images`**: Manages Docker images (digest inspection, pulling).
//! - **`interaction`**: Streams logs from running containers to the host terminal.
//! - **`reconcile`**: Converges one resolved service spec to a running container; the decision core shared by `up` and `attach`.
//!
//! ## Usage
//!
//! Command handlers interact with Docker through this module:
//!
//! ```rust
//! use crate::common::docker;
//! use crate::core::error::Result;
//!
//! # async fn run_example() -> Result<()> {
//! // Verify the daemon is reachable before doing anything else
//! // (uses the re-exported connect_and_ping from connect).
//! docker::connect_and_ping().await?;
//!
//! // Stop a service container via the lifecycle submodule.
//! docker::lifecycle::stop_container("acme_redis", None).await?;
//! # Ok(())
//! # }
//! ```
//!

/// Handles establishing a connection to the local Docker daemon.
pub mod connect;
/// Provides operations specific to Docker images (digest inspection, pulling).
pub mod images;
/// Streams logs from running containers to the host terminal.
pub mod interaction;
/// Contains functions for managing the lifecycle of containers, networks, and volumes.
pub mod lifecycle;
/// Converges resolved service specs to running containers.
pub mod reconcile;
/// Offers functions to query the state of containers (existence, inspection, listing).
pub mod state;

// --- Re-exports for easier access from other parts of the application ---
// Every command begins with a daemon ping, so that one lives at the top level.
pub use connect::connect_and_ping;

// --- Unit Tests (Module Level) ---
#[cfg(test)]
mod tests {
    // This test simply ensures the module itself compiles.
    // More specific tests reside within each submodule (`connect`, `state`, etc.).
    #[test]
    fn placeholder_docker_mod_test() {
        // This test doesn't do much, just ensures the file compiles.
        // More meaningful tests are within the submodules.
        assert!(true);
    }
}
