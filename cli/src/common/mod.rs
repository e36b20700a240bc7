//! # DevStack Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!

//! ## Overview
//!
//! This module serves as the root and organizational entry point for the
//! shared infrastructure modules used throughout the DevStack CLI. It keeps
//! cross-cutting concerns (Docker plumbing, registry HTTP access) cleanly
//! separated from command-specific logic (`commands::`) and domain types
//! (`core::`).
//!
//! ## Architecture
//!
//! The `common` module itself primarily consists of declarations (`pub mod`)
//! for its submodules:
//!
//! - **`docker`**: The main interface for interacting with the Docker daemon via the `bollard` crate. Handles connection, container state, lifecycle, images, log streaming, and service reconciliation.
//! - **`registry`**: A minimal Docker Registry HTTP API v2 client used by the image freshness check (anonymous pull tokens, manifest digest lookups).
//!
//! ## Usage
//!
//! Command handlers import specific functionality directly from the required
//! submodule within `common`.
//!
//! ```rust
//! use crate::common::{docker, registry};
//! use crate::core::error::Result;
//!
//! # async fn run_example() -> Result<()> {
//! docker::connect_and_ping().await?;
//! let client = registry::http_client()?;
//! let digest = registry::remote_image_digest(&client, "redis:5.0").await?;
//! println!("remote redis:5.0 {}", digest);
//! # Ok(())
//! # }
//! ```
//!

/// Core utilities for interacting with the Docker daemon (containers, images, networks, volumes).
pub mod docker;
/// Minimal Docker Registry HTTP API v2 client for digest lookups.
pub mod registry;
