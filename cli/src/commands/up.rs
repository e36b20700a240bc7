//! # DevStack Up Handler
//!
//! File: cli/src/commands/up.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!
//! ## Overview
//!
//! This module implements the `devstack up` subcommand, the bulk bring-up
//! path. It resolves the catalog, selects the requested services (all enabled
//! services by default), and reconciles each one to a running container.
//! Re-running `up` against an already-running stack is safe: existing
//! containers are reused and already-running ones are a no-op start.
//!
//! ## Architecture
//!
//! The command flow involves these steps:
//! 1. Parse command-line arguments (`UpArgs`) using `clap`.
//! 2. Ping the Docker daemon (`docker::connect_and_ping`), so a stopped
//!    daemon fails fast with a clear hint before any other work.
//! 3. Load the configuration (`core::config`) and resolve the catalog
//!    (`core::resolve`) under the effective project name.
//! 4. Validate the selection (`commands::select`); unknown names abort here,
//!    before any Docker mutation.
//! 5. Ensure the project network exists, then reconcile each selected
//!    service in order via `docker::reconcile::ensure_service_running`.
//!    On-demand services are skipped by the reconciler's gate.
//!
//! Fast mode (`--fast`) skips every image freshness check and reuses
//! whatever containers exist; a warning banner makes the trade-off visible.
//!
//! ## Usage
//!
//! ```bash
//! # Bring up every enabled service
//! devstack up
//!
//! # Bring up only redis and postgres
//! devstack up redis postgres
//!
//! # Everything except kafka, under a custom project namespace
//! devstack up --exclude kafka --project acme
//!
//! # Skip image freshness checks entirely
//! devstack up --fast
//! ```
//!
use crate::{
    common::{docker, registry}, // Shared Docker utilities and the registry client.
    core::{
        config, // Access configuration loading.
        error::Result, // Standard Result type.
        resolve, // Catalog resolution.
    },
};
use anyhow::Context; // For adding context to errors.
use clap::Parser; // For parsing command-line arguments.
use tracing::{debug, info}; // Logging framework utilities.

use super::select; // Shared service selection.

/// # Up Arguments (`UpArgs`)
///
/// Defines the command-line arguments accepted by the `devstack up`
/// subcommand. Uses the `clap` crate for parsing and validation.
#[derive(Parser, Debug)]
#[command(about = "Bring up development services")]
pub struct UpArgs {
    /// Services to bring up. Defaults to every enabled service.
    services: Vec<String>,

    /// Project namespace for containers, volumes, and the network.
    /// Defaults to the configured project name.
    #[arg(long)]
    project: Option<String>,

    /// Service to skip. May be given multiple times.
    #[arg(long)]
    exclude: Vec<String>,

    /// Skip image freshness checks and reuse existing containers.
    #[arg(long)]
    fast: bool,
}

/// # Handle Up Command (`handle_up`)
///
/// The main asynchronous handler function for the `devstack up` command.
///
/// ## Workflow:
/// 1.  Pings the Docker daemon so a stopped daemon fails before any work.
/// 2.  Loads the configuration and resolves the catalog under the effective
///     project name (the `--project` flag wins over the configured default).
/// 3.  Validates the selection; unknown or disabled service names abort with
///     a listing of what is available.
/// 4.  Ensures the project network, then reconciles the selected services
///     one at a time, in name order.
///
/// ## Arguments
///
/// * `args`: The parsed `UpArgs` struct.
///
/// ## Returns
///
/// * `Result<()>`: `Ok(())` once every selected service is running (or was
///   skipped by the on-demand gate).
/// * `Err`: If the daemon is unreachable, the configuration is invalid, the
///   selection names an unknown service, or any reconciliation step fails.
pub async fn handle_up(args: UpArgs) -> Result<()> {
    info!("Handling up command..."); // Log entry point.
    debug!("Up args: {:?}", args); // Log arguments if debug enabled.

    // 1. Verify the daemon is reachable before touching anything else.
    docker::connect_and_ping().await?;

    // 2. Load configuration and resolve the catalog.
    let cfg = config::load_config().context("Failed to load DevStack configuration")?;
    let project = args
        .project
        .clone()
        .unwrap_or_else(|| cfg.settings.project.clone());
    let catalog = resolve::resolve_services(&cfg, &project, true)?;

    // 3. Validate the selection before any Docker mutation.
    let selected = select::select_services(&catalog, &args.services, &args.exclude)?;

    if args.fast {
        eprintln!(
            "> Warning! Fast mode completely eschews any image updating, so services may be stale."
        );
    }

    // 4. The shared network exists before the first container joins it.
    docker::lifecycle::ensure_network(&project).await?;

    // One HTTP client serves every digest lookup in this invocation.
    let registry_client = registry::http_client()?;
    let opts = docker::reconcile::ReconcileOptions {
        fast: args.fast,
        always_start: false,
        on_stale: cfg.settings.on_stale,
    };

    // 5. Reconcile sequentially: output stays readable and the daemon is
    // never hit with a burst of concurrent pulls.
    for name in &selected {
        docker::reconcile::ensure_service_running(&registry_client, &catalog[name], &project, &opts)
            .await
            .with_context(|| format!("Failed to bring up service '{}'", name))?;
    }

    info!("Up complete for project '{}'.", project);
    Ok(())
}
