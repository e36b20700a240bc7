//! # DevStack Down Handler
//!
//! File: cli/src/commands/down.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!
//! ## Overview
//!
//! This module implements the `devstack down` subcommand: stopping a project's
//! service containers without deleting them or their data. Useful to
//! temporarily free resources on the host; the next `up` restarts the same
//! containers with their state intact. Nothing is removed here; that is what
//! `rm` is for.
//!
//! ## Architecture
//!
//! The command flow involves these steps:
//! 1. Parse command-line arguments (`DownArgs`) using `clap`.
//! 2. Ping the Docker daemon, load configuration, resolve the catalog.
//! 3. Validate any positional service names via `commands::select`; unknown
//!    names abort before anything is stopped.
//! 4. List all containers (running and stopped) and keep those whose name
//!    carries the `{project}_` prefix, scoped to the named services when any
//!    were given.
//! 5. Stop each match. Stopping an already-stopped container is a no-op, and
//!    a container that disappears between the listing and the stop is logged
//!    as a warning rather than failing the teardown.
//!
//! Note that step 4 consults the daemon, not the catalog: a full `down` also
//! reaches containers whose service has since been disabled or removed from
//! the configuration, which is exactly what an operator cleaning up wants.
//!
//! ## Usage
//!
//! ```bash
//! # Stop every container of the default project
//! devstack down
//!
//! # Stop only redis and kafka
//! devstack down redis kafka
//!
//! # Stop a different project's containers
//! devstack down --project acme
//! ```
//!
use crate::{
    common::docker, // Shared Docker utilities.
    core::{
        config, // Access configuration loading.
        error::{DevstackError, Result}, // Standard Result type and custom errors.
        resolve, // Catalog resolution.
    },
};
use anyhow::Context; // For adding context to errors.
use clap::Parser; // For parsing command-line arguments.
use std::collections::BTreeSet;
use tracing::{debug, info, warn}; // Logging framework utilities.

use super::select; // Shared service selection.

/// # Down Arguments (`DownArgs`)
///
/// Defines the command-line arguments accepted by the `devstack down`
/// subcommand. Uses the `clap` crate for parsing and validation.
#[derive(Parser, Debug)]
#[command(
    about = "Stop services without deleting their containers or data",
    long_about = "Shut down services without deleting their underlying containers and data.\n\
                  Useful if you want to temporarily relieve resources on your computer.\n\
                  The default is everything; pass service names to stop only those."
)]
pub struct DownArgs {
    /// Services to stop. Defaults to every container of the project.
    services: Vec<String>,

    /// Project namespace for containers, volumes, and the network.
    /// Defaults to the configured project name.
    #[arg(long)]
    project: Option<String>,
}

/// # Handle Down Command (`handle_down`)
///
/// The main asynchronous handler function for the `devstack down` command.
///
/// ## Workflow:
/// 1.  Pings the Docker daemon so a stopped daemon fails before any work.
/// 2.  Loads the configuration and resolves the catalog under the effective
///     project name.
/// 3.  Validates the positional names; unknown or disabled service names
///     abort with a listing of what is available.
/// 4.  Lists all containers and stops every `{project}_`-prefixed one,
///     scoped to the named services when any were given.
///
/// ## Arguments
///
/// * `args`: The parsed `DownArgs` struct.
///
/// ## Returns
///
/// * `Result<()>`: `Ok(())` once every matching container has been stopped
///   (or none matched).
/// * `Err`: If the daemon is unreachable, the configuration is invalid, the
///   selection names an unknown service, or a stop fails for a reason other
///   than the container already being gone.
pub async fn handle_down(args: DownArgs) -> Result<()> {
    info!("Handling down command..."); // Log entry point.
    debug!("Down args: {:?}", args); // Log arguments if debug enabled.

    // 1. Verify the daemon is reachable before touching anything else.
    docker::connect_and_ping().await?;

    // 2. Load configuration and resolve the catalog.
    let cfg = config::load_config().context("Failed to load DevStack configuration")?;
    let project = args
        .project
        .clone()
        .unwrap_or_else(|| cfg.settings.project.clone());
    let catalog = resolve::resolve_services(&cfg, &project, true)?;

    // 3. Validate before any mutation. The selection itself only matters
    // when services were named; the no-argument form stops every prefixed
    // container the daemon knows, enabled service or not.
    let selected = select::select_services(&catalog, &args.services, &[])?;
    let selected_set: BTreeSet<&str> = selected.iter().map(String::as_str).collect();
    let scoped = !args.services.is_empty();

    let prefix = format!("{}_", project);

    // 4. The daemon is the source of truth for what exists.
    let containers = docker::state::list_containers(true, None)
        .await
        .context("Failed to list Docker containers")?;

    // Keep the project-prefixed name of each matching container, scoped to
    // the requested services when any were named. Same selection rule as
    // the `rm` teardown.
    let to_stop: Vec<String> = containers
        .into_iter()
        .filter_map(|c| {
            c.names.unwrap_or_default().iter().find_map(|n| {
                let name = n.trim_start_matches('/');
                if select::resource_selected(name, &prefix, scoped, &selected_set) {
                    Some(name.to_string())
                } else {
                    None
                }
            })
        })
        .collect();

    if to_stop.is_empty() {
        println!("No containers found for project '{}'.", project);
        return Ok(());
    }

    for name in &to_stop {
        eprintln!("> Stopping '{}' container", name);
        match docker::lifecycle::stop_container(name, None).await {
            Ok(()) => {}
            // Gone between the listing and the stop; stopped is stopped.
            Err(e)
                if e.downcast_ref::<DevstackError>().is_some_and(|err| {
                    matches!(err, DevstackError::ContainerNotFound { .. })
                }) =>
            {
                warn!("Container '{}' disappeared before it could be stopped.", name);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to stop container '{}'", name));
            }
        }
    }

    info!("Down complete for project '{}'.", project);
    Ok(())
}

// --- Unit Tests ---
// Focus on argument parsing for the `down` command. Stopping containers
// requires a live daemon; see the ignored integration tests.
#[cfg(test)]
mod tests {
    use super::*;

    /// Test parsing with positional services and a project override.
    #[test]
    fn test_down_args_parsing() {
        // Simulate `devstack down redis kafka --project acme`
        let args = DownArgs::try_parse_from(["down", "redis", "kafka", "--project", "acme"])
            .expect("Parsing full args failed");
        assert_eq!(args.services, vec!["redis", "kafka"]);
        assert_eq!(args.project, Some("acme".to_string()));
    }

    /// Test parsing with no arguments at all (stop everything).
    #[test]
    fn test_down_args_defaults() {
        let args = DownArgs::try_parse_from(["down"]).expect("Parsing default args failed");
        assert!(args.services.is_empty()); // Empty means the whole project.
        assert!(args.project.is_none()); // Config default applies.
    }
}
