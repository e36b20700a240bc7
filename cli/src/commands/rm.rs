//! # DevStack Rm Handler
//!
//! File: cli/src/commands/rm.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!
//! ## Overview
//!
//! This module implements the `devstack rm` subcommand: the destructive
//! teardown. It stops and deletes service containers, removes their
//! project-namespaced volumes (and with them all stored data), and, when the
//! whole project is being removed, deletes the shared network. Because there
//! is no undo for the volume deletion, the command shows the doomed services
//! and asks for confirmation before touching anything.
//!
//! ## Architecture
//!
//! The command flow involves these steps:
//! 1. Parse command-line arguments (`RmArgs`) using `clap`.
//! 2. Ping the Docker daemon, load configuration, resolve the catalog.
//! 3. Validate any positional service names via `commands::select`; unknown
//!    names abort before the prompt, let alone any mutation.
//! 4. Print the selected services and ask for confirmation
//!    (`dialoguer::Confirm`, defaulting to "no"). `--no-prompt` skips the
//!    question for scripted use. Declining aborts with a non-zero exit.
//! 5. Stop and remove each selected service's container. A container that
//!    does not exist is reported as a warning and teardown continues; the
//!    goal is absence, and it is already absent.
//! 6. Remove every volume named under the `{project}_` prefix, scoped to the
//!    selected services when any were named.
//! 7. Remove the project network, but only in the no-arguments (full
//!    teardown) form: with a partial removal the remaining services still
//!    need it.
//!
//! ## Usage
//!
//! ```bash
//! # Delete the whole project: containers, volumes, network (asks first)
//! devstack rm
//!
//! # Delete only postgres and its data, keeping everything else
//! devstack rm postgres
//!
//! # Non-interactive teardown for scripts
//! devstack rm --no-prompt
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
use anyhow::{anyhow, Context}; // For adding context to errors.
use clap::Parser; // For parsing command-line arguments.
use dialoguer::Confirm; // Interactive confirmation for the destructive path.
use std::collections::BTreeSet;
use tracing::{debug, info, warn}; // Logging framework utilities.

use super::select; // Shared service selection.

/// # Rm Arguments (`RmArgs`)
///
/// Defines the command-line arguments accepted by the `devstack rm`
/// subcommand. Uses the `clap` crate for parsing and validation.
#[derive(Parser, Debug)]
#[command(
    about = "Delete services and all of their data",
    long_about = "Shut down and delete all services and associated data.\n\
                  Useful if you'd like to start with a fresh slate.\n\
                  The default is everything; pass service names to remove only those."
)]
pub struct RmArgs {
    /// Services to delete. Defaults to every enabled service.
    services: Vec<String>,

    /// Project namespace for containers, volumes, and the network.
    /// Defaults to the configured project name.
    #[arg(long)]
    project: Option<String>,

    /// Skip the interactive confirmation prompt.
    #[arg(long)]
    no_prompt: bool,
}

/// # Handle Rm Command (`handle_rm`)
///
/// The main asynchronous handler function for the `devstack rm` command.
///
/// ## Workflow:
/// 1.  Pings the Docker daemon so a stopped daemon fails before any work.
/// 2.  Loads the configuration and resolves the catalog under the effective
///     project name.
/// 3.  Validates the positional names; unknown or disabled service names
///     abort with a listing of what is available.
/// 4.  Prompts for confirmation (unless `--no-prompt`); declining aborts.
/// 5.  Stops and removes the selected containers (absent ones become
///     warnings), removes the matching project volumes, and removes the
///     project network when no services were named.
///
/// ## Arguments
///
/// * `args`: The parsed `RmArgs` struct.
///
/// ## Returns
///
/// * `Result<()>`: `Ok(())` once the selected resources are gone.
/// * `Err`: If the daemon is unreachable, the selection names an unknown
///   service, the operator declines the prompt (`DevstackError::Aborted`),
///   or a removal fails for a reason other than the resource being absent.
pub async fn handle_rm(args: RmArgs) -> Result<()> {
    info!("Handling rm command..."); // Log entry point.
    debug!("Rm args: {:?}", args); // Log arguments if debug enabled.

    // 1. Verify the daemon is reachable before touching anything else.
    docker::connect_and_ping().await?;

    // 2. Load configuration and resolve the catalog.
    let cfg = config::load_config().context("Failed to load DevStack configuration")?;
    let project = args
        .project
        .clone()
        .unwrap_or_else(|| cfg.settings.project.clone());
    let catalog = resolve::resolve_services(&cfg, &project, true)?;

    // 3. Validate before the prompt; a typo must not reach confirmation.
    let selected = select::select_services(&catalog, &args.services, &[])?;
    // Named services scope the teardown; the bare form removes the project.
    let scoped = !args.services.is_empty();

    // 4. Confirmation gate. Everything before this point is read-only.
    if !args.no_prompt {
        println!("\nThis will delete these services and all of their data:\n");
        for name in &selected {
            println!("{}", name);
        }
        println!();
        let confirmed = Confirm::new()
            .with_prompt("Are you sure you want to continue?")
            .default(false)
            .interact()
            .context("Failed to read confirmation (use --no-prompt for non-interactive use)")?;
        if !confirmed {
            return Err(anyhow!(DevstackError::Aborted));
        }
    }

    // 5. Containers first, so their volumes are unreferenced by the time
    // volume removal runs.
    for name in &selected {
        let spec = &catalog[name];
        if !docker::state::container_exists(&spec.name).await? {
            eprintln!("> WARNING: non-existent container '{}'", spec.name);
            warn!("Container '{}' was already absent.", spec.name);
            continue;
        }
        eprintln!("> Stopping '{}' container", spec.name);
        docker::lifecycle::stop_container(&spec.name, None)
            .await
            .with_context(|| format!("Failed to stop container '{}'", spec.name))?;
        eprintln!("> Removing '{}' container", spec.name);
        docker::lifecycle::remove_container(&spec.name)
            .await
            .with_context(|| format!("Failed to remove container '{}'", spec.name))?;
    }

    // 6. Volumes carry the data, so this is the actually destructive part.
    // The daemon has no prefix filter for volumes; list and match locally.
    let prefix = format!("{}_", project);
    let selected_set: BTreeSet<&str> = selected.iter().map(String::as_str).collect();
    let volumes = docker::lifecycle::list_volumes()
        .await
        .context("Failed to list Docker volumes")?;
    let volume_names: Vec<String> = volumes.into_iter().map(|v| v.name).collect();
    let (doomed_volumes, remove_network) =
        plan_resource_removal(&volume_names, &prefix, scoped, &selected_set);
    for name in doomed_volumes {
        eprintln!("> Removing '{}' volume", name);
        docker::lifecycle::remove_volume(name)
            .await
            .with_context(|| format!("Failed to remove volume '{}'", name))?;
    }

    // 7. The network is shared by every service, so it only goes when the
    // whole project does.
    if remove_network {
        docker::lifecycle::remove_network(&project).await?;
    }

    info!("Rm complete for project '{}'.", project);
    Ok(())
}

/// Picks which volumes a teardown deletes and whether the project network
/// goes with them.
///
/// Volumes are matched by service name: a scoped `rm postgres` removes
/// `{project}_postgres` but keeps a `pgdata`-keyed data volume even though
/// it carries the project prefix. The shared network is only removed with
/// the whole project; a scoped removal leaves it for the survivors.
fn plan_resource_removal<'a>(
    volumes: &'a [String],
    prefix: &str,
    scoped: bool,
    selected: &BTreeSet<&str>,
) -> (Vec<&'a str>, bool) {
    let doomed = volumes
        .iter()
        .map(String::as_str)
        .filter(|name| select::resource_selected(name, prefix, scoped, selected))
        .collect();
    (doomed, !scoped)
}

// --- Unit Tests ---
// Argument parsing plus the pure teardown-selection plan. Executing the
// teardown requires a live daemon; see the ignored integration tests.
#[cfg(test)]
mod tests {
    use super::*;

    /// Test parsing with positional services, a project, and --no-prompt.
    #[test]
    fn test_rm_args_parsing() {
        // Simulate `devstack rm postgres redis --project acme --no-prompt`
        let args = RmArgs::try_parse_from([
            "rm",
            "postgres",
            "redis",
            "--project",
            "acme",
            "--no-prompt",
        ])
        .expect("Parsing full args failed");
        assert_eq!(args.services, vec!["postgres", "redis"]);
        assert_eq!(args.project, Some("acme".to_string()));
        assert!(args.no_prompt);
    }

    /// Test parsing with no arguments at all (full teardown, with prompt).
    #[test]
    fn test_rm_args_defaults() {
        let args = RmArgs::try_parse_from(["rm"]).expect("Parsing default args failed");
        assert!(args.services.is_empty()); // Empty means the whole project.
        assert!(args.project.is_none()); // Config default applies.
        assert!(!args.no_prompt); // Prompting is the default.
    }

    /// A full teardown deletes every project volume, data volumes included,
    /// and takes the shared network with it. Foreign projects are untouched.
    #[test]
    fn test_full_teardown_takes_all_project_resources() {
        let volumes = vec![
            "acme_pgdata".to_string(),
            "acme_postgres".to_string(),
            "other_postgres".to_string(),
        ];
        let selected: BTreeSet<&str> = ["postgres", "redis"].into_iter().collect();
        let (doomed, remove_network) = plan_resource_removal(&volumes, "acme_", false, &selected);
        assert_eq!(doomed, vec!["acme_pgdata", "acme_postgres"]);
        assert!(remove_network);
    }

    /// A scoped teardown only deletes volumes named after the selected
    /// services and leaves the network for the survivors. `rm postgres`
    /// must not take an `acme_pgdata` data volume with it.
    #[test]
    fn test_scoped_teardown_spares_data_volumes_and_network() {
        let volumes = vec![
            "acme_pgdata".to_string(),
            "acme_postgres".to_string(),
            "acme_redis".to_string(),
        ];
        let selected: BTreeSet<&str> = ["postgres"].into_iter().collect();
        let (doomed, remove_network) = plan_resource_removal(&volumes, "acme_", true, &selected);
        assert_eq!(doomed, vec!["acme_postgres"]);
        assert!(!remove_network);
    }
}
