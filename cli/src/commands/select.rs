//! # DevStack Service Selection
//!
//! File: cli/src/commands/select.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!
//! ## Overview
//!
//! This module turns the positional `SERVICES...` arguments shared by `up`,
//! `attach`, `down`, and `rm` into a validated selection against the resolved
//! catalog. Leaving the list empty selects every enabled service; naming a
//! service that is unknown (or disabled by its `only_if` feature) aborts the
//! whole command with a listing of what is available, before any Docker
//! mutation has happened.
//!
//! ## Architecture
//!
//! `select_services` is a pure function over the catalog and the argument
//! lists. It validates both the requested services and the `--exclude`
//! entries; a typo in an exclusion is just as much a mistake as a typo in a
//! request, and silently ignoring it would bring up a service the user asked
//! to skip. The returned selection is sorted and de-duplicated.
//!
//! `resource_selected` is the teardown-side counterpart: given a resource
//! name the daemon reported (a container or volume), it decides whether the
//! name falls inside the selection under the `{project}_` prefix. `down` and
//! `rm` share it so the two commands cannot drift apart on which resources a
//! scoped invocation touches.
//!
//! ## Usage
//!
//! ```rust
//! let catalog = resolve::resolve_services(&cfg, "acme", true)?;
//! let selected = select::select_services(&catalog, &args.services, &args.exclude)?;
//! for name in &selected {
//!     // ... reconcile catalog[name] ...
//! }
//! ```
//!
use crate::core::error::{DevstackError, Result};
use crate::core::resolve::ContainerSpec;
use anyhow::anyhow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Validates the requested service names against the catalog and returns the
/// effective selection.
///
/// ## Arguments
///
/// * `catalog` - The resolved catalog of enabled services.
/// * `requested` - Positional service names; empty means "all of them".
/// * `exclude` - Names to drop from the selection (the `--exclude` flag).
///
/// ## Returns
///
/// The selected service names, sorted and de-duplicated.
///
/// ## Errors
///
/// Returns `DevstackError::UnknownService` for any name (requested or
/// excluded) not present in the catalog, after printing the available
/// service names to stderr.
pub fn select_services(
    catalog: &BTreeMap<String, ContainerSpec>,
    requested: &[String],
    exclude: &[String],
) -> Result<Vec<String>> {
    // Empty request means every enabled service.
    let mut selected: BTreeSet<String> = if requested.is_empty() {
        catalog.keys().cloned().collect()
    } else {
        let mut set = BTreeSet::new();
        for name in requested {
            if !catalog.contains_key(name) {
                return Err(unknown_service(name, catalog));
            }
            set.insert(name.clone());
        }
        set
    };

    // Exclusions are validated too; a typo here is still a user mistake.
    for name in exclude {
        if !catalog.contains_key(name) {
            return Err(unknown_service(name, catalog));
        }
        selected.remove(name);
    }

    debug!("Selected {} service(s): {:?}", selected.len(), selected);
    Ok(selected.into_iter().collect())
}

/// Decides whether a daemon-side resource falls inside the current
/// selection during teardown.
///
/// ## Arguments
///
/// * `name` - The resource name as the daemon reports it (container or
///   volume), without any leading `/`.
/// * `prefix` - The project prefix, `"{project}_"`.
/// * `scoped` - Whether the command named specific services.
/// * `selected` - The validated selection; only consulted when scoped.
///
/// ## Returns
///
/// `true` when the name carries the project prefix and, for a scoped
/// command, the remainder after the prefix is a selected service name.
/// Resources are matched by service name, nothing fuzzier: a scoped
/// `rm postgres` removes `{project}_postgres` but keeps a `pgdata`-keyed
/// data volume even though it carries the project prefix.
pub fn resource_selected(
    name: &str,
    prefix: &str,
    scoped: bool,
    selected: &BTreeSet<&str>,
) -> bool {
    match name.strip_prefix(prefix) {
        Some(suffix) => !scoped || selected.contains(suffix),
        None => false,
    }
}

/// Builds the unknown-service error, printing the available names first so
/// the user sees what they could have typed.
fn unknown_service(name: &str, catalog: &BTreeMap<String, ContainerSpec>) -> anyhow::Error {
    let available: Vec<&str> = catalog.keys().map(String::as_str).collect();
    eprintln!("Services that are available:\n{}\n", available.join("\n"));
    anyhow!(DevstackError::UnknownService {
        name: name.to_string()
    })
}
