//! # DevStack Command Modules
//!
//! File: cli/src/commands/mod.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!
//! ## Overview
//!
//! This module aggregates all subcommands that comprise the DevStack CLI.
//! It serves as the central point for importing and re-exporting command
//! modules to make them accessible to the main application entry point
//! (`main.rs`).
//!
//! ## Architecture
//!
//! The commands form a flat lifecycle, mirroring how a developer works:
//! - `up` brings a set of services to a running, current state
//! - `attach` runs one service in the foreground with streaming logs
//! - `down` stops containers while preserving their data
//! - `rm` deletes containers, volumes, and (for a full teardown) the network
//!
//! Each command defines its own arguments structure and handler function to
//! process those arguments and implement the command's functionality. The
//! `select` module is not a command; it holds the service-name selection
//! logic (positional names, `--exclude`, unknown-name errors) shared by the
//! handlers so that every command agrees on which services a name refers to.
//!

/// Run a single service in the foreground, streaming its logs until
/// interrupted, then stop and remove its container.
pub mod attach;
/// Stop the containers of selected services (or all of them), leaving
/// volumes and the network in place for the next `up`.
pub mod down;
/// Delete selected services (or the whole project): containers, their data
/// volumes, and, for a full teardown, the shared network.
pub mod rm;
/// Shared selection of services by name: validation against the resolved
/// catalog, `--exclude` handling, and deterministic ordering.
pub mod select;
/// Start selected services, checking image freshness and reconciling each
/// container toward its resolved specification.
pub mod up;
