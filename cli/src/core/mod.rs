//! # DevStack Core Infrastructure
//!
//! File: cli/src/core/mod.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!
//! ## Overview
//!
//! This module aggregates the core infrastructure components that provide
//! foundational functionality for the DevStack application. These components
//! handle configuration, error management, and catalog resolution.
//!
//! ## Architecture
//!
//! The core infrastructure consists of three key components:
//! - `config`: Configuration loading, merging, and validation
//! - `error`: Error types and error handling utilities
//! - `resolve`: Turning the declarative catalog into container specs
//!
//! These components provide essential infrastructure that's used by
//! the command modules to implement their functionality.
//!
//! ## Usage
//!
//! Core infrastructure is imported by command handlers:
//!
//! ```rust
//! use crate::core::config; // For loading the service catalog
//! use crate::core::error::{DevstackError, Result}; // For error handling
//! use crate::core::resolve; // For resolving the catalog
//! ```
//!
//! These modules provide foundational capabilities that are used across
//! different parts of the application, ensuring consistent behavior.
//!
pub mod config;
pub mod error;
pub mod resolve;
