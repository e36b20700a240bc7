//! # DevStack Error Types
//!
//! File: cli/src/core/error.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!
//! ## Overview
//!
//! This module defines the error types and error handling mechanisms used throughout
//! the DevStack application. It provides a consistent approach to error management
//! with detailed error information and context.
//!
//! ## Architecture
//!
//! The error system consists of two main components:
//! - `DevstackError`: A custom error enum using `thiserror` for specific error types
//! - `Result<T>`: A type alias for `anyhow::Result<T>` for flexible error handling
//!
//! The error types cover various domains:
//! - Configuration and service-catalog errors
//! - Docker interaction errors
//! - Registry (token/manifest) errors
//! - Environment-template rendering errors
//!
//! ## Examples
//!
//! Using the error system:
//!
//! ```rust
//! // Return a specific error type
//! if !catalog.contains_key(service) {
//!     return Err(DevstackError::UnknownService { name: service.to_string() })?;
//! }
//!
//! // Add context to errors using anyhow
//! let config = load_config(path)
//!     .with_context(|| format!("Failed to load config: {}", path.display()))?;
//!
//! // Pattern matching on error types
//! match result {
//!     Ok(digest) => println!("local digest: {}", digest),
//!     Err(e) if e.downcast_ref::<DevstackError>().map_or(false, |de| matches!(de, DevstackError::ImageNotFound { .. })) => {
//!         println!("Image missing, pulling...");
//!     },
//!     Err(e) => return Err(e),
//! }
//! ```
//!
//! The error system provides detailed error messages to the user and
//! includes context information for debugging.
//!
use thiserror::Error;

/// Custom error type for the DevStack application.
// No PartialEq derive because source fields don't implement it.
#[derive(Error, Debug)]
pub enum DevstackError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Docker error: {0}")]
    Docker(String),

    #[error("Docker API interaction failed: {source}")]
    DockerApi {
        #[from]
        source: bollard::errors::Error,
    },

    #[error("Container '{name}' not found.")]
    ContainerNotFound { name: String },

    #[error("Image '{name}' not found.")]
    ImageNotFound { name: String },

    #[error("Service `{name}` is not known or not enabled.")]
    UnknownService { name: String },

    #[error("No registry endpoints configured for '{host}'.")]
    UnsupportedRegistry { host: String },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Registry request failed: {source}")]
    RegistryHttp {
        #[from]
        source: reqwest::Error,
    },

    #[error("Template rendering error: {source}")]
    Template {
        #[from]
        source: tera::Error,
    },

    #[error("Aborted!")]
    Aborted,
}

/// Type alias for Result using anyhow::Error for broad compatibility.
/// Anyhow allows for easy context addition and flexible error handling.
pub type Result<T> = anyhow::Result<T>;

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_err = DevstackError::Config("No services defined".to_string());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: No services defined"
        );

        let unknown_service = DevstackError::UnknownService {
            name: "redis".into(),
        };
        assert_eq!(
            unknown_service.to_string(),
            "Service `redis` is not known or not enabled."
        );

        let image_not_found = DevstackError::ImageNotFound {
            name: "postgres:9.6".into(),
        };
        assert_eq!(
            image_not_found.to_string(),
            "Image 'postgres:9.6' not found."
        );

        let unsupported = DevstackError::UnsupportedRegistry {
            host: "quay.io".into(),
        };
        assert_eq!(
            unsupported.to_string(),
            "No registry endpoints configured for 'quay.io'."
        );
    }

    #[test]
    fn test_aborted_display() {
        assert_eq!(DevstackError::Aborted.to_string(), "Aborted!");
    }
}
