//! # DevStack Service Catalog Resolver
//!
//! File: cli/src/core/resolve.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!
//! ## Overview
//!
//! This module turns the declarative service catalog into concrete container
//! specifications. Resolution is a pure function of the loaded configuration
//! and the project name: no global state is consulted, and resolving the same
//! inputs twice yields identical output.
//!
//! ## Architecture
//!
//! Resolution runs in three phases:
//! 1. Enablement filter and defaults: services gated by an `only_if` feature
//!    that is not enabled are dropped (with a notice unless `quiet`); the
//!    survivors get their container name, network, restart policy, and
//!    normalized port bindings.
//! 2. Environment templating: every environment value is rendered with Tera
//!    against the full batch of enabled services, so a value may reference
//!    any sibling (`{{ containers.kafka.name }}`) regardless of iteration
//!    order.
//! 3. Override rules: `[[overrides]]` entries whose feature flag is enabled
//!    patch their target spec (drop/set environment keys, replace command).
//!
//! Any malformed definition or failed render fails the whole call; partial
//! catalogs are never returned.
//!
//! ## Examples
//!
//! ```rust
//! let cfg = config::load_config()?;
//! let catalog = resolve::resolve_services(&cfg, "acme", true)?;
//! let redis = &catalog["redis"];
//! assert_eq!(redis.name, "acme_redis");
//! ```
//!
use crate::core::config::{Config, PortBinding};
use crate::core::error::{DevstackError, Result};
use anyhow::{anyhow, Context};
use serde::Serialize;
use std::collections::BTreeMap;
use tera::Tera;
use tracing::debug;

/// A fully resolved, ready-to-reconcile description of one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Catalog name of the service (e.g. `redis`).
    pub service: String,
    /// Container name, always `{project}_{service}`.
    pub name: String,
    /// Image reference, `repo:tag`.
    pub image: String,
    /// Network the container joins; shared per project.
    pub network: String,
    /// Always true. Commands that want output stream logs from the
    /// detached container instead of running attached.
    pub detach: bool,
    /// Docker restart policy (defaulted to `unless-stopped`).
    pub restart_policy: String,
    /// Command override, if any.
    pub command: Option<Vec<String>>,
    /// Environment with all templates rendered.
    pub environment: BTreeMap<String, String>,
    /// Port bindings with an explicit interface on every entry.
    pub ports: BTreeMap<String, (String, u16)>,
    /// Mounts: named volume or absolute host path -> container path.
    /// Volume names are namespaced later, by the reconciler.
    pub volumes: BTreeMap<String, String>,
    /// Pull a fresh image and recreate on every bulk bring-up.
    pub pull: bool,
    /// Skip during bulk bring-up; only `attach` starts this service.
    pub on_demand: bool,
}

impl ContainerSpec {
    /// Human-readable summary of the published ports, e.g.
    /// `(listening: 127.0.0.1:6379, 127.0.0.1:6380)`. Empty when none.
    pub fn listening_summary(&self) -> String {
        if self.ports.is_empty() {
            return String::new();
        }
        let bindings: Vec<String> = self
            .ports
            .values()
            .map(|(host, port)| format!("{}:{}", host, port))
            .collect();
        format!("(listening: {})", bindings.join(", "))
    }
}

/// What sibling services may see of each other inside templates.
#[derive(Serialize)]
struct ContainerRef {
    name: String,
    ports: BTreeMap<String, u16>,
}

#[derive(Serialize)]
struct RenderContext<'a> {
    containers: &'a BTreeMap<String, ContainerRef>,
}

/// Resolves the catalog into container specs for `project`.
///
/// Pure with respect to its inputs. Disabled services are excluded; unless
/// `quiet`, each exclusion prints a notice to stderr.
///
/// ## Arguments
///
/// * `config` - The merged configuration (catalog, settings, override rules).
/// * `project` - Effective project name (config default or `--project` flag).
/// * `quiet` - Suppress the per-service skip notices.
///
/// ## Returns
///
/// A map from service name to `ContainerSpec`, ordered by service name.
///
/// ## Errors
///
/// Fails if any environment value or override fails to render. Nothing is
/// returned in that case.
pub fn resolve_services(
    config: &Config,
    project: &str,
    quiet: bool,
) -> Result<BTreeMap<String, ContainerSpec>> {
    debug!("Resolving service catalog for project '{}'", project);

    // Phase 1: enablement filter and defaults.
    let mut specs: BTreeMap<String, ContainerSpec> = BTreeMap::new();
    for (name, service) in &config.services {
        if let Some(feature) = &service.only_if {
            if !config.settings.features.contains(feature) {
                if !quiet {
                    eprintln!("! Skipping {} due to only_if condition", name);
                }
                debug!(
                    "Service '{}' disabled (feature '{}' not enabled)",
                    name, feature
                );
                continue;
            }
        }
        specs.insert(
            name.clone(),
            ContainerSpec {
                service: name.clone(),
                name: format!("{}_{}", project, name),
                image: service.image.clone(),
                network: project.to_string(),
                detach: true,
                restart_policy: service
                    .restart
                    .clone()
                    .unwrap_or_else(|| "unless-stopped".to_string()),
                command: service.command.clone(),
                environment: service.environment.clone(),
                ports: ensure_interface(&service.ports),
                volumes: service.volumes.clone(),
                pull: service.pull,
                on_demand: service.on_demand,
            },
        );
    }

    // Phase 2: render environment templates against the full batch. Names
    // are all known at this point, so rendering order cannot matter.
    let refs: BTreeMap<String, ContainerRef> = specs
        .iter()
        .map(|(name, spec)| {
            (
                name.clone(),
                ContainerRef {
                    name: spec.name.clone(),
                    ports: spec
                        .ports
                        .iter()
                        .map(|(key, (_, port))| (key.clone(), *port))
                        .collect(),
                },
            )
        })
        .collect();
    let tera_context = tera::Context::from_serialize(RenderContext { containers: &refs })
        .map_err(|e| {
            anyhow!(DevstackError::Template { source: e })
                .context("Failed to build template context")
        })?;

    for (name, spec) in specs.iter_mut() {
        let mut rendered_env = BTreeMap::new();
        for (key, value) in &spec.environment {
            let rendered = render_value(value, &tera_context).with_context(|| {
                format!(
                    "Failed to render environment value '{}' for service '{}'",
                    key, name
                )
            })?;
            rendered_env.insert(key.clone(), rendered);
        }
        spec.environment = rendered_env;
    }

    // Phase 3: conditional override rules, in declaration order.
    for rule in &config.overrides {
        if !config.settings.features.contains(&rule.when_feature) {
            continue;
        }
        if let Some(spec) = specs.get_mut(&rule.service) {
            debug!(
                "Applying override to '{}' (feature '{}' enabled)",
                rule.service, rule.when_feature
            );
            for key in &rule.drop_env {
                spec.environment.remove(key);
            }
            for (key, value) in &rule.set_env {
                let rendered = render_value(value, &tera_context).with_context(|| {
                    format!(
                        "Failed to render override value '{}' for service '{}'",
                        key, rule.service
                    )
                })?;
                spec.environment.insert(key.clone(), rendered);
            }
            if let Some(command) = &rule.command {
                spec.command = Some(command.clone());
            }
        }
    }

    debug!("Resolved {} service(s)", specs.len());
    Ok(specs)
}

/// Normalizes port bindings so every entry carries an explicit interface.
/// Bindings without one are pinned to 127.0.0.1.
pub fn ensure_interface(
    ports: &BTreeMap<String, PortBinding>,
) -> BTreeMap<String, (String, u16)> {
    let mut rv = BTreeMap::new();
    for (key, binding) in ports {
        let bound = match binding {
            PortBinding::Port(port) => ("127.0.0.1".to_string(), *port),
            PortBinding::Interface(host, port) => (host.clone(), *port),
        };
        rv.insert(key.clone(), bound);
    }
    rv
}

fn render_value(value: &str, context: &tera::Context) -> Result<String> {
    // Environment values are plain strings, so autoescaping stays off.
    Tera::one_off(value, context, false)
        .map_err(|e| anyhow!(DevstackError::Template { source: e }))
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;

    fn parse_config(toml_content: &str) -> Config {
        toml::from_str(toml_content).expect("Failed to parse test TOML")
    }

    #[test]
    fn test_defaults_injected() {
        let config = parse_config(
            r#"
            [services.redis]
            image = "redis:5.0-alpine"
            ports = { "6379/tcp" = 6379 }
        "#,
        );
        let catalog = resolve_services(&config, "acme", true).unwrap();
        let redis = &catalog["redis"];
        assert_eq!(redis.name, "acme_redis");
        assert_eq!(redis.network, "acme");
        assert!(redis.detach);
        assert_eq!(redis.restart_policy, "unless-stopped");
        assert_eq!(redis.ports["6379/tcp"], ("127.0.0.1".to_string(), 6379));
        assert!(redis.environment.is_empty());
    }

    #[test]
    fn test_only_if_excludes_disabled_services() {
        let config = parse_config(
            r#"
            [settings]
            features = ["search"]

            [services.redis]
            image = "redis:5.0-alpine"

            [services.elastic]
            image = "elasticsearch:7.5.2"
            only_if = "search"

            [services.symbolicator]
            image = "getsentry/symbolicator:latest"
            only_if = "symbolicator"
        "#,
        );
        let catalog = resolve_services(&config, "acme", true).unwrap();
        assert!(catalog.contains_key("redis"));
        assert!(catalog.contains_key("elastic")); // Feature enabled
        assert!(!catalog.contains_key("symbolicator")); // Feature missing
    }

    #[test]
    fn test_loud_resolve_still_excludes() {
        // Exercises the notice branch; the notice itself lands on the
        // captured test stderr.
        let config = parse_config(
            r#"
            [services.symbolicator]
            image = "getsentry/symbolicator:latest"
            only_if = "symbolicator"
        "#,
        );
        let catalog = resolve_services(&config, "acme", false).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_ensure_interface_pins_loopback() {
        let mut ports = BTreeMap::new();
        ports.insert("6379/tcp".to_string(), PortBinding::Port(6379));
        ports.insert(
            "9000/tcp".to_string(),
            PortBinding::Interface("0.0.0.0".to_string(), 9000),
        );
        let normalized = ensure_interface(&ports);
        assert_eq!(normalized["6379/tcp"], ("127.0.0.1".to_string(), 6379));
        assert_eq!(normalized["9000/tcp"], ("0.0.0.0".to_string(), 9000)); // Explicit interface kept
    }

    #[test]
    fn test_environment_templates_resolve_across_services() {
        // "app" sorts before "zookeeper", so this also proves rendering does
        // not depend on map order.
        let config = parse_config(
            r#"
            [services.app]
            image = "getsentry/app:latest"
            environment = { ZK = "{{ containers.zookeeper.name }}:2181", PLAIN = "untouched" }

            [services.zookeeper]
            image = "confluentinc/cp-zookeeper:4.1.0"
            ports = { "2181/tcp" = 2181 }
        "#,
        );
        let catalog = resolve_services(&config, "acme", true).unwrap();
        let app = &catalog["app"];
        assert_eq!(app.environment["ZK"], "acme_zookeeper:2181");
        assert_eq!(app.environment["PLAIN"], "untouched");
    }

    #[test]
    fn test_environment_template_can_reference_ports() {
        let config = parse_config(
            r#"
            [services.app]
            image = "getsentry/app:latest"
            environment = { REDIS_PORT = "{{ containers.redis.ports['6379/tcp'] }}" }

            [services.redis]
            image = "redis:5.0-alpine"
            ports = { "6379/tcp" = 6379 }
        "#,
        );
        let catalog = resolve_services(&config, "acme", true).unwrap();
        assert_eq!(catalog["app"].environment["REDIS_PORT"], "6379");
    }

    #[test]
    fn test_unknown_template_reference_fails_whole_resolve() {
        let config = parse_config(
            r#"
            [services.app]
            image = "getsentry/app:latest"
            environment = { BROKER = "{{ containers.kafka.name }}" }
        "#,
        );
        let result = resolve_services(&config, "acme", true);
        assert!(result.is_err());
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("service 'app'"));
    }

    #[test]
    fn test_override_rule_applies_when_feature_enabled() {
        let config = parse_config(
            r#"
            [settings]
            features = ["snuba-eventstream"]

            [services.snuba]
            image = "getsentry/snuba:latest"
            environment = { DEFAULT_BROKERS = "{{ containers.kafka.name }}:9093", KEEP = "yes" }

            [services.kafka]
            image = "confluentinc/cp-kafka:5.1.2"

            [[overrides]]
            service = "snuba"
            when_feature = "snuba-eventstream"
            drop_env = ["DEFAULT_BROKERS"]
            set_env = { EVENTSTREAM = "{{ containers.kafka.name }}" }
            command = ["devserver", "--no-workers"]
        "#,
        );
        let catalog = resolve_services(&config, "acme", true).unwrap();
        let snuba = &catalog["snuba"];
        assert!(!snuba.environment.contains_key("DEFAULT_BROKERS"));
        assert_eq!(snuba.environment["KEEP"], "yes");
        assert_eq!(snuba.environment["EVENTSTREAM"], "acme_kafka");
        assert_eq!(
            snuba.command,
            Some(vec!["devserver".to_string(), "--no-workers".to_string()])
        );
    }

    #[test]
    fn test_override_rule_skipped_when_feature_disabled() {
        let config = parse_config(
            r#"
            [services.snuba]
            image = "getsentry/snuba:latest"
            environment = { DEFAULT_BROKERS = "broker:9093" }

            [[overrides]]
            service = "snuba"
            when_feature = "snuba-eventstream"
            drop_env = ["DEFAULT_BROKERS"]
        "#,
        );
        let catalog = resolve_services(&config, "acme", true).unwrap();
        assert_eq!(
            catalog["snuba"].environment["DEFAULT_BROKERS"],
            "broker:9093"
        );
        assert!(catalog["snuba"].command.is_none());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let config = parse_config(
            r#"
            [services.redis]
            image = "redis:5.0-alpine"
            ports = { "6379/tcp" = 6379 }

            [services.postgres]
            image = "postgres:9.6"
            environment = { REDIS = "{{ containers.redis.name }}" }
        "#,
        );
        let first = resolve_services(&config, "acme", true).unwrap();
        let second = resolve_services(&config, "acme", true).unwrap();
        assert_eq!(first, second);
        // Iteration order is the sorted service-name order.
        let names: Vec<&String> = first.keys().collect();
        assert_eq!(names, vec!["postgres", "redis"]);
    }

    #[test]
    fn test_listening_summary() {
        let config = parse_config(
            r#"
            [services.redis]
            image = "redis:5.0-alpine"
            ports = { "6379/tcp" = 6379 }

            [services.memcached]
            image = "memcached:1.5-alpine"
        "#,
        );
        let catalog = resolve_services(&config, "acme", true).unwrap();
        assert_eq!(
            catalog["redis"].listening_summary(),
            "(listening: 127.0.0.1:6379)"
        );
        assert_eq!(catalog["memcached"].listening_summary(), "");
    }
}
