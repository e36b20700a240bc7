//! # DevStack Service Reconciler
//!
//! File: cli/src/common/docker/reconcile.rs
//! Repository: https://github.com/devstack-cli/devstack
//!
//! **NOTE:** DevStack manages disposable local development services. It is
//! not a deployment tool and must never be pointed at production data.
//!

//! ## Overview
//!
//! This module drives one resolved service spec to a running container. It is
//! the convergence step shared by `up` (which applies it to every selected
//! service) and `attach` (which applies it to one service with the on-demand
//! gate lifted). The reconciler is idempotent: re-running it against an
//! already-converged service performs no mutations beyond a no-op start.
//!
//! ## Architecture
//!
//! `ensure_service_running` works through a fixed sequence:
//! 1. **On-demand gate.** An on-demand service under a bulk bring-up is
//!    skipped before anything else runs, so the gate can never leave behind
//!    half-done work (no pulled image, no created volume).
//! 2. **Freshness check** (skipped in fast mode). The local repo digest is
//!    compared against the registry's published digest; both are printed. A
//!    missing local image is pulled and the check retried. A stale image is
//!    handled per the configured policy: warn and continue on the old image,
//!    or pull fresh and force recreation.
//! 3. **Volume planning.** Bare mount sources are namespaced to
//!    `{project}_{volume}` and created if missing; absolute paths become bind
//!    mounts untouched.
//! 4. **Reuse or recreate.** An existing container is reused (started if
//!    stopped, a no-op if running) unless the service pulls fresh images or
//!    the stale policy demanded recreation; on-demand starts and fast mode
//!    always reuse. Recreation stops and removes the old container first.
//! 5. **Create and start.** The project network is ensured, then the
//!    container is created with its ports, mounts, environment, and restart
//!    policy, and started.
//!
//! Progress messages go to stderr (mutations) or stdout (digest report),
//! matching the message shapes used by the teardown commands.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::docker::reconcile::{self, ReconcileOptions};
//! use crate::core::config::StalePolicy;
//!
//! # async fn run_example(spec: &crate::core::resolve::ContainerSpec) -> crate::core::error::Result<()> {
//! let client = crate::common::registry::http_client()?;
//! let opts = ReconcileOptions {
//!     fast: false,
//!     always_start: false,
//!     on_stale: StalePolicy::Warn,
//! };
//! if let Some(container) = reconcile::ensure_service_running(&client, spec, "acme", &opts).await? {
//!     println!("{} is up", container.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
use crate::common::registry::{self, DigestPair};
use crate::core::config::StalePolicy;
use crate::core::error::{DevstackError, Result};
use crate::core::resolve::ContainerSpec;
use anyhow::{anyhow, Context};
use bollard::{
    container::{Config as ContainerConfig, CreateContainerOptions},
    models::{
        HostConfig, Mount, MountTypeEnum, PortBinding, RestartPolicy, RestartPolicyNameEnum,
    },
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument, warn};

// Sibling modules supply the daemon primitives.
use super::connect::connect_docker;
use super::{images, lifecycle, state};

/// Knobs that vary per command invocation rather than per service.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Skip the image freshness check entirely and reuse whatever exists.
    pub fast: bool,
    /// Lift the on-demand gate; used by `attach`, which names one service
    /// explicitly.
    pub always_start: bool,
    /// What to do when the local image digest no longer matches the
    /// registry's.
    pub on_stale: StalePolicy,
}

/// A service container the reconciler left running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceContainer {
    /// Docker container name, `{project}_{service}`.
    pub name: String,
}

/// Converges one service spec to a running container.
///
/// Returns `Ok(None)` only when the on-demand gate skipped the service; every
/// other successful path ends with the container running.
///
/// # Arguments
///
/// * `registry_client` - Shared HTTP client for registry digest lookups.
/// * `spec` - The resolved container spec to converge on.
/// * `project` - Project namespace, used to prefix named volumes.
/// * `opts` - Per-invocation knobs (fast mode, on-demand gate, stale policy).
///
/// # Returns
///
/// * `Result<Option<ServiceContainer>>` - The running container, or `None`
///   for a skipped on-demand service.
///
/// # Errors
///
/// Returns an `Err` if:
/// - The freshness check cannot reach the registry or the image cannot be pulled.
/// - Any Docker operation (volume/network creation, container stop/remove/create/start) fails.
#[instrument(skip(registry_client, spec, opts), fields(service = %spec.service, container = %spec.name))]
pub async fn ensure_service_running(
    registry_client: &reqwest::Client,
    spec: &ContainerSpec,
    project: &str,
    opts: &ReconcileOptions,
) -> Result<Option<ServiceContainer>> {
    // --- On-Demand Gate ---
    // Checked before any mutation so a skipped service leaves no trace:
    // no pulled image, no created volume, no network.
    if spec.on_demand && !opts.always_start {
        println!(
            "> Not starting container '{}' because it should be started on-demand with attach.",
            spec.name
        );
        debug!("Service '{}' gated as on-demand.", spec.service);
        return Ok(None);
    }

    // --- Image Freshness ---
    // Fast mode trusts whatever is local and performs no registry traffic.
    let mut stale_recreate = false;
    if !opts.fast {
        let digests = check_image_freshness(registry_client, &spec.image).await?;
        // Report both sides so a surprising recreate can be explained later.
        println!("local {} {}", spec.image, digests.local);
        println!("remote {} {}", spec.image, digests.remote);

        if digests.is_stale() {
            match opts.on_stale {
                StalePolicy::Warn => {
                    warn!(
                        "Image '{}' is stale: the registry has published a newer digest. \
                         Set on_stale = \"recreate\" to refresh automatically.",
                        spec.image
                    );
                }
                StalePolicy::Recreate => {
                    eprintln!("> Pulling image '{}'", spec.image);
                    images::pull_image(&spec.image).await?;
                    // The old container still runs the old image; replace it.
                    stale_recreate = true;
                }
            }
        }
    }

    // --- Volume Planning ---
    let (mounts, named_volumes) = plan_mounts(&spec.volumes, project);
    for volume in &named_volumes {
        lifecycle::ensure_volume(volume).await?;
    }

    let listening = spec.listening_summary();

    // --- Reuse or Recreate ---
    if state::container_exists(&spec.name).await? {
        if should_reuse_container(spec.pull, stale_recreate, spec.on_demand, opts.fast) {
            eprintln!("> Starting EXISTING container '{}' {}", spec.name, listening);
            // Already-running containers make this a no-op (Docker 304).
            lifecycle::start_container(&spec.name).await?;
            return Ok(Some(ServiceContainer {
                name: spec.name.clone(),
            }));
        }
        // Replace: data lives in volumes, so dropping the container is safe.
        eprintln!("> Stopping container '{}'", spec.name);
        lifecycle::stop_container(&spec.name, None).await?;
        eprintln!("> Removing container '{}'", spec.name);
        lifecycle::remove_container(&spec.name).await?;
    }

    // --- Create and Start ---
    // `attach` may run before any `up` has, so the network is ensured here
    // too, not only in the bulk path.
    lifecycle::ensure_network(&spec.network).await?;

    eprintln!("> Creating container '{}'", spec.name);
    create_service_container(spec, mounts).await?;

    eprintln!("> Starting container '{}' {}", spec.name, listening);
    lifecycle::start_container(&spec.name).await?;

    info!("Service '{}' is up as '{}'.", spec.service, spec.name);
    Ok(Some(ServiceContainer {
        name: spec.name.clone(),
    }))
}

/// Compares the local digest for an image against the registry's.
///
/// A missing local image is repaired by pulling and retrying once; if the
/// image still reports no digest after a pull, the error propagates.
async fn check_image_freshness(
    registry_client: &reqwest::Client,
    image: &str,
) -> Result<DigestPair> {
    let local = match images::local_image_digest(image).await {
        Ok(digest) => digest,
        Err(e)
            if e.downcast_ref::<DevstackError>()
                .is_some_and(|err| matches!(err, DevstackError::ImageNotFound { .. })) =>
        {
            println!("> Image '{}' not found locally, pulling.", image);
            images::pull_image(image).await?;
            images::local_image_digest(image).await?
        }
        Err(e) => return Err(e),
    };

    let remote = registry::remote_image_digest(registry_client, image)
        .await
        .with_context(|| format!("Failed to fetch the remote digest for '{}'", image))?;

    Ok(DigestPair { local, remote })
}

/// Decides whether an existing container is kept or replaced.
///
/// `pull` services expect their tag to move between bring-ups, and a stale
/// digest under the recreate policy forces the same path. On-demand starts
/// and fast mode always take what already exists.
fn should_reuse_container(pull: bool, stale_recreate: bool, on_demand: bool, fast: bool) -> bool {
    let mut reuse = !(pull || stale_recreate);
    if on_demand || fast {
        reuse = true;
    }
    reuse
}

/// Translates the spec's volume map into bollard mounts.
///
/// A source containing `/` is an absolute host path and becomes a bind
/// mount; anything else is a named volume, namespaced to
/// `{project}_{volume}` so two projects can never share data. The second
/// element of the result lists the namespaced volumes the caller must ensure
/// exist before the container is created.
fn plan_mounts(volumes: &BTreeMap<String, String>, project: &str) -> (Vec<Mount>, Vec<String>) {
    let mut mounts = Vec::new();
    let mut named_volumes = Vec::new();

    for (source, target) in volumes {
        if source.contains('/') {
            // Host path bind mount, used verbatim.
            mounts.push(Mount {
                target: Some(target.clone()),
                source: Some(source.clone()),
                typ: Some(MountTypeEnum::BIND),
                ..Default::default()
            });
        } else {
            let namespaced = format!("{}_{}", project, source);
            mounts.push(Mount {
                target: Some(target.clone()),
                source: Some(namespaced.clone()),
                typ: Some(MountTypeEnum::VOLUME),
                ..Default::default()
            });
            named_volumes.push(namespaced);
        }
    }

    (mounts, named_volumes)
}

/// Builds the port binding and exposure maps for container creation.
///
/// Every binding carries its explicit host interface; the resolver already
/// pinned interface-less entries to 127.0.0.1. Keys without a protocol
/// suffix are normalized to `/tcp`, matching what the daemon stores.
fn port_bindings_for(
    ports: &BTreeMap<String, (String, u16)>,
) -> (
    HashMap<String, Option<Vec<PortBinding>>>,
    HashMap<String, HashMap<(), ()>>,
) {
    let mut bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    let mut exposed: HashMap<String, HashMap<(), ()>> = HashMap::new();

    for (container_port, (host_ip, host_port)) in ports {
        let key = if container_port.contains('/') {
            container_port.clone()
        } else {
            format!("{}/tcp", container_port)
        };
        exposed.insert(key.clone(), HashMap::new());
        bindings.insert(
            key,
            Some(vec![PortBinding {
                host_ip: Some(host_ip.clone()),
                host_port: Some(host_port.to_string()),
            }]),
        );
    }

    (bindings, exposed)
}

/// Maps a restart policy string onto the Docker API enum.
fn restart_policy_for(policy: &str) -> RestartPolicy {
    let name = match policy {
        "no" => RestartPolicyNameEnum::NO,
        "always" => RestartPolicyNameEnum::ALWAYS,
        "on-failure" => RestartPolicyNameEnum::ON_FAILURE,
        // Config validation only lets the known policies through; the
        // resolver's default lands here.
        _ => RestartPolicyNameEnum::UNLESS_STOPPED,
    };
    RestartPolicy {
        name: Some(name),
        maximum_retry_count: None,
    }
}

/// Creates the container for a spec. The caller starts it afterwards.
async fn create_service_container(spec: &ContainerSpec, mounts: Vec<Mount>) -> Result<()> {
    // Establish connection to Docker daemon.
    let docker = connect_docker().await?;

    let (port_bindings, exposed_ports) = port_bindings_for(&spec.ports);

    // Format environment variables into the "KEY=VALUE" list the API wants.
    let env_list: Vec<String> = spec
        .environment
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    // Service containers always run detached; output is reached via
    // `attach`, which streams logs rather than holding the terminal.
    let attach_streams = !spec.detach;

    let host_config = HostConfig {
        port_bindings: if port_bindings.is_empty() {
            None
        } else {
            Some(port_bindings)
        },
        mounts: if mounts.is_empty() { None } else { Some(mounts) },
        restart_policy: Some(restart_policy_for(&spec.restart_policy)),
        // Joining the project network gives services DNS names matching
        // their container names, which the environment templates rely on.
        network_mode: Some(spec.network.clone()),
        ..Default::default()
    };

    let config = ContainerConfig {
        image: Some(spec.image.clone()),
        env: if env_list.is_empty() {
            None
        } else {
            Some(env_list)
        },
        cmd: spec.command.clone(),
        exposed_ports: if exposed_ports.is_empty() {
            None
        } else {
            Some(exposed_ports)
        },
        host_config: Some(host_config),
        attach_stdout: Some(attach_streams),
        attach_stderr: Some(attach_streams),
        attach_stdin: Some(attach_streams),
        open_stdin: Some(attach_streams),
        tty: Some(attach_streams),
        ..Default::default()
    };

    debug!(
        "Creating container '{}' from image '{}'",
        spec.name, spec.image
    );
    let create_options = Some(CreateContainerOptions {
        name: spec.name.clone(),
        platform: None,
    });

    docker
        .create_container(create_options, config)
        .await
        .map_err(|e| match e {
            // 404 on create means the image is gone; in fast mode nothing
            // was pulled beforehand, so this is the first place it shows.
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => anyhow!(DevstackError::ImageNotFound {
                name: spec.image.clone()
            }),
            // 409 is a name conflict, only reachable through a race with
            // another invocation since existence was checked above.
            bollard::errors::Error::DockerResponseServerError {
                status_code: 409,
                message,
            } => anyhow!(DevstackError::Docker(format!(
                "Conflict creating container '{}': {}",
                spec.name, message
            ))),
            _ => anyhow!(DevstackError::DockerApi { source: e })
                .context(format!("Failed to create container '{}'", spec.name)),
        })?;

    info!("Container '{}' created.", spec.name);
    Ok(())
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    /// The default case keeps an existing container.
    #[test]
    fn test_reuse_by_default() {
        assert!(should_reuse_container(false, false, false, false));
    }

    /// Pull services get a fresh container on every bulk bring-up.
    #[test]
    fn test_pull_forces_recreate() {
        assert!(!should_reuse_container(true, false, false, false));
    }

    /// A stale digest under the recreate policy replaces the container.
    #[test]
    fn test_stale_recreate_forces_recreate() {
        assert!(!should_reuse_container(false, true, false, false));
    }

    /// Fast mode reuses even for pull services.
    #[test]
    fn test_fast_overrides_pull() {
        assert!(should_reuse_container(true, false, false, true));
    }

    /// On-demand starts reuse even for pull services.
    #[test]
    fn test_on_demand_overrides_pull() {
        assert!(should_reuse_container(true, false, true, false));
    }

    /// The bulk path skips an on-demand service before any daemon or
    /// registry call, so this runs without either.
    #[tokio::test]
    async fn test_on_demand_gate_skips_service() {
        let config: crate::core::config::Config = toml::from_str(
            r#"
            [services.proxy]
            image = "nginx:1.25"
            on_demand = true
        "#,
        )
        .expect("Failed to parse test TOML");
        let catalog = crate::core::resolve::resolve_services(&config, "acme", true)
            .expect("Failed to resolve test catalog");
        let opts = ReconcileOptions {
            fast: false,
            always_start: false,
            on_stale: StalePolicy::Warn,
        };
        let client = reqwest::Client::new();
        let started = ensure_service_running(&client, &catalog["proxy"], "acme", &opts)
            .await
            .expect("On-demand skip is not an error");
        assert_eq!(started, None);
    }

    /// Bare sources become namespaced volumes; paths become bind mounts.
    #[test]
    fn test_plan_mounts_namespaces_bare_sources() {
        let mut volumes = BTreeMap::new();
        volumes.insert("postgres".to_string(), "/var/lib/postgresql/data".to_string());
        volumes.insert(
            "/home/me/certs".to_string(),
            "/etc/certs".to_string(),
        );

        let (mounts, named) = plan_mounts(&volumes, "acme");

        assert_eq!(named, vec!["acme_postgres".to_string()]);
        // BTreeMap iteration: "/home/me/certs" sorts before "postgres".
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].typ, Some(MountTypeEnum::BIND));
        assert_eq!(mounts[0].source.as_deref(), Some("/home/me/certs"));
        assert_eq!(mounts[0].target.as_deref(), Some("/etc/certs"));
        assert_eq!(mounts[1].typ, Some(MountTypeEnum::VOLUME));
        assert_eq!(mounts[1].source.as_deref(), Some("acme_postgres"));
        assert_eq!(mounts[1].target.as_deref(), Some("/var/lib/postgresql/data"));
    }

    /// Two projects namespacing the same volume name never collide.
    #[test]
    fn test_plan_mounts_is_project_scoped() {
        let mut volumes = BTreeMap::new();
        volumes.insert("data".to_string(), "/data".to_string());

        let (_, first) = plan_mounts(&volumes, "alpha");
        let (_, second) = plan_mounts(&volumes, "beta");
        assert_eq!(first, vec!["alpha_data".to_string()]);
        assert_eq!(second, vec!["beta_data".to_string()]);
    }

    /// Every binding carries its explicit host interface.
    #[test]
    fn test_port_bindings_keep_interface() {
        let mut ports = BTreeMap::new();
        ports.insert("6379/tcp".to_string(), ("127.0.0.1".to_string(), 6379));

        let (bindings, exposed) = port_bindings_for(&ports);

        assert!(exposed.contains_key("6379/tcp"));
        let binding = &bindings["6379/tcp"].as_ref().unwrap()[0];
        assert_eq!(binding.host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(binding.host_port.as_deref(), Some("6379"));
    }

    /// Keys without a protocol default to TCP, like the daemon does.
    #[test]
    fn test_port_bindings_default_protocol() {
        let mut ports = BTreeMap::new();
        ports.insert("9092".to_string(), ("127.0.0.1".to_string(), 9092));

        let (bindings, exposed) = port_bindings_for(&ports);

        assert!(bindings.contains_key("9092/tcp"));
        assert!(exposed.contains_key("9092/tcp"));
    }

    /// All four Docker restart policies map onto the API enum.
    #[test]
    fn test_restart_policy_mapping() {
        assert_eq!(
            restart_policy_for("unless-stopped").name,
            Some(RestartPolicyNameEnum::UNLESS_STOPPED)
        );
        assert_eq!(
            restart_policy_for("always").name,
            Some(RestartPolicyNameEnum::ALWAYS)
        );
        assert_eq!(
            restart_policy_for("on-failure").name,
            Some(RestartPolicyNameEnum::ON_FAILURE)
        );
        assert_eq!(
            restart_policy_for("no").name,
            Some(RestartPolicyNameEnum::NO)
        );
    }
}
