//! Cluster provisioner - turning a spec into a running cluster
//!
//! Deploy composes the worker pod template and scheduler service template
//! from the spec, submits the creation request under a collision-free
//! generated name, applies the scaling policy and records the resulting
//! address and ports.

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::identity::FunctionIdentity;
use super::selector::Selector;
use super::spec::{ClusterSpec, SpecError};
use super::status::{ClusterStatus, LifecycleState};
use crate::config::RuntimeConfig;
use crate::metadata::{FunctionRecord, MetadataError, MetadataService};
use crate::orchestrator::{
    ClusterRequest, ContainerSpec, EnvVar, OrchestratorApi, OrchestratorError, PodTemplate,
    ServiceTemplate, ServiceType,
};

/// Name prefix for every cluster dasklink creates
pub const CLUSTER_NAME_PREFIX: &str = "dasklink";

/// Environment variable carrying the extra dependency injection
pub const EXTRA_PIP_ENV: &str = "EXTRA_PIP";

/// Errors surfaced by deploy
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Fatal and non-retriable: the function needs its image built first
    #[error(
        "function image is not built/ready; run the image build first or set a base dask image"
    )]
    ImageNotReady,

    #[error("invalid cluster specification: {0}")]
    Spec(#[from] SpecError),

    /// The orchestrator rejected the submitted templates
    #[error("orchestrator rejected the cluster specification: {0}")]
    Rejected(String),

    #[error("orchestrator error during deploy: {0}")]
    Orchestrator(OrchestratorError),

    #[error("failed to persist cluster status: {0}")]
    Persist(#[from] MetadataError),
}

impl From<OrchestratorError> for ProvisionError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Rejected(message) => ProvisionError::Rejected(message),
            other => ProvisionError::Orchestrator(other),
        }
    }
}

/// Resolve the container image to run workers with
fn resolve_image(spec: &ClusterSpec, config: &RuntimeConfig) -> Result<String, ProvisionError> {
    if let Some(image) = &spec.image {
        return Ok(image.clone());
    }
    if !spec.build_commands.is_empty() {
        return Err(ProvisionError::ImageNotReady);
    }
    Ok(config.default_image.clone())
}

/// Generated cluster name: prefix, normalized function name, uniqueness
/// suffix
fn cluster_name(identity: &FunctionIdentity) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        CLUSTER_NAME_PREFIX,
        identity.normalized_name(),
        &suffix[..8]
    )
}

/// Compose the creation request for this spec and identity
fn compose_request(
    spec: &ClusterSpec,
    identity: &FunctionIdentity,
    config: &RuntimeConfig,
    image: String,
) -> ClusterRequest {
    let mut env = spec.env.clone();
    if let Some(requirement) = &spec.extra_pip {
        env.push(EnvVar::new(EXTRA_PIP_ENV, requirement.clone()));
    }

    let mut args = vec![
        "dask-worker".to_string(),
        "--nthreads".to_string(),
        spec.nthreads.to_string(),
    ];
    args.extend(spec.args.iter().cloned());

    let container = ContainerSpec {
        name: "base".to_string(),
        image,
        args,
        env,
        image_pull_policy: spec.image_pull_policy.clone(),
        volume_mounts: spec.volume_mounts.clone(),
        resources: spec.resources.clone(),
    };

    let pod_template = PodTemplate {
        labels: Selector::for_function(identity).to_labels(),
        containers: vec![container],
        restart_policy: "Never".to_string(),
        volumes: spec.volumes.clone(),
        service_account: spec.service_account.clone(),
        image_pull_secret: spec.image_pull_secret.clone(),
    };

    let mut service_template = ServiceTemplate::default_scheduler();
    service_template.service_type = spec.service_type;
    if let Some(port) = spec.node_port {
        // a requested node port always means NodePort exposure, and it is
        // patched onto the template's second port entry
        service_template.service_type = ServiceType::NodePort;
        service_template.ports[1].node_port = Some(port);
    }

    ClusterRequest {
        name: cluster_name(identity),
        namespace: config.namespace.clone(),
        pod_template,
        service_template,
        scheduler_timeout_secs: config.scheduler_timeout_secs,
    }
}

/// Create the cluster, apply scaling policy and record the outcome
///
/// Side effect: the created pods and services outlive this call; they are
/// only removed by an explicit reclaim.
pub async fn deploy(
    orchestrator: &dyn OrchestratorApi,
    metadata: &dyn MetadataService,
    config: &RuntimeConfig,
    spec: &ClusterSpec,
    identity: &FunctionIdentity,
) -> Result<ClusterStatus, ProvisionError> {
    spec.validate()?;

    let image = resolve_image(spec, config)?;
    let request = compose_request(spec, identity, config, image);
    let node_port_mode = request.service_template.service_type == ServiceType::NodePort;

    let created = orchestrator.create_cluster(&request).await?;

    if let Some(replicas) = spec.replicas {
        orchestrator
            .scale_cluster(&config.namespace, &created.name, replicas)
            .await?;
    } else {
        orchestrator
            .adapt_cluster(
                &config.namespace,
                &created.name,
                spec.min_replicas,
                spec.max_replicas,
            )
            .await?;
    }

    let mut status = ClusterStatus {
        state: LifecycleState::Running,
        scheduler_address: Some(created.scheduler_address.clone()),
        cluster_name: Some(created.name.clone()),
        node_ports: Default::default(),
    };

    if node_port_mode {
        if let Some(service) = &created.service {
            for port in &service.ports {
                if let Some(node_port) = port.node_port {
                    status.node_ports.insert(port.name.clone(), node_port);
                }
            }
        }
    }

    info!(
        "cluster {} started at {}",
        created.name, created.scheduler_address
    );

    let record = FunctionRecord::new(
        identity.name.clone(),
        identity.project.clone(),
        identity.tag.clone(),
    )
    .with_status(status.clone());
    metadata.save(&record).await?;

    Ok(status)
}
