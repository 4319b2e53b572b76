//! Orchestrator API seam - everything dasklink asks of the container
//! orchestrator
//!
//! The orchestrator owns the actual pods and services; dasklink only lists
//! and deletes them by label selector and submits cluster creation requests
//! through the cluster-management layer. The trait keeps that boundary
//! mockable in tests.

pub mod http;
pub mod resources;

pub use http::HttpOrchestrator;
pub use resources::{
    ClusterCreated, ClusterRequest, ContainerSpec, EnvVar, ObjectMeta, PodObject, PodPhase,
    PodTemplate, ResourceRequirements, ServiceObject, ServicePort, ServiceTemplate, ServiceType,
    Volume, VolumeMount, CLUSTER_NAME_LABEL, COMPONENT_LABEL, DASHBOARD_PORT, SCHEDULER_COMPONENT,
    SCHEDULER_PORT,
};

use async_trait::async_trait;
use thiserror::Error;

use crate::cluster::Selector;

/// Errors surfaced by the orchestrator API
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("specification rejected by orchestrator: {0}")]
    Rejected(String),

    #[error("orchestrator API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("orchestrator transport error: {0}")]
    Transport(String),
}

impl OrchestratorError {
    /// Whether this error means the object was already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrchestratorError::NotFound { .. })
    }
}

/// Operations dasklink performs against the orchestrator
#[async_trait]
pub trait OrchestratorApi: Send + Sync {
    /// List pods in a namespace matching a label selector
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<PodObject>, OrchestratorError>;

    /// Delete a pod by name
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), OrchestratorError>;

    /// List services in a namespace matching a label selector
    async fn list_services(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<ServiceObject>, OrchestratorError>;

    /// Delete a service by name
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), OrchestratorError>;

    /// Create a scheduler/worker cluster from templates
    async fn create_cluster(
        &self,
        request: &ClusterRequest,
    ) -> Result<ClusterCreated, OrchestratorError>;

    /// Scale a cluster to a fixed worker count
    async fn scale_cluster(
        &self,
        namespace: &str,
        name: &str,
        replicas: u32,
    ) -> Result<(), OrchestratorError>;

    /// Let the cluster adapt its worker count between bounds; an absent
    /// maximum means unbounded
    async fn adapt_cluster(
        &self,
        namespace: &str,
        name: &str,
        minimum: u32,
        maximum: Option<u32>,
    ) -> Result<(), OrchestratorError>;
}

// ============================================================================
// Mock implementation for testing (no I/O)
// ============================================================================
