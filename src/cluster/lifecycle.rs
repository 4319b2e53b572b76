//! Caller-facing cluster surface
//!
//! `RemoteCluster` ties one function's spec and identity to the three
//! external collaborators and keeps the latest status snapshot. The
//! run-execution layer holds one instance per run and threads the returned
//! client handle itself; nothing here is process-global.

use std::sync::Arc;

use super::identity::FunctionIdentity;
use super::provisioner::{self, ProvisionError};
use super::reclaimer::{self, ReclaimError, ReclaimReport};
use super::resolver::{ConnectionResolver, ResolveError, ResolvedClient};
use super::selector::Selector;
use super::spec::ClusterSpec;
use super::status::ClusterStatus;
use super::store::{self, ObjectSummary};
use crate::config::RuntimeConfig;
use crate::metadata::MetadataService;
use crate::orchestrator::{OrchestratorApi, OrchestratorError};
use crate::transport::{ClientHandle, SchedulerTransport};

/// One function's remote cluster, as seen by the run-execution layer
pub struct RemoteCluster {
    spec: ClusterSpec,
    identity: FunctionIdentity,
    status: ClusterStatus,
    orchestrator: Arc<dyn OrchestratorApi>,
    metadata: Arc<dyn MetadataService>,
    transport: Arc<dyn SchedulerTransport>,
    config: RuntimeConfig,
}

impl RemoteCluster {
    pub fn new(
        spec: ClusterSpec,
        identity: FunctionIdentity,
        orchestrator: Arc<dyn OrchestratorApi>,
        metadata: Arc<dyn MetadataService>,
        transport: Arc<dyn SchedulerTransport>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            spec,
            identity,
            status: ClusterStatus::default(),
            orchestrator,
            metadata,
            transport,
            config,
        }
    }

    pub fn spec(&self) -> &ClusterSpec {
        &self.spec
    }

    pub fn identity(&self) -> &FunctionIdentity {
        &self.identity
    }

    /// The latest status snapshot
    pub fn status(&self) -> &ClusterStatus {
        &self.status
    }

    /// The selector scoping all orchestrator operations to this function
    pub fn selector(&self) -> Selector {
        Selector::for_function(&self.identity)
    }

    /// Provision the cluster and adopt the resulting status snapshot
    pub async fn deploy(&mut self) -> Result<ClusterStatus, ProvisionError> {
        let status = provisioner::deploy(
            self.orchestrator.as_ref(),
            self.metadata.as_ref(),
            &self.config,
            &self.spec,
            &self.identity,
        )
        .await?;
        self.status = status.clone();
        Ok(status)
    }

    /// Resolve a client connection, deploying or recovering as needed
    ///
    /// `reuse` lets the caller thread in an existing in-process client for
    /// the no-cluster path.
    pub async fn get_client(
        &mut self,
        reuse: Option<ClientHandle>,
    ) -> Result<ResolvedClient, ResolveError> {
        let resolver = ConnectionResolver::new(
            self.orchestrator.clone(),
            self.metadata.clone(),
            self.transport.clone(),
            self.config.clone(),
        );
        let resolved = resolver
            .resolve(&self.spec, &self.identity, &self.status, reuse)
            .await?;
        self.status = resolved.status.clone();
        Ok(resolved)
    }

    /// The cluster's live lifecycle state as a plain string
    pub async fn get_status(&self) -> Result<String, OrchestratorError> {
        store::live_state_string(
            self.orchestrator.as_ref(),
            &self.selector(),
            &self.config.namespace,
        )
        .await
    }

    /// Summaries of the orchestrator objects this cluster owns
    pub async fn list_objects(&self) -> Result<Vec<ObjectSummary>, OrchestratorError> {
        store::list_objects(
            self.orchestrator.as_ref(),
            &self.selector(),
            &self.config.namespace,
        )
        .await
    }

    /// Delete this cluster's orchestrator objects
    ///
    /// `force_all` tears everything down; otherwise only dead pods (and
    /// their services) are collected.
    pub async fn reclaim(&self, force_all: bool) -> Result<ReclaimReport, ReclaimError> {
        reclaimer::reclaim(
            self.orchestrator.as_ref(),
            &self.selector(),
            force_all,
            &self.config.namespace,
        )
        .await
    }

    /// Entry command for a handler that is not directly invocable
    ///
    /// A handler referenced by name lives in the spec's command file;
    /// asking for one without a configured command is a configuration
    /// error, surfaced before any work is submitted.
    pub fn handler_command(&self, handler: &str) -> Result<(String, String), ResolveError> {
        match &self.spec.command {
            Some(command) => Ok((command.clone(), handler.to_string())),
            None => Err(ResolveError::Configuration(format!(
                "handler '{}' specified without a command (script file path); \
                 set the command or pass an invocable handler",
                handler
            ))),
        }
    }

    /// Release a client handle obtained from `get_client`
    pub fn close(&self, handle: ClientHandle) {
        handle.close();
    }
}
