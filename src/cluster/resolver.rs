//! Connection resolver - the cluster lifecycle state machine
//!
//! Resolution starts from the caller's current status snapshot and walks
//! the states below until it holds a live client or a fatal error:
//!
//! ```text
//! NO_CLUSTER ──────────────────────────────► terminal (local client)
//! UNRESOLVED ──(persisted hit / deploy)────► RESOLVED
//! RESOLVED ──(connect ok)─────────────────► CONNECTED
//!          └─(connection refused)─────────► STALE
//! STALE ──(live check, maybe re-deploy,
//!          one reconnect)─────────────────► CONNECTED or FAILED
//! ```
//!
//! The stale path runs exactly once: a second refusal is promoted to a
//! fatal error so a persistently broken deployment cannot trap the caller
//! in a reconnect loop. The happy path trusts the persisted record; only
//! the stale path consults the live orchestrator.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::identity::FunctionIdentity;
use super::provisioner::{self, ProvisionError};
use super::selector::Selector;
use super::spec::ClusterSpec;
use super::status::ClusterStatus;
use super::store::{self, StatusLookup};
use crate::config::RuntimeConfig;
use crate::metadata::MetadataService;
use crate::orchestrator::{OrchestratorApi, OrchestratorError, ServiceType};
use crate::transport::{ClientHandle, SchedulerTransport, TransportError};

/// States of the connection resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    /// No remote cluster configured; a local client satisfies the run
    NoCluster,
    /// Remote configured but no address known yet
    Unresolved,
    /// Address known, untested
    Resolved,
    /// Live connection established
    Connected,
    /// Connection attempt was refused
    Stale,
    /// Terminal failure after the bounded retry
    Failed,
}

impl ResolverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolverState::NoCluster => "no-cluster",
            ResolverState::Unresolved => "unresolved",
            ResolverState::Resolved => "resolved",
            ResolverState::Connected => "connected",
            ResolverState::Stale => "stale",
            ResolverState::Failed => "failed",
        }
    }
}

/// Errors surfaced by resolution
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Fatal configuration mismatch, never retried
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("orchestrator error during resolution: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Non-refusal transport failure; refusals drive the stale path
    /// instead
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// The bounded retry was exhausted
    #[error("scheduler at {address} still unreachable after re-provisioning: {reason}")]
    SchedulerUnreachable { address: String, reason: String },
}

/// Outcome of a successful resolution
#[derive(Debug)]
pub struct ResolvedClient {
    /// Opaque handle work is submitted through
    pub handle: ClientHandle,

    /// Resolved scheduler address, absent for local clients; exposed for
    /// caller-side logging only
    pub address: Option<String>,

    /// Dashboard address when an external host override is in effect
    pub dashboard: Option<String>,

    /// Status snapshot the connection was established against
    pub status: ClusterStatus,

    /// Terminal state the machine stopped in
    pub state: ResolverState,
}

/// The state machine driver
pub struct ConnectionResolver {
    orchestrator: Arc<dyn OrchestratorApi>,
    metadata: Arc<dyn MetadataService>,
    transport: Arc<dyn SchedulerTransport>,
    config: RuntimeConfig,
}

impl ConnectionResolver {
    pub fn new(
        orchestrator: Arc<dyn OrchestratorApi>,
        metadata: Arc<dyn MetadataService>,
        transport: Arc<dyn SchedulerTransport>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            orchestrator,
            metadata,
            transport,
            config,
        }
    }

    /// Exposure mode the cluster effectively runs with; a requested node
    /// port always means NodePort
    fn effective_service_type(spec: &ClusterSpec) -> ServiceType {
        if spec.node_port.is_some() {
            ServiceType::NodePort
        } else {
            spec.service_type
        }
    }

    /// The address to dial for a given status, honoring the external host
    /// override
    fn connect_address(&self, status: &ClusterStatus) -> Result<String, ResolveError> {
        if let Some(host) = &self.config.remote_host {
            let port = status.node_port("scheduler").ok_or_else(|| {
                ResolveError::Configuration(
                    "external host override set but no scheduler node port recorded".to_string(),
                )
            })?;
            return Ok(format!("{}:{}", host, port));
        }

        status
            .scheduler_address
            .clone()
            .ok_or_else(|| {
                ResolveError::Configuration("no scheduler address recorded".to_string())
            })
    }

    /// Dashboard address under an external host override, for logging
    fn dashboard_address(&self, status: &ClusterStatus) -> Option<String> {
        let host = self.config.remote_host.as_ref()?;
        let port = status.node_port("dashboard")?;
        Some(format!("{}:{}", host, port))
    }

    /// Drive the machine to a terminal state
    ///
    /// `reuse` is an existing in-process client the caller may thread in;
    /// it only applies when no remote cluster is configured.
    pub async fn resolve(
        &self,
        spec: &ClusterSpec,
        identity: &FunctionIdentity,
        status: &ClusterStatus,
        reuse: Option<ClientHandle>,
    ) -> Result<ResolvedClient, ResolveError> {
        let mut state = if !spec.is_remote() {
            ResolverState::NoCluster
        } else if status.scheduler_address.is_some() {
            ResolverState::Resolved
        } else {
            ResolverState::Unresolved
        };

        let mut current = status.clone();
        let mut retry_used = false;
        let mut last_failure: Option<(String, String)> = None;

        loop {
            match state {
                ResolverState::NoCluster => {
                    let handle = match reuse {
                        Some(handle) => handle,
                        None => self
                            .transport
                            .local()
                            .await
                            .map_err(ResolveError::Transport)?,
                    };
                    return Ok(ResolvedClient {
                        handle,
                        address: None,
                        dashboard: None,
                        status: current,
                        state: ResolverState::NoCluster,
                    });
                }

                ResolverState::Unresolved => {
                    // recover the address from the persisted record or
                    // deploy a fresh cluster
                    current =
                        match store::load_persisted(self.metadata.as_ref(), identity).await {
                            StatusLookup::Found(persisted) => persisted,
                            StatusLookup::NotFound => self.deploy(spec, identity).await?,
                        };
                    state = ResolverState::Resolved;
                }

                ResolverState::Resolved => {
                    // exposure-mode invariant fails fast, before any
                    // connection attempt
                    if self.config.remote_host.is_some()
                        && Self::effective_service_type(spec) != ServiceType::NodePort
                    {
                        return Err(ResolveError::Configuration(
                            "external host override requires NodePort service exposure"
                                .to_string(),
                        ));
                    }

                    let address = self.connect_address(&current)?;
                    match self.transport.connect(&address).await {
                        Ok(handle) => {
                            return Ok(self.connected(handle, address, current));
                        }
                        Err(e) if e.is_unreachable() && !retry_used => {
                            warn!(
                                "remote scheduler at {} not ready, will try to restart: {}",
                                address, e
                            );
                            state = ResolverState::Stale;
                        }
                        Err(e) if !retry_used => return Err(ResolveError::Transport(e)),
                        Err(e) => {
                            last_failure = Some((address, e.to_string()));
                            state = ResolverState::Failed;
                        }
                    }
                }

                ResolverState::Stale => {
                    // exactly once: liveness comes from the orchestrator
                    // here, not the persisted record
                    let selector = Selector::for_function(identity);
                    let live = store::load_live(
                        self.orchestrator.as_ref(),
                        &selector,
                        &self.config.namespace,
                    )
                    .await?;

                    let observed_running =
                        matches!(&live, StatusLookup::Found(s) if s.is_running());
                    if !observed_running {
                        current = self.deploy(spec, identity).await?;
                    }

                    retry_used = true;
                    state = ResolverState::Resolved;
                }

                ResolverState::Failed => {
                    let (address, reason) = last_failure
                        .take()
                        .unwrap_or_else(|| (String::new(), "unknown".to_string()));
                    return Err(ResolveError::SchedulerUnreachable { address, reason });
                }

                ResolverState::Connected => unreachable!("connected is returned, never looped"),
            }
        }
    }

    async fn deploy(
        &self,
        spec: &ClusterSpec,
        identity: &FunctionIdentity,
    ) -> Result<ClusterStatus, ResolveError> {
        let status = provisioner::deploy(
            self.orchestrator.as_ref(),
            self.metadata.as_ref(),
            &self.config,
            spec,
            identity,
        )
        .await?;
        Ok(status)
    }

    fn connected(
        &self,
        handle: ClientHandle,
        address: String,
        status: ClusterStatus,
    ) -> ResolvedClient {
        info!(
            "using remote dask scheduler ({}) at: {}",
            status.cluster_name.as_deref().unwrap_or("?"),
            address
        );
        let dashboard = self.dashboard_address(&status);
        if let Some(dashboard) = &dashboard {
            info!("remote dashboard (node) port: {}", dashboard);
        }
        ResolvedClient {
            handle,
            address: Some(address),
            dashboard,
            status,
            state: ResolverState::Connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::cluster::status::LifecycleState;
    use crate::metadata::mock::MockMetadataService;
    use crate::metadata::FunctionRecord;
    use crate::orchestrator::mock::{labeled_pod, MockOrchestrator};
    use crate::orchestrator::SCHEDULER_COMPONENT;
    use crate::transport::mock::{Attempt, MockTransport};

    fn identity() -> FunctionIdentity {
        FunctionIdentity::new("trainer", "ml", "v1")
    }

    fn remote_spec() -> ClusterSpec {
        ClusterSpec::new().with_replicas(1)
    }

    fn recorded_status() -> ClusterStatus {
        ClusterStatus {
            state: LifecycleState::Running,
            scheduler_address: Some("tcp://10.0.0.5:8786".to_string()),
            cluster_name: Some("dasklink-trainer-1a2b3c4d".to_string()),
            node_ports: HashMap::new(),
        }
    }

    fn resolver(
        orchestrator: Arc<MockOrchestrator>,
        metadata: Arc<MockMetadataService>,
        transport: Arc<MockTransport>,
        config: RuntimeConfig,
    ) -> ConnectionResolver {
        ConnectionResolver::new(orchestrator, metadata, transport, config)
    }

    fn running_scheduler_pod() -> crate::orchestrator::PodObject {
        let selector = Selector::for_function(&identity());
        let labels: Vec<(String, String)> = selector.to_labels().into_iter().collect();
        let extra: Vec<(&str, &str)> = labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        labeled_pod(
            "sched-1",
            "default",
            crate::orchestrator::PodPhase::Running,
            Some(SCHEDULER_COMPONENT),
            Some("dasklink-trainer-1a2b3c4d"),
            &extra,
        )
    }

    #[tokio::test]
    async fn test_no_cluster_creates_local_client() {
        let transport = Arc::new(MockTransport::always_accept());
        let resolver = resolver(
            Arc::new(MockOrchestrator::new()),
            Arc::new(MockMetadataService::new()),
            transport.clone(),
            RuntimeConfig::default(),
        );

        let resolved = resolver
            .resolve(
                &ClusterSpec::new(),
                &identity(),
                &ClusterStatus::default(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(resolved.state, ResolverState::NoCluster);
        assert!(resolved.handle.is_local());
        assert!(resolved.address.is_none());
        assert_eq!(*transport.local_clients.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_no_cluster_reuses_provided_handle() {
        let transport = Arc::new(MockTransport::always_accept());
        let resolver = resolver(
            Arc::new(MockOrchestrator::new()),
            Arc::new(MockMetadataService::new()),
            transport.clone(),
            RuntimeConfig::default(),
        );

        let existing = ClientHandle::local();
        let resolved = resolver
            .resolve(
                &ClusterSpec::new(),
                &identity(),
                &ClusterStatus::default(),
                Some(existing),
            )
            .await
            .unwrap();

        assert!(resolved.handle.is_local());
        // no fresh client was created
        assert_eq!(*transport.local_clients.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unresolved_without_persisted_record_deploys() {
        let orchestrator = Arc::new(MockOrchestrator::new());
        let transport = Arc::new(MockTransport::always_accept());
        let resolver = resolver(
            orchestrator.clone(),
            Arc::new(MockMetadataService::new()),
            transport,
            RuntimeConfig::default(),
        );

        let resolved = resolver
            .resolve(&remote_spec(), &identity(), &ClusterStatus::default(), None)
            .await
            .unwrap();

        assert_eq!(resolved.state, ResolverState::Connected);
        assert_eq!(orchestrator.create_requests.lock().unwrap().len(), 1);
        assert!(resolved.address.is_some());
    }

    #[tokio::test]
    async fn test_persisted_hit_skips_deploy() {
        let orchestrator = Arc::new(MockOrchestrator::new());
        let record = FunctionRecord::new("trainer", "ml", "v1").with_status(recorded_status());
        let metadata = Arc::new(MockMetadataService::with_record(record));
        let transport = Arc::new(MockTransport::always_accept());
        let resolver = resolver(
            orchestrator.clone(),
            metadata,
            transport,
            RuntimeConfig::default(),
        );

        let resolved = resolver
            .resolve(&remote_spec(), &identity(), &ClusterStatus::default(), None)
            .await
            .unwrap();

        assert_eq!(resolved.state, ResolverState::Connected);
        assert_eq!(resolved.address.as_deref(), Some("tcp://10.0.0.5:8786"));
        assert!(orchestrator.create_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_attempt_success_never_deploys_again() {
        let orchestrator = Arc::new(MockOrchestrator::new());
        let transport = Arc::new(MockTransport::new(vec![Attempt::Accept]));
        let resolver = resolver(
            orchestrator.clone(),
            Arc::new(MockMetadataService::new()),
            transport.clone(),
            RuntimeConfig::default(),
        );

        let resolved = resolver
            .resolve(&remote_spec(), &identity(), &recorded_status(), None)
            .await
            .unwrap();

        assert_eq!(resolved.state, ResolverState::Connected);
        assert!(orchestrator.create_requests.lock().unwrap().is_empty());
        assert_eq!(transport.attempted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refused_with_live_cluster_retries_without_redeploy() {
        let orchestrator = Arc::new(MockOrchestrator::with_pods(vec![running_scheduler_pod()]));
        let transport = Arc::new(MockTransport::new(vec![Attempt::Refuse, Attempt::Accept]));
        let resolver = resolver(
            orchestrator.clone(),
            Arc::new(MockMetadataService::new()),
            transport.clone(),
            RuntimeConfig::default(),
        );

        let resolved = resolver
            .resolve(&remote_spec(), &identity(), &recorded_status(), None)
            .await
            .unwrap();

        assert_eq!(resolved.state, ResolverState::Connected);
        // the live cluster was observed running, so no re-deploy happened
        assert!(orchestrator.create_requests.lock().unwrap().is_empty());
        assert_eq!(transport.attempted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_refused_with_dead_cluster_redeploys_once() {
        let orchestrator = Arc::new(MockOrchestrator::new());
        let transport = Arc::new(MockTransport::new(vec![Attempt::Refuse, Attempt::Accept]));
        let resolver = resolver(
            orchestrator.clone(),
            Arc::new(MockMetadataService::new()),
            transport.clone(),
            RuntimeConfig::default(),
        );

        let resolved = resolver
            .resolve(&remote_spec(), &identity(), &recorded_status(), None)
            .await
            .unwrap();

        assert_eq!(resolved.state, ResolverState::Connected);
        assert_eq!(orchestrator.create_requests.lock().unwrap().len(), 1);

        // the retry dialed the freshly deployed address, not the stale one
        let attempted = transport.attempted.lock().unwrap();
        assert_eq!(attempted.len(), 2);
        assert_eq!(attempted[0], "tcp://10.0.0.5:8786");
        assert_ne!(attempted[1], attempted[0]);
    }

    #[tokio::test]
    async fn test_two_refusals_are_fatal_and_bounded() {
        let orchestrator = Arc::new(MockOrchestrator::new());
        let transport = Arc::new(MockTransport::new(vec![
            Attempt::Refuse,
            Attempt::Refuse,
            // a third outcome exists but must never be consumed
            Attempt::Accept,
        ]));
        let resolver = resolver(
            orchestrator.clone(),
            Arc::new(MockMetadataService::new()),
            transport.clone(),
            RuntimeConfig::default(),
        );

        let result = resolver
            .resolve(&remote_spec(), &identity(), &recorded_status(), None)
            .await;

        assert!(matches!(
            result,
            Err(ResolveError::SchedulerUnreachable { .. })
        ));
        assert_eq!(transport.attempted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_host_override_without_node_port_fails_fast() {
        let transport = Arc::new(MockTransport::always_accept());
        let config = RuntimeConfig {
            remote_host: Some("gateway.example.com".to_string()),
            ..RuntimeConfig::default()
        };
        let resolver = resolver(
            Arc::new(MockOrchestrator::new()),
            Arc::new(MockMetadataService::new()),
            transport.clone(),
            config,
        );

        let result = resolver
            .resolve(&remote_spec(), &identity(), &recorded_status(), None)
            .await;

        assert!(matches!(result, Err(ResolveError::Configuration(_))));
        // the invariant fired before any connection attempt
        assert!(transport.attempted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_host_override_substitutes_node_port_address() {
        let transport = Arc::new(MockTransport::always_accept());
        let config = RuntimeConfig {
            remote_host: Some("gateway.example.com".to_string()),
            ..RuntimeConfig::default()
        };
        let resolver = resolver(
            Arc::new(MockOrchestrator::new()),
            Arc::new(MockMetadataService::new()),
            transport.clone(),
            config,
        );

        let mut status = recorded_status();
        status.node_ports.insert("scheduler".to_string(), 30100);
        status.node_ports.insert("dashboard".to_string(), 30101);
        let spec = ClusterSpec::new().with_replicas(1).with_node_port(30101);

        let resolved = resolver
            .resolve(&spec, &identity(), &status, None)
            .await
            .unwrap();

        assert_eq!(
            resolved.address.as_deref(),
            Some("gateway.example.com:30100")
        );
        assert_eq!(
            resolved.dashboard.as_deref(),
            Some("gateway.example.com:30101")
        );
    }

    #[tokio::test]
    async fn test_non_refusal_transport_error_is_fatal_immediately() {
        let orchestrator = Arc::new(MockOrchestrator::new());
        let transport = Arc::new(MockTransport::new(vec![Attempt::Fail]));
        let resolver = resolver(
            orchestrator.clone(),
            Arc::new(MockMetadataService::new()),
            transport.clone(),
            RuntimeConfig::default(),
        );

        let result = resolver
            .resolve(&remote_spec(), &identity(), &recorded_status(), None)
            .await;

        assert!(matches!(result, Err(ResolveError::Transport(_))));
        // no stale cycle was entered
        assert!(orchestrator.create_requests.lock().unwrap().is_empty());
        assert_eq!(transport.attempted.lock().unwrap().len(), 1);
    }
}
