//! Cluster status store - persisted and live status lookups
//!
//! Two read paths feed the connection resolver: the metadata service holds
//! the status recorded at deploy time, and the orchestrator's live objects
//! answer whether a cluster is actually running right now. Both paths are
//! read-only and safe to call speculatively.

use std::collections::HashMap;

use tracing::{debug, info};

use super::identity::FunctionIdentity;
use super::selector::Selector;
use super::status::{ClusterStatus, LifecycleState};
use crate::metadata::MetadataService;
use crate::orchestrator::{
    OrchestratorApi, OrchestratorError, PodPhase, SCHEDULER_COMPONENT, COMPONENT_LABEL,
};

/// Outcome of a status lookup: either a usable status or expected absence
#[derive(Debug, Clone)]
pub enum StatusLookup {
    Found(ClusterStatus),
    NotFound,
}

impl StatusLookup {
    pub fn is_found(&self) -> bool {
        matches!(self, StatusLookup::Found(_))
    }

    /// The status when found
    pub fn into_status(self) -> Option<ClusterStatus> {
        match self {
            StatusLookup::Found(status) => Some(status),
            StatusLookup::NotFound => None,
        }
    }
}

/// Summary of one orchestrator object owned by a cluster
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub name: String,
    pub phase: String,
    pub labels: HashMap<String, String>,
}

/// Load the status recorded for this identity in the metadata service
///
/// Status absence is a normal outcome, not a fault: a missing record, a
/// record without a scheduler address, and a metadata transport failure all
/// degrade to `NotFound`.
pub async fn load_persisted(
    metadata: &dyn MetadataService,
    identity: &FunctionIdentity,
) -> StatusLookup {
    let record = match metadata
        .get_function(&identity.name, &identity.project, &identity.tag)
        .await
    {
        Ok(record) => record,
        Err(e) => {
            debug!("persisted status lookup for {} failed: {}", identity, e);
            return StatusLookup::NotFound;
        }
    };

    match record.and_then(|r| r.status) {
        Some(status) if status.scheduler_address.is_some() => StatusLookup::Found(status),
        _ => StatusLookup::NotFound,
    }
}

/// Query the orchestrator for a live, running cluster behind this selector
///
/// A scheduler pod in running phase with a discoverable cluster-name label
/// yields a status whose scheduler address is unknown at this layer; it is
/// purely a liveness signal. Orchestrator faults are real errors here,
/// unlike the persisted path.
pub async fn load_live(
    orchestrator: &dyn OrchestratorApi,
    selector: &Selector,
    namespace: &str,
) -> Result<StatusLookup, OrchestratorError> {
    let scheduler_selector = selector
        .clone()
        .with_constraint(COMPONENT_LABEL, SCHEDULER_COMPONENT);
    let pods = orchestrator.list_pods(namespace, &scheduler_selector).await?;

    for pod in &pods {
        if pod.phase == PodPhase::Running {
            let cluster = pod.cluster_name().map(|s| s.to_string());
            info!(
                "found running cluster scheduler {} (cluster={})",
                pod.metadata.name,
                cluster.as_deref().unwrap_or("?")
            );
            return Ok(StatusLookup::Found(ClusterStatus {
                state: LifecycleState::Running,
                scheduler_address: None,
                cluster_name: cluster,
                node_ports: HashMap::new(),
            }));
        }
        debug!(
            "scheduler pod {} in non-ready state ({})",
            pod.metadata.name,
            pod.phase.as_str()
        );
    }

    Ok(StatusLookup::NotFound)
}

/// The live lifecycle state as a plain string
///
/// Running short-circuits; otherwise the last observed scheduler phase is
/// reported, and an empty string means nothing was observed at all.
pub async fn live_state_string(
    orchestrator: &dyn OrchestratorApi,
    selector: &Selector,
    namespace: &str,
) -> Result<String, OrchestratorError> {
    let scheduler_selector = selector
        .clone()
        .with_constraint(COMPONENT_LABEL, SCHEDULER_COMPONENT);
    let pods = orchestrator.list_pods(namespace, &scheduler_selector).await?;

    let mut state = String::new();
    for pod in &pods {
        state = pod.phase.as_str().to_string();
        if pod.phase == PodPhase::Running {
            break;
        }
    }
    Ok(state)
}

/// List the pods owned by a cluster as (name, phase, labels) summaries
pub async fn list_objects(
    orchestrator: &dyn OrchestratorApi,
    selector: &Selector,
    namespace: &str,
) -> Result<Vec<ObjectSummary>, OrchestratorError> {
    let pods = orchestrator.list_pods(namespace, selector).await?;
    Ok(pods
        .into_iter()
        .map(|pod| ObjectSummary {
            name: pod.metadata.name,
            phase: pod.phase.as_str().to_string(),
            labels: pod.metadata.labels,
        })
        .collect())
}
