//! Resource reclaimer - deleting a cluster's orchestrator objects
//!
//! Default mode is lazy garbage collection: only pods that are no longer
//! running are removed. Force mode is explicit teardown. Services are kept
//! in lockstep with their scheduler: outside force mode a service goes away
//! only when its owning scheduler pod was deleted in the same pass.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info};

use super::selector::Selector;
use crate::orchestrator::{OrchestratorApi, OrchestratorError, PodPhase};

/// Errors surfaced by reclaim
#[derive(Error, Debug)]
pub enum ReclaimError {
    #[error("failed to list {kind} for reclaim: {source}")]
    List {
        kind: &'static str,
        source: OrchestratorError,
    },

    #[error("failed to delete {kind} '{name}' in namespace '{namespace}': {source}")]
    Delete {
        kind: &'static str,
        name: String,
        namespace: String,
        source: OrchestratorError,
    },
}

/// What a reclaim pass removed
#[derive(Debug, Clone, Default)]
pub struct ReclaimReport {
    pub deleted_pods: Vec<String>,
    pub deleted_services: Vec<String>,
}

/// Delete the orchestrator objects behind a selector
///
/// `force_all` removes everything; otherwise only pods outside the running
/// phase are collected. Already-gone objects count as deleted (concurrent
/// cleanups race benignly); any other delete failure aborts the pass with
/// the first such error.
pub async fn reclaim(
    orchestrator: &dyn OrchestratorApi,
    selector: &Selector,
    force_all: bool,
    namespace: &str,
) -> Result<ReclaimReport, ReclaimError> {
    let mut report = ReclaimReport::default();

    let pods = orchestrator
        .list_pods(namespace, selector)
        .await
        .map_err(|source| ReclaimError::List {
            kind: "pods",
            source,
        })?;

    let mut reclaimed_schedulers: HashSet<String> = HashSet::new();

    for pod in &pods {
        if !force_all && pod.phase == PodPhase::Running {
            continue;
        }

        if pod.is_scheduler() {
            if let Some(cluster) = pod.cluster_name() {
                reclaimed_schedulers.insert(cluster.to_string());
            }
        }

        match orchestrator.delete_pod(namespace, &pod.metadata.name).await {
            Ok(()) => {
                info!("deleted pod {}", pod.metadata.name);
                report.deleted_pods.push(pod.metadata.name.clone());
            }
            Err(e) if e.is_not_found() => {
                debug!("pod {} already removed", pod.metadata.name);
            }
            Err(source) => {
                return Err(ReclaimError::Delete {
                    kind: "pod",
                    name: pod.metadata.name.clone(),
                    namespace: namespace.to_string(),
                    source,
                });
            }
        }
    }

    let services = orchestrator
        .list_services(namespace, selector)
        .await
        .map_err(|source| ReclaimError::List {
            kind: "services",
            source,
        })?;

    for service in &services {
        if !force_all && !reclaimed_schedulers.contains(&service.metadata.name) {
            continue;
        }

        match orchestrator
            .delete_service(namespace, &service.metadata.name)
            .await
        {
            Ok(()) => {
                info!("deleted service {}", service.metadata.name);
                report.deleted_services.push(service.metadata.name.clone());
            }
            Err(e) if e.is_not_found() => {
                debug!("service {} already removed", service.metadata.name);
            }
            Err(source) => {
                return Err(ReclaimError::Delete {
                    kind: "service",
                    name: service.metadata.name.clone(),
                    namespace: namespace.to_string(),
                    source,
                });
            }
        }
    }

    Ok(report)
}
