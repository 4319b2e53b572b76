//! Orchestrator object model - pods, services and cluster requests
//!
//! These types mirror the orchestrator's wire representation of the objects
//! dasklink manages. Pods and services come back from list calls; the pod
//! and service templates go out as part of a cluster creation request.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Label carrying the role of a pod inside a cluster (scheduler or worker)
pub const COMPONENT_LABEL: &str = "dask.org/component";

/// Label carrying the generated cluster name on every pod of a cluster
pub const CLUSTER_NAME_LABEL: &str = "dask.org/cluster-name";

/// Component value identifying a scheduler pod
pub const SCHEDULER_COMPONENT: &str = "scheduler";

/// Default scheduler port exposed by the scheduler service
pub const SCHEDULER_PORT: u16 = 8786;

/// Default dashboard port exposed by the scheduler service
pub const DASHBOARD_PORT: u16 = 8787;

/// Metadata shared by all orchestrator objects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object name, unique within its namespace
    pub name: String,

    /// Namespace the object lives in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Labels for selection
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Phase of a pod as reported by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PodPhase {
    /// Pod accepted but not all containers started
    Pending,
    /// Pod bound to a node with all containers running
    Running,
    /// All containers terminated successfully
    Succeeded,
    /// At least one container terminated in failure
    Failed,
    /// Pod state could not be obtained
    #[default]
    Unknown,
}

impl PodPhase {
    /// Lowercase phase tag, matching the orchestrator's status strings
    pub fn as_str(&self) -> &'static str {
        match self {
            PodPhase::Pending => "pending",
            PodPhase::Running => "running",
            PodPhase::Succeeded => "succeeded",
            PodPhase::Failed => "failed",
            PodPhase::Unknown => "unknown",
        }
    }
}

/// A pod as returned by the orchestrator's list API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodObject {
    /// Object metadata
    pub metadata: ObjectMeta,

    /// Current phase
    #[serde(default)]
    pub phase: PodPhase,
}

impl PodObject {
    /// Role of this pod inside its cluster, from the component label
    pub fn component(&self) -> Option<&str> {
        self.metadata.labels.get(COMPONENT_LABEL).map(|s| s.as_str())
    }

    /// Generated cluster name this pod belongs to
    pub fn cluster_name(&self) -> Option<&str> {
        self.metadata
            .labels
            .get(CLUSTER_NAME_LABEL)
            .map(|s| s.as_str())
    }

    /// Whether this pod is the scheduler of its cluster
    pub fn is_scheduler(&self) -> bool {
        self.component() == Some(SCHEDULER_COMPONENT)
    }
}

/// Service exposure mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ServiceType {
    /// Reachable only inside the orchestrator network
    #[serde(rename = "ClusterIP")]
    #[default]
    ClusterIp,
    /// Bound to a fixed port on every orchestrator node
    NodePort,
}

/// A single port entry of a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePort {
    /// Logical port name (e.g. "scheduler", "dashboard")
    pub name: String,

    /// Cluster-internal port
    pub port: u16,

    /// Allocated node port, present once exposed in NodePort mode
    #[serde(rename = "nodePort")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_port: Option<u16>,
}

/// A service as returned by the orchestrator's list API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceObject {
    /// Object metadata
    pub metadata: ObjectMeta,

    /// Exposure mode
    #[serde(rename = "serviceType")]
    #[serde(default)]
    pub service_type: ServiceType,

    /// Exposed ports
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

/// Environment variable injected into a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A volume attached to a pod; the source is passed through verbatim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Volume name, referenced by mounts
    pub name: String,

    /// Orchestrator-specific volume source, opaque to dasklink
    #[serde(default)]
    pub source: Value,
}

/// Mount point of a named volume inside a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Name of the volume to mount
    pub name: String,

    /// Path inside the container
    #[serde(rename = "mountPath")]
    pub mount_path: String,
}

/// Compute resource requests and limits, passed through verbatim
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Requested resources (e.g. "cpu" -> "500m")
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub requests: HashMap<String, String>,

    /// Resource limits (e.g. "memory" -> "2Gi")
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub limits: HashMap<String, String>,
}

/// A single container of a worker pod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name
    pub name: String,

    /// Container image
    pub image: String,

    /// Command arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Image pull policy (e.g. "IfNotPresent")
    #[serde(rename = "imagePullPolicy")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Volume mounts
    #[serde(rename = "volumeMounts")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,

    /// Resource requests and limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

/// Worker pod template submitted with a cluster creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodTemplate {
    /// Labels stamped on every pod of the cluster
    #[serde(default)]
    pub labels: HashMap<String, String>,

    /// Containers (dasklink always submits exactly one worker container)
    pub containers: Vec<ContainerSpec>,

    /// Restart policy for worker pods
    #[serde(rename = "restartPolicy")]
    #[serde(default = "default_restart_policy")]
    pub restart_policy: String,

    /// Volumes available to the containers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    /// Service account the pods run under
    #[serde(rename = "serviceAccount")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    /// Image pull secret name
    #[serde(rename = "imagePullSecret")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_secret: Option<String>,
}

fn default_restart_policy() -> String {
    "Never".to_string()
}

/// Scheduler service template submitted with a cluster creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTemplate {
    /// Exposure mode
    #[serde(rename = "serviceType")]
    #[serde(default)]
    pub service_type: ServiceType,

    /// Port entries; index 0 is the scheduler port, index 1 the dashboard
    pub ports: Vec<ServicePort>,
}

impl ServiceTemplate {
    /// The standard two-port scheduler service layout
    pub fn default_scheduler() -> Self {
        Self {
            service_type: ServiceType::ClusterIp,
            ports: vec![
                ServicePort {
                    name: "scheduler".to_string(),
                    port: SCHEDULER_PORT,
                    node_port: None,
                },
                ServicePort {
                    name: "dashboard".to_string(),
                    port: DASHBOARD_PORT,
                    node_port: None,
                },
            ],
        }
    }
}

/// Request to create a scheduler/worker cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRequest {
    /// Generated cluster name (prefix + normalized function name + suffix)
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Worker pod template
    #[serde(rename = "podTemplate")]
    pub pod_template: PodTemplate,

    /// Scheduler service template
    #[serde(rename = "serviceTemplate")]
    pub service_template: ServiceTemplate,

    /// How long an idle scheduler is kept before the orchestrator reaps it
    #[serde(rename = "schedulerTimeoutSeconds")]
    pub scheduler_timeout_secs: u64,
}

/// Result of a successful cluster creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterCreated {
    /// Name the orchestrator registered the cluster under
    pub name: String,

    /// Address clients connect to the scheduler at
    #[serde(rename = "schedulerAddress")]
    pub scheduler_address: String,

    /// The scheduler service, with node ports populated in NodePort mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceObject>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_component_labels() {
        let mut labels = HashMap::new();
        labels.insert(COMPONENT_LABEL.to_string(), "scheduler".to_string());
        labels.insert(CLUSTER_NAME_LABEL.to_string(), "dasklink-f-abc".to_string());

        let pod = PodObject {
            metadata: ObjectMeta {
                name: "dasklink-f-abc-scheduler".to_string(),
                namespace: "default".to_string(),
                labels,
            },
            phase: PodPhase::Running,
        };

        assert!(pod.is_scheduler());
        assert_eq!(pod.cluster_name(), Some("dasklink-f-abc"));
    }

    #[test]
    fn test_pod_without_labels() {
        let pod = PodObject {
            metadata: ObjectMeta {
                name: "stray".to_string(),
                namespace: "default".to_string(),
                labels: HashMap::new(),
            },
            phase: PodPhase::Pending,
        };

        assert!(!pod.is_scheduler());
        assert_eq!(pod.cluster_name(), None);
    }

    #[test]
    fn test_phase_as_str() {
        assert_eq!(PodPhase::Running.as_str(), "running");
        assert_eq!(PodPhase::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_default_scheduler_service_ports() {
        let svc = ServiceTemplate::default_scheduler();
        assert_eq!(svc.service_type, ServiceType::ClusterIp);
        assert_eq!(svc.ports[0].name, "scheduler");
        assert_eq!(svc.ports[0].port, SCHEDULER_PORT);
        assert_eq!(svc.ports[1].name, "dashboard");
        assert_eq!(svc.ports[1].port, DASHBOARD_PORT);
    }

    #[test]
    fn test_service_type_wire_names() {
        let json = serde_json::to_string(&ServiceType::ClusterIp).unwrap();
        assert_eq!(json, "\"ClusterIP\"");
        let json = serde_json::to_string(&ServiceType::NodePort).unwrap();
        assert_eq!(json, "\"NodePort\"");
    }

    #[test]
    fn test_cluster_request_serialization() {
        let request = ClusterRequest {
            name: "dasklink-trainer-1a2b3c4d".to_string(),
            namespace: "default".to_string(),
            pod_template: PodTemplate {
                labels: HashMap::new(),
                containers: vec![ContainerSpec {
                    name: "base".to_string(),
                    image: "daskdev/dask:latest".to_string(),
                    args: vec!["dask-worker".to_string()],
                    env: vec![],
                    image_pull_policy: None,
                    volume_mounts: vec![],
                    resources: None,
                }],
                restart_policy: default_restart_policy(),
                volumes: vec![],
                service_account: None,
                image_pull_secret: None,
            },
            service_template: ServiceTemplate::default_scheduler(),
            scheduler_timeout_secs: 3600,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("podTemplate"));
        assert!(json.contains("restartPolicy"));
        assert!(json.contains("schedulerTimeoutSeconds"));
        assert!(json.contains("dask-worker"));
    }
}
