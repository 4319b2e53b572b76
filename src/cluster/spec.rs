//! Cluster specification - the desired configuration of one compute cluster
//!
//! Every recognized option is an explicit field with a documented effect;
//! there is no pass-through bag of unvalidated settings. Builders keep the
//! remote invariant: asking for any replica count means the cluster must
//! run out-of-process.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestrator::{EnvVar, ResourceRequirements, ServiceType, Volume, VolumeMount};

/// Errors for spec validation
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("worker thread count must be at least 1")]
    ZeroThreads,

    #[error("min_replicas ({min}) exceeds max_replicas ({max})")]
    ReplicaBoundsInverted { min: u32, max: u32 },

    #[error("node port must be non-zero")]
    InvalidNodePort,
}

/// Desired configuration of a compute cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Explicitly built container image; falls back to the configured base
    /// image when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Build steps the function requires; a non-empty list without a built
    /// image means the function is not ready to start
    #[serde(rename = "buildCommands")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_commands: Vec<String>,

    /// Script file a named handler is loaded from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Threads per worker process
    #[serde(default = "default_nthreads")]
    pub nthreads: u32,

    /// Extra arguments appended to the worker command
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Environment injected into worker containers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Extra dependency specification injected into the worker environment
    #[serde(rename = "extraPip")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_pip: Option<String>,

    /// Fixed worker count; mutually exclusive with adaptive bounds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,

    /// Lower bound for adaptive scaling
    #[serde(rename = "minReplicas")]
    #[serde(default)]
    pub min_replicas: u32,

    /// Upper bound for adaptive scaling; absent means unbounded
    #[serde(rename = "maxReplicas")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<u32>,

    /// Whether the cluster must run out-of-process; forced by any replica
    /// setting
    #[serde(default)]
    pub remote: bool,

    /// Scheduler service exposure mode
    #[serde(rename = "serviceType")]
    #[serde(default)]
    pub service_type: ServiceType,

    /// Fixed node port for the scheduler; setting one forces NodePort
    /// exposure
    #[serde(rename = "nodePort")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_port: Option<u16>,

    /// Volumes available to worker pods, passed through verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    /// Volume mounts inside the worker container, passed through verbatim
    #[serde(rename = "volumeMounts")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,

    /// Compute resource requests/limits, passed through verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Image pull policy for worker containers
    #[serde(rename = "imagePullPolicy")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Service account worker pods run under
    #[serde(rename = "serviceAccount")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    /// Image pull secret name
    #[serde(rename = "imagePullSecret")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_secret: Option<String>,
}

fn default_nthreads() -> u32 {
    1
}

impl Default for ClusterSpec {
    fn default() -> Self {
        Self {
            image: None,
            build_commands: vec![],
            command: None,
            nthreads: default_nthreads(),
            args: vec![],
            env: vec![],
            extra_pip: None,
            replicas: None,
            min_replicas: 0,
            max_replicas: None,
            remote: false,
            service_type: ServiceType::default(),
            node_port: None,
            volumes: vec![],
            volume_mounts: vec![],
            resources: None,
            image_pull_policy: None,
            service_account: None,
            image_pull_secret: None,
        }
    }
}

impl ClusterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the built container image
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the script file named handlers are loaded from
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Set threads per worker
    pub fn with_nthreads(mut self, nthreads: u32) -> Self {
        self.nthreads = nthreads;
        self
    }

    /// Request a fixed worker count; marks the cluster remote
    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = Some(replicas);
        self.remote = true;
        self
    }

    /// Request adaptive scaling between bounds; marks the cluster remote
    pub fn with_autoscale(mut self, min_replicas: u32, max_replicas: Option<u32>) -> Self {
        self.min_replicas = min_replicas;
        self.max_replicas = max_replicas;
        self.remote = true;
        self
    }

    /// Mark the cluster remote without any replica setting
    pub fn with_remote(mut self) -> Self {
        self.remote = true;
        self
    }

    /// Expose the scheduler on a fixed node port; forces NodePort mode
    pub fn with_node_port(mut self, port: u16) -> Self {
        self.node_port = Some(port);
        self.service_type = ServiceType::NodePort;
        self
    }

    /// Add a worker environment variable
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvVar::new(name, value));
        self
    }

    /// Inject an extra dependency specification into workers
    pub fn with_extra_pip(mut self, requirement: impl Into<String>) -> Self {
        self.extra_pip = Some(requirement.into());
        self
    }

    /// Whether the cluster must run out-of-process
    ///
    /// Any replica setting implies remote even when the flag itself was
    /// never set (e.g. on a deserialized spec).
    pub fn is_remote(&self) -> bool {
        self.remote
            || self.replicas.is_some()
            || self.min_replicas > 0
            || self.max_replicas.is_some()
    }

    /// Construction-time validation of the recognized options
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.nthreads == 0 {
            return Err(SpecError::ZeroThreads);
        }
        if let Some(max) = self.max_replicas {
            if self.min_replicas > max {
                return Err(SpecError::ReplicaBoundsInverted {
                    min: self.min_replicas,
                    max,
                });
            }
        }
        if self.node_port == Some(0) {
            return Err(SpecError::InvalidNodePort);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let spec = ClusterSpec::new();
        assert_eq!(spec.nthreads, 1);
        assert_eq!(spec.min_replicas, 0);
        assert!(spec.max_replicas.is_none());
        assert!(!spec.is_remote());
        assert_eq!(spec.service_type, ServiceType::ClusterIp);
    }

    #[test]
    fn test_replicas_mark_remote() {
        assert!(ClusterSpec::new().with_replicas(3).is_remote());
        assert!(ClusterSpec::new().with_autoscale(1, None).is_remote());
        assert!(ClusterSpec::new().with_autoscale(0, Some(4)).is_remote());
    }

    #[test]
    fn test_deserialized_replicas_mark_remote() {
        // remote flag absent in the document, replicas present
        let spec: ClusterSpec = serde_json::from_str(r#"{"replicas": 2}"#).unwrap();
        assert!(!spec.remote);
        assert!(spec.is_remote());
    }

    #[test]
    fn test_node_port_forces_node_port_mode() {
        let spec = ClusterSpec::new().with_node_port(30100);
        assert_eq!(spec.service_type, ServiceType::NodePort);
        assert_eq!(spec.node_port, Some(30100));
    }

    #[test]
    fn test_validate_thread_count() {
        let spec = ClusterSpec::new().with_nthreads(0);
        assert!(matches!(spec.validate(), Err(SpecError::ZeroThreads)));
    }

    #[test]
    fn test_validate_replica_bounds() {
        let spec = ClusterSpec::new().with_autoscale(5, Some(2));
        assert!(matches!(
            spec.validate(),
            Err(SpecError::ReplicaBoundsInverted { min: 5, max: 2 })
        ));

        // unbounded max never inverts
        let spec = ClusterSpec::new().with_autoscale(5, None);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_serialization_skips_unset_fields() {
        let json = serde_json::to_string(&ClusterSpec::new()).unwrap();
        assert!(!json.contains("image"));
        assert!(!json.contains("nodePort"));
        assert!(json.contains("nthreads"));
    }
}
