//! # dasklink
//!
//! Remote Dask cluster lifecycle management for a run-execution framework.
//!
//! Given a logical function definition, dasklink provisions a scheduler/
//! worker cluster in a container orchestrator, tracks its lifecycle and
//! network address, routes a client connection to it with degraded-mode
//! local fallback, and tears the underlying compute resources down when
//! the work is done.
//!
//! The crate is a library surface consumed by a run-execution layer; it
//! introduces no wire protocol or CLI of its own. The orchestrator, the
//! metadata service and the scheduler transport are consumed behind trait
//! seams so the lifecycle logic stays testable without live
//! infrastructure.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dasklink::cluster::{ClusterSpec, FunctionIdentity, RemoteCluster};
//! use dasklink::config::RuntimeConfig;
//! use dasklink::metadata::HttpMetadataService;
//! use dasklink::orchestrator::HttpOrchestrator;
//! use dasklink::transport::TcpSchedulerTransport;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = ClusterSpec::new().with_autoscale(2, None);
//! let mut cluster = RemoteCluster::new(
//!     spec,
//!     FunctionIdentity::new("trainer", "ml", "latest"),
//!     Arc::new(HttpOrchestrator::new("http://orchestrator:6443", None)),
//!     Arc::new(HttpMetadataService::new("http://metadata:8080")),
//!     Arc::new(TcpSchedulerTransport::default()),
//!     RuntimeConfig::from_env(),
//! );
//!
//! let resolved = cluster.get_client(None).await?;
//! // ... submit work through resolved.handle ...
//! cluster.reclaim(true).await?;
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod config;
pub mod metadata;
pub mod orchestrator;
pub mod transport;

pub use cluster::{
    ClusterSpec, ClusterStatus, FunctionIdentity, LifecycleState, RemoteCluster, ResolveError,
    ResolvedClient, ResolverState, Selector,
};
pub use config::RuntimeConfig;
pub use transport::ClientHandle;
