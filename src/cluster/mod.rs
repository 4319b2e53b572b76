//! # Remote cluster lifecycle management
//!
//! This module is the core of dasklink: given one function's desired
//! cluster configuration, it decides whether a cluster must be
//! (re)deployed, discovers an existing cluster's address, obtains a
//! working client connection with one bounded recovery cycle, and reclaims
//! orchestrator resources when the cluster is done.
//!
//! ## Components
//!
//! - **Selector**: label constraints scoping every orchestrator query and
//!   delete to one logical cluster
//! - **Status store**: persisted and live status lookups feeding the
//!   resolver's decisions
//! - **Provisioner**: turns a [`ClusterSpec`] into running pods/services
//!   and records the resulting address
//! - **Resolver**: the connection state machine with degraded-mode local
//!   fallback
//! - **Reclaimer**: selector-scoped deletion with not-found tolerance
//!
//! ## Control flow
//!
//! ```text
//! run request ──► Resolver ──► Status store ──(miss)──► Provisioner
//!                    │                                      │
//!                    └──(connection refused, once)──────────┘
//! teardown ───► Reclaimer (selector-scoped)
//! ```
//!
//! Everything is a blocking round-trip from the caller's point of view:
//! one caller task, sequential awaits, no background work. Two callers
//! deploying the same identity concurrently may race and produce two
//! clusters; the unique naming scheme and the reclaimer's not-found
//! tolerance keep that race benign rather than preventing it.

pub mod identity;
pub mod lifecycle;
pub mod provisioner;
pub mod reclaimer;
pub mod resolver;
pub mod selector;
pub mod spec;
pub mod status;
pub mod store;

pub use identity::{normalize_name, FunctionIdentity};
pub use lifecycle::RemoteCluster;
pub use provisioner::{deploy, ProvisionError, CLUSTER_NAME_PREFIX, EXTRA_PIP_ENV};
pub use reclaimer::{reclaim, ReclaimError, ReclaimReport};
pub use resolver::{ConnectionResolver, ResolveError, ResolvedClient, ResolverState};
pub use selector::{
    Selector, CLASS_LABEL, CLASS_VALUE, FUNCTION_LABEL, PROJECT_LABEL, TAG_LABEL,
};
pub use spec::{ClusterSpec, SpecError};
pub use status::{ClusterStatus, LifecycleState};
pub use store::{
    list_objects, live_state_string, load_live, load_persisted, ObjectSummary, StatusLookup,
};
