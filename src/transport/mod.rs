//! Cluster client transport - connecting to a scheduler by address
//!
//! The scheduler protocol itself belongs to the compute framework; this
//! layer only establishes reachability and hands back an opaque routing
//! token the run-execution layer submits work through. A refused connection
//! is a distinguishable condition because the resolver's staleness handling
//! hinges on it.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Errors surfaced when establishing a client connection
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("scheduler at {address} is unreachable: {reason}")]
    Unreachable { address: String, reason: String },

    #[error("transport I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Whether the failure was a connection-level refusal
    pub fn is_unreachable(&self) -> bool {
        matches!(self, TransportError::Unreachable { .. })
    }
}

/// Where a client handle routes work to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientKind {
    Remote,
    Local,
}

/// Opaque handle to a scheduler connection
///
/// Callers never inspect the handle; they thread it into the run-execution
/// layer which submits work through it. Its lifetime is the run's lifetime
/// and it is never persisted.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    kind: ClientKind,
    address: Option<String>,
}

impl ClientHandle {
    /// Handle routing to a remote scheduler address
    pub fn remote(address: impl Into<String>) -> Self {
        Self {
            kind: ClientKind::Remote,
            address: Some(address.into()),
        }
    }

    /// Handle routing to an in-process client
    pub fn local() -> Self {
        Self {
            kind: ClientKind::Local,
            address: None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.kind == ClientKind::Local
    }

    /// The scheduler address this handle routes to, absent for local
    /// clients
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Release the connection
    pub fn close(self) {
        if let Some(address) = &self.address {
            debug!("closing client handle for {}", address);
        }
    }
}

/// Connection establishment seam
#[async_trait]
pub trait SchedulerTransport: Send + Sync {
    /// Connect to a scheduler by address; `Unreachable` when the address
    /// refuses the connection
    async fn connect(&self, address: &str) -> Result<ClientHandle, TransportError>;

    /// Create a fresh in-process client
    async fn local(&self) -> Result<ClientHandle, TransportError>;
}

/// Transport that probes the scheduler with a TCP dial
pub struct TcpSchedulerTransport {
    connect_timeout: Duration,
}

impl TcpSchedulerTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Strip a `tcp://` style scheme so the address can be dialed
    fn dial_target(address: &str) -> &str {
        address
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(address)
    }
}

impl Default for TcpSchedulerTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl SchedulerTransport for TcpSchedulerTransport {
    async fn connect(&self, address: &str) -> Result<ClientHandle, TransportError> {
        let target = Self::dial_target(address);

        let dial = tokio::net::TcpStream::connect(target);
        let stream = tokio::time::timeout(self.connect_timeout, dial)
            .await
            .map_err(|_| TransportError::Unreachable {
                address: address.to_string(),
                reason: "connect timed out".to_string(),
            })?;

        match stream {
            Ok(_) => {
                debug!("scheduler at {} is reachable", address);
                Ok(ClientHandle::remote(address))
            }
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                Err(TransportError::Unreachable {
                    address: address.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }

    async fn local(&self) -> Result<ClientHandle, TransportError> {
        Ok(ClientHandle::local())
    }
}

// ============================================================================
// Mock implementation for testing (no I/O)
// ============================================================================
