//! Error types for the simulation engine

use thiserror::Error;

use crate::{ContainerId, HostId};

/// Simulation result type
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Which index space an invalid reference pointed into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Host,
    Container,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Host => write!(f, "host"),
            ReferenceKind::Container => write!(f, "container"),
        }
    }
}

/// Errors that can occur while driving a simulation
#[derive(Error, Debug)]
pub enum SimulationError {
    /// Unknown host or container index passed to a query or commit
    #[error("Invalid reference: no {kind} with index {index}")]
    InvalidReference { kind: ReferenceKind, index: usize },

    /// A decision entry would break the hard disk invariant on its target.
    /// Recorded against the dropped entry; never aborts a step.
    #[error("Capacity exceeded: container {container} needs {need} {resource} on host {host}, {have} available")]
    CapacityExceeded {
        container: ContainerId,
        host: HostId,
        resource: &'static str,
        need: f64,
        have: f64,
    },

    /// A scheduler policy returned a malformed selection or decision
    #[error("Policy contract violation: {0}")]
    PolicyContractViolation(String),

    /// Malformed workload or host specification
    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimulationError {
    /// Unknown host index
    pub fn unknown_host(index: HostId) -> Self {
        Self::InvalidReference {
            kind: ReferenceKind::Host,
            index,
        }
    }

    /// Unknown (or vacant) container slot
    pub fn unknown_container(index: ContainerId) -> Self {
        Self::InvalidReference {
            kind: ReferenceKind::Container,
            index,
        }
    }

    /// Create a policy contract violation
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::PolicyContractViolation(msg.into())
    }

    /// Create an invalid spec error
    pub fn spec(msg: impl Into<String>) -> Self {
        Self::InvalidSpec(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error aborts the current step.
    ///
    /// Only `CapacityExceeded` is soft: the offending entry is dropped and
    /// the commit pass continues.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CapacityExceeded { .. })
    }
}
