//! Setup-time errors.
//!
//! Nothing on the per-tick path returns these; only configuration loading,
//! group registration and spawning can fail.

use thiserror::Error;

use crate::swarm::groups::GroupId;

/// Errors raised while configuring or populating a simulation.
#[derive(Debug, Error)]
pub enum FlockError {
    /// A flock settings field holds a value the simulation cannot run with.
    #[error("invalid flock settings: `{field}` {reason}")]
    InvalidSettings {
        field: &'static str,
        reason: &'static str,
    },

    /// The containment box is malformed.
    #[error("invalid bounds: {0}")]
    InvalidBounds(&'static str),

    /// Simulation-wide configuration is malformed.
    #[error("invalid simulation config: {0}")]
    InvalidConfig(&'static str),

    /// An agent was assigned to a group that was never registered.
    #[error("unknown flock group {0:?}")]
    UnknownGroup(GroupId),

    #[error("failed to parse simulation config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read simulation config: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FlockError>;
