//! Spatial-subsystem error types.

use thiserror::Error;

use sd_core::NodeId;

/// Errors produced by routing and network construction.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("no route from {from} to {to}")]
    NoRoute { from: NodeId, to: NodeId },

    #[error("node {0} not found in network")]
    NodeNotFound(NodeId),

    #[error("road network has no nodes")]
    EmptyNetwork,
}

pub type SpatialResult<T> = Result<T, SpatialError>;

/// Why a path cost query produced no path.  Reported back through
/// [`PathResult`](crate::PathResult) rather than as an `Err`, because a
/// failed query is an ordinary outcome for the caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathFailure {
    #[error("destination unreachable")]
    NoRoute,
    #[error("no road network")]
    EmptyNetwork,
    #[error("query cancelled")]
    Cancelled,
}

impl From<&SpatialError> for PathFailure {
    fn from(err: &SpatialError) -> Self {
        match err {
            SpatialError::EmptyNetwork => PathFailure::EmptyNetwork,
            SpatialError::NoRoute { .. } | SpatialError::NodeNotFound(_) => PathFailure::NoRoute,
        }
    }
}
