use sd_core::{EntityId, RequestKind};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum VehicleError {
    #[error("vehicle {0} not found")]
    NotFound(EntityId),

    #[error("vehicle {0} is disabled")]
    Disabled(EntityId),

    #[error("vehicle {0} has no service capacity left")]
    Empty(EntityId),

    #[error("vehicle {vehicle} does not serve {kind}")]
    WrongKind { vehicle: EntityId, kind: RequestKind },

    #[error("vehicle {vehicle} already holds {load} request(s)")]
    AtCapacity { vehicle: EntityId, load: usize },
}

pub type VehicleResult<T> = Result<T, VehicleError>;
