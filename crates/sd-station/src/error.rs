use sd_core::EntityId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StationError {
    #[error("station {0} not found")]
    NotFound(EntityId),

    #[error("station {station} is full ({capacity} slots)")]
    Full { station: EntityId, capacity: u32 },

    #[error("vehicle {vehicle} is not pooled at station {station}")]
    NotPooled { station: EntityId, vehicle: EntityId },
}

pub type StationResult<T> = Result<T, StationError>;
