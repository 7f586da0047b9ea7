use sd_core::{CoreError, EntityId};
use sd_request::RequestError;
use sd_station::StationError;
use sd_vehicle::VehicleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("request error: {0}")]
    Request(#[from] RequestError),

    #[error("vehicle error: {0}")]
    Vehicle(#[from] VehicleError),

    #[error("station error: {0}")]
    Station(#[from] StationError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("target {0} not found")]
    UnknownTarget(EntityId),

    #[error("snapshot version {found} is newer than supported version {supported}")]
    SnapshotVersion { found: u32, supported: u32 },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
