use thiserror::Error;

use sd_core::{EntityId, RequestId};

#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("request {0} not found")]
    NotFound(RequestId),

    #[error("request {request} already bound to {bound_to}, cannot bind {candidate}")]
    AlreadyBound { request: RequestId, bound_to: EntityId, candidate: EntityId },

    #[error("target {0} not found")]
    UnknownTarget(EntityId),
}

pub type RequestResult<T> = Result<T, RequestError>;
