use thiserror::Error;

use lendloop_core::DomainError;
use lendloop_infra::{DispatchError, ItemProjectionError};

/// Facade-level error: either a domain rule fired, or the pipeline itself
/// failed (storage, serialization, publication).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("pipeline failure: {0}")]
    Pipeline(String),
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Validation(msg) => DomainError::Validation(msg).into(),
            DispatchError::InvalidState(msg) => DomainError::InvalidState(msg).into(),
            DispatchError::SelfReference(msg) => DomainError::SelfReference(msg).into(),
            DispatchError::Forbidden(msg) => DomainError::Forbidden(msg).into(),
            DispatchError::Unauthenticated => DomainError::Unauthenticated.into(),
            DispatchError::NotFound => DomainError::NotFound.into(),
            DispatchError::Concurrency(msg) => DomainError::Conflict(msg).into(),
            DispatchError::StreamIntegrity(msg) => ServiceError::Pipeline(msg),
            DispatchError::Deserialize(msg) => ServiceError::Pipeline(msg),
            DispatchError::Store(err) => ServiceError::Pipeline(err.to_string()),
            DispatchError::Publish(msg) => ServiceError::Pipeline(msg),
        }
    }
}

impl From<ItemProjectionError> for ServiceError {
    fn from(value: ItemProjectionError) -> Self {
        ServiceError::Pipeline(value.to_string())
    }
}

impl ServiceError {
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(err) => Some(err),
            ServiceError::Pipeline(_) => None,
        }
    }
}
