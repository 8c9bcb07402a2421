use thiserror::Error;

use crate::calendar::Commitment;
use crate::domain::EntityKind;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("cannot {action} {entity} while it is `{status}`")]
    InvalidState { entity: EntityKind, status: &'static str, action: &'static str },
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(i32),
    #[error("{entity} cannot be reviewed until it is `{required}`")]
    NotEligible { entity: EntityKind, required: &'static str },
    #[error("{entity} has already been reviewed by this client")]
    AlreadyReviewed { entity: EntityKind },
    #[error("order has already been delivered")]
    AlreadyDelivered,
    #[error("requested slot overlaps {} existing commitment(s)", conflicts.len())]
    SlotUnavailable { conflicts: Vec<Commitment> },
    #[error("validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("{role} `{actor}` may not act on {entity} `{id}`")]
    Unauthorized { entity: EntityKind, id: String, role: &'static str, actor: String },
    #[error("{entity} write failed after the primary change; nothing was applied: {message}")]
    DependentWriteFailed { entity: EntityKind, message: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check the submitted values and try again."
            }
            Self::Forbidden { .. } => "You are not a party to this booking or order.",
            Self::NotFound { .. } => "The booking, order or quote no longer exists.",
            Self::Conflict { .. } => {
                "This action is no longer possible in the current state. Refresh and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The change could not be saved and nothing was applied. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(
                DomainError::InvalidRating(_)
                | DomainError::Validation(_)
                | DomainError::NotEligible { .. },
            ) => Self::BadRequest { message, correlation_id },
            ApplicationError::Domain(
                DomainError::InvalidState { .. }
                | DomainError::AlreadyReviewed { .. }
                | DomainError::AlreadyDelivered
                | DomainError::SlotUnavailable { .. },
            ) => Self::Conflict { message, correlation_id },
            ApplicationError::NotFound { .. } => Self::NotFound { message, correlation_id },
            ApplicationError::Unauthorized { .. } => Self::Forbidden { message, correlation_id },
            ApplicationError::DependentWriteFailed { .. } | ApplicationError::Persistence(_) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(_) => Self::Internal { message, correlation_id },
        }
    }
}
