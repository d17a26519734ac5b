//! Error types for the trellis device model

use thiserror::Error;

use crate::{ElementType, MessageCode};

/// Structural errors raised by element graph operations
///
/// All are synchronous and recoverable: a failed operation leaves the tree
/// in its prior consistent state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    // Edge invariants
    #[error("element already has a parent")]
    AlreadyHasParent,

    #[error("edge would make an element reachable from itself")]
    CircularReference,

    #[error("identifier already used among siblings: {0}")]
    DuplicateIdentifier(String),

    #[error("element is not a child of the source")]
    NotAChild,

    #[error("no link edge to the given element")]
    LinkNotFound,

    #[error("an element cannot reference itself")]
    SelfReference,

    // Handles and element state
    #[error("unknown or discarded element handle")]
    UnknownElement,

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("element is still attached to the tree")]
    StillAttached,

    #[error("expected a {expected} element, found {actual}")]
    KindMismatch {
        expected: ElementType,
        actual: ElementType,
    },
}

/// Result type for element graph operations
pub type TreeResult<T> = Result<T, TreeError>;

/// Classified failure returned by a service delegate
///
/// Dispatch performs no type inspection: a `Failure` carries its own wire
/// code into the response, anything else becomes an internal error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Intentional failure with a response code and optional hint
    #[error("{message}")]
    Failure {
        code: MessageCode,
        message: String,
        hint: Option<String>,
    },

    /// Unclassified failure; only its message is reported
    #[error("{0}")]
    Fault(String),
}

impl ServiceError {
    pub fn failure(code: MessageCode, message: impl Into<String>) -> Self {
        ServiceError::Failure {
            code,
            message: message.into(),
            hint: None,
        }
    }

    pub fn fault(message: impl Into<String>) -> Self {
        ServiceError::Fault(message.into())
    }

    /// Attach a human hint; no effect on faults
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        match self {
            ServiceError::Failure { code, message, .. } => ServiceError::Failure {
                code,
                message,
                hint: Some(hint.into()),
            },
            other => other,
        }
    }

    /// Response code this failure maps to
    pub fn code(&self) -> MessageCode {
        match self {
            ServiceError::Failure { code, .. } => *code,
            ServiceError::Fault(_) => MessageCode::InternalError,
        }
    }
}

/// Result type for service invocations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by event dispatch
///
/// Request dispatch never returns these; it folds every failure into a
/// response message instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("no element at address {0:?}")]
    NotFound(String),

    #[error("element at {0:?} is not a service")]
    NotAService(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;
