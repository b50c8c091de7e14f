use std::fmt;

use sf_catalog::{AccessDenied, OrderError, TransitionError, ValidationError};
use sf_schemas::SupplierApprovalStatus;

use crate::ports::StoreError;

/// Every way a workflow operation can be refused or fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Input refused before anything was persisted.
    Validation(ValidationError),
    /// Caller lacks the capability the operation is gated on.
    AccessDenied(AccessDenied),
    /// Supplier capability present but the profile is not approved.
    SupplierNotApproved {
        status: Option<SupplierApprovalStatus>,
    },
    /// Lifecycle action not legal from the product's current status.
    Transition(TransitionError),
    Order(OrderError),
    Store(StoreError),
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowError::Validation(e) => write!(f, "{e}"),
            WorkflowError::AccessDenied(e) => write!(f, "{e}"),
            WorkflowError::SupplierNotApproved { status: Some(s) } => {
                write!(f, "supplier account is {}", s.as_str())
            }
            WorkflowError::SupplierNotApproved { status: None } => {
                write!(f, "supplier profile missing")
            }
            WorkflowError::Transition(e) => write!(f, "{e}"),
            WorkflowError::Order(e) => write!(f, "{e}"),
            WorkflowError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<ValidationError> for WorkflowError {
    fn from(e: ValidationError) -> Self {
        WorkflowError::Validation(e)
    }
}

impl From<AccessDenied> for WorkflowError {
    fn from(e: AccessDenied) -> Self {
        WorkflowError::AccessDenied(e)
    }
}

impl From<TransitionError> for WorkflowError {
    fn from(e: TransitionError) -> Self {
        WorkflowError::Transition(e)
    }
}

impl From<OrderError> for WorkflowError {
    fn from(e: OrderError) -> Self {
        WorkflowError::Order(e)
    }
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        WorkflowError::Store(e)
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
