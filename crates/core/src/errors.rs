use thiserror::Error;

use crate::domain::order::{OrderId, OrderStatus};
use crate::domain::proposal::{ProposalId, ProposalStatus};

/// Invariant and state-machine violations inside the domain types.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid order transition from {from:?} to {to:?}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },
    #[error("proposal {proposal_id:?} is already {status:?} and cannot be re-resolved")]
    ProposalAlreadyResolved { proposal_id: ProposalId, status: ProposalStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failures at the extraction oracle boundary. Both are non-fatal to the
/// pipeline: intent falls back to NEW_ORDER and diffing to an empty set.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("extraction oracle unavailable: {0}")]
    Unavailable(String),
    #[error("extraction oracle returned an unparseable payload: {0}")]
    Parse(String),
}

/// Failures at a storage port.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("storage decode error: {0}")]
    Decode(String),
}

/// Pipeline-level failures. Scoped to one delivery-date group unless they
/// occur before grouping (snapshot load, idempotency check).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("order {order_id:?} bound by intent classification no longer exists")]
    OrderNotFound { order_id: OrderId },
}

/// Failures while resolving a proposal. `Domain` carries
/// `ProposalAlreadyResolved`; no mutation has occurred when it is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("proposal {0:?} not found")]
    ProposalNotFound(ProposalId),
    #[error("order {0:?} not found")]
    OrderNotFound(OrderId),
    #[error("change proposal {0:?} has no bound order")]
    MissingBoundOrder(ProposalId),
    #[error("invalid review submission: {0}")]
    InvalidSubmission(String),
}
