//! Error types for alembic.
//!
//! All errors are strongly typed using thiserror so callers can match on the
//! specific condition. The kernel never swallows an error raised by a
//! condition or an action: it is propagated as-is to whoever drives the
//! simulation.

use thiserror::Error;

use crate::node::NodeId;
use crate::reaction::ReactionId;

/// Validation errors that occur when building kernel values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Time value {value} is not a valid simulation time")]
    InvalidTime {
        value: f64,
    },

    #[error("Rate {value} must be finite and non-negative")]
    InvalidRate {
        value: f64,
    },

    #[error("Period {value} must be finite and strictly positive")]
    InvalidPeriod {
        value: f64,
    },

    #[error("Molecule name cannot be empty")]
    EmptyMoleculeName,

    #[error("Concentration {value} of '{molecule}' must be finite and non-negative")]
    InvalidConcentration {
        molecule: String,
        value: f64,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Execution errors that occur while scheduling or running reactions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("Node not found: {id}")]
    NodeNotFound {
        id: NodeId,
    },

    #[error("Reaction not found: {id}")]
    ReactionNotFound {
        id: ReactionId,
    },

    #[error("Reaction {id} is already scheduled")]
    DuplicateReaction {
        id: ReactionId,
    },

    #[error("Reaction {id} is scheduled at {tau}, before the current time {now}")]
    TimeWentBackwards {
        id: ReactionId,
        now: f64,
        tau: f64,
    },

    #[error("Condition failed: {reason}")]
    ConditionFailed {
        reason: String,
    },

    #[error("Action failed: {reason}")]
    ActionFailed {
        reason: String,
    },

    #[error("Batch queue is full (capacity: {capacity})")]
    QueueFull {
        capacity: usize,
    },

    #[error("Batch worker pool disconnected")]
    Disconnected,
}

/// Top-level error type for alembic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl KernelError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Shorthand for a failed condition evaluation.
    #[must_use]
    pub fn condition_failed(reason: impl Into<String>) -> Self {
        Self::Execution(ExecutionError::ConditionFailed {
            reason: reason.into(),
        })
    }

    /// Shorthand for a failed action.
    #[must_use]
    pub fn action_failed(reason: impl Into<String>) -> Self {
        Self::Execution(ExecutionError::ActionFailed {
            reason: reason.into(),
        })
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
