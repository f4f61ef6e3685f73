//! Flow dispatch and polling error types

use std::time::Duration;
use thiserror::Error;

/// Errors raised while dispatching or running a flow
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Resource {resource_id} has flows under operation, request not allowed.")]
    AdmissionRejected { resource_id: String },

    #[error(
        "Flow for resource {resource_id} was not accepted within {}s, request not allowed.",
        .timeout.as_secs_f64()
    )]
    AcceptanceTimeout {
        resource_id: String,
        timeout: Duration,
    },

    #[error("Flow dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("No flow handler registered for selector {0}")]
    HandlerNotFound(String),

    #[error("Flow for resource {0} was cancelled")]
    Cancelled(String),

    #[error("Flow step failed: {0}")]
    StepFailed(String),

    #[error(transparent)]
    Poll(#[from] PollError),
}

impl FlowError {
    /// Whether the caller was refused because of another active flow or a slow runtime
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            FlowError::AdmissionRejected { .. } | FlowError::AcceptanceTimeout { .. }
        )
    }
}

/// Terminal failures of a reconciliation poll
#[derive(Error, Debug)]
pub enum PollError {
    #[error("Polling timed out after {attempts} attempts ({elapsed:?})")]
    Timeout { attempts: u32, elapsed: Duration },

    #[error("Polling stopped: {0}")]
    Break(String),

    #[error("Polling aborted after {attempts} attempts: {source}")]
    Aborted {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, FlowError>;
