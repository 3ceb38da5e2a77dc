//! Error types and result alias for the telemetry pipeline.
//!
//! The taxonomy deliberately has three branches with different handling:
//! - [`PipelineError::Validation`] – bad input, surfaced synchronously with
//!   per-field detail, never retried
//! - [`PipelineError::NotFound`] – a reading or device vanished before the
//!   asynchronous stage ran; terminal, logged, not re-enqueued
//! - [`PipelineError::Transient`] – the queue or an external collaborator was
//!   unavailable; retried with backoff in the asynchronous stage

use std::fmt;

use serde::Serialize;

/// The result type used throughout the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;

// ---

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// The full set of validation failures for one reading.
///
/// Validation collects every violation instead of stopping at the first, so
/// API clients see the complete list in one response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Convert into `Ok(())` when no violation was recorded.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ---

/// Errors that can occur in pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The reading violated a data-model invariant. Never retried.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// A record needed by the asynchronous stage no longer exists. Terminal.
    #[error("{resource} not found: {id}")]
    NotFound {
        resource: &'static str,
        id: String,
    },

    /// A dependency was temporarily unavailable. Retryable with backoff.
    #[error("transient failure: {message}")]
    Transient { message: String },
}

impl PipelineError {
    // ---
    pub fn not_found(resource: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Whether the worker pool should re-attempt the failed task.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
