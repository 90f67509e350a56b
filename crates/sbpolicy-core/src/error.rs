// ── Core error types ──
//
// Every compiler in this crate fails with one of these. None of them are
// partially applied: a function either returns the full result or an error.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors ─────────────────────────────────────────────────
    /// A policy document, domain or link was rejected. `details` lists
    /// every individual violation when more than one was collected.
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    #[error("{entity} not found: {identifier}")]
    NotFound { entity: String, identifier: String },

    /// The externally-owned file is missing something this system needs
    /// and will not repair on its own.
    #[error("{message}")]
    Precondition { message: String },

    // ── Serialization ────────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Single-message validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn not_found(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Individual violations behind a validation failure. Empty for every
    /// other variant.
    pub fn details(&self) -> &[String] {
        match self {
            Self::Validation { details, .. } => details,
            _ => &[],
        }
    }
}
