//! Fatal pipeline errors and their public classification.
//!
//! Each module owns its fine-grained error enum ([`ParseError`],
//! [`FetchError`](crate::fetcher::FetchError),
//! [`ModelError`](crate::analysis::model::ModelError)); everything converges
//! into [`AnalysisError`] at the pipeline boundary. Ambiguous fiscal
//! extraction is deliberately absent here: it degrades the result instead of
//! failing the request.

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::identifier::ParseError;

/// Coarse classification surfaced to external consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidIdentifier,
    BillNotFound,
    FetchFailed,
    ModelUnavailable,
    AnalysisPending,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidIdentifier => "invalid_identifier",
            ErrorKind::BillNotFound => "bill_not_found",
            ErrorKind::FetchFailed => "fetch_failed",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::AnalysisPending => "analysis_pending",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal error for one analysis request.
///
/// Anything that reaches the caller as this type aborted the pipeline with no
/// partial cache write.
#[derive(Debug, Error, Diagnostic)]
pub enum AnalysisError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidIdentifier(#[from] ParseError),

    #[error("bill {identifier} was not found on the publishing site")]
    #[diagnostic(
        code(billscope::locator::bill_not_found),
        help("Verify the bill number and legislative session.")
    )]
    BillNotFound { identifier: String },

    #[error("failed to retrieve {url}: {message}")]
    #[diagnostic(code(billscope::fetcher::fetch_failed))]
    FetchFailed { url: String, message: String },

    #[error("AI model unavailable: {message}")]
    #[diagnostic(
        code(billscope::analysis::model_unavailable),
        help("The inference endpoint did not produce a completion within the retry budget.")
    )]
    ModelUnavailable { message: String },

    #[error("analysis for {identifier} is still in progress")]
    #[diagnostic(code(billscope::service::analysis_pending))]
    AnalysisPending { identifier: String },

    /// Failure relayed from an in-flight analysis owned by another caller or
    /// a background worker.
    #[error("{message}")]
    #[diagnostic(code(billscope::service::relayed))]
    Relayed { kind: ErrorKind, message: String },
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
            AnalysisError::BillNotFound { .. } => ErrorKind::BillNotFound,
            AnalysisError::FetchFailed { .. } => ErrorKind::FetchFailed,
            AnalysisError::ModelUnavailable { .. } => ErrorKind::ModelUnavailable,
            AnalysisError::AnalysisPending { .. } => ErrorKind::AnalysisPending,
            AnalysisError::Relayed { kind, .. } => *kind,
        }
    }
}

/// Cloneable terminal-failure shape, broadcast to in-flight waiters and kept
/// in failed job records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl AnalysisFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Rehydrate into an [`AnalysisError`] on the receiving side.
    pub fn into_error(self) -> AnalysisError {
        AnalysisError::Relayed {
            kind: self.kind,
            message: self.message,
        }
    }
}

impl From<&AnalysisError> for AnalysisFailure {
    fn from(error: &AnalysisError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for AnalysisFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}
