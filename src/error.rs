//! Structured error types for the estimation core.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Caller supplied something the engine cannot work with
    InvalidInput,
    DimensionMismatch,
    InvalidArithmetic,

    // Recoverable model failures
    ClusteringFailed,
    RegressionFailed,

    // Not found errors
    OwnerNotFound,
    TaskNotFound,

    // Conflict errors
    AlreadyExists,

    // Internal errors
    DatabaseError,
    InternalError,
}

/// Errors raised by the prediction engine.
///
/// `Clustering` and `Regression` are recovered inside the pipeline with a
/// documented fallback. The other variants always reach the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("dimension mismatch: {left} != {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("clustering failed: {0}")]
    Clustering(String),

    #[error("regression failed: {0}")]
    Regression(String),

    #[error("{resource} has invalid {field} of {value}")]
    InvalidArithmetic {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
}

impl EstimateError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Zero expected duration on a task about to be folded into a ratio.
    pub fn zero_expected_duration() -> Self {
        Self::InvalidArithmetic {
            resource: "Task",
            field: "expected_duration",
            value: "0".to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            Self::Clustering(_) => ErrorCode::ClusteringFailed,
            Self::Regression(_) => ErrorCode::RegressionFailed,
            Self::InvalidArithmetic { .. } => ErrorCode::InvalidArithmetic,
        }
    }

    /// Whether the pipeline is allowed to swallow this error with a fallback.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Clustering(_) | Self::Regression(_))
    }
}

/// Result type for core estimation operations.
pub type EstimateResult<T> = std::result::Result<T, EstimateError>;

/// Structured error for CLI responses.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl CliError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn owner_not_found(owner: &str) -> Self {
        Self::new(
            ErrorCode::OwnerNotFound,
            format!("Owner not found: {}", owner),
        )
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn already_exists(what: &str, name: &str) -> Self {
        Self::new(
            ErrorCode::AlreadyExists,
            format!("{} already exists: {}", what, name),
        )
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<EstimateError> for CliError {
    fn from(err: EstimateError) -> Self {
        let cli_err = Self::new(err.code(), err.to_string());
        match err {
            EstimateError::InvalidArithmetic { field, .. } => cli_err.with_field(field),
            _ => cli_err,
        }
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<CliError>() {
            Ok(cli_err) => return cli_err,
            Err(err) => err,
        };
        let err = match err.downcast::<EstimateError>() {
            Ok(est_err) => return est_err.into(),
            Err(err) => err,
        };
        match err.downcast::<rusqlite::Error>() {
            Ok(db_err) => CliError::database(db_err),
            Err(err) => CliError::internal(err),
        }
    }
}
