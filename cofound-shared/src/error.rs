/// Service error taxonomy
///
/// Every operation in `services` returns `ServiceResult<T>`. The variants map
/// one-to-one onto the failures a caller has to distinguish:
///
/// - `Unauthorized`: no valid session where one is required
/// - `Forbidden`: a session exists but does not own the resource
/// - `NotFound`: a referenced tag, startup, user or request does not exist
/// - `InvalidState`: a precondition of the workflow is violated
/// - `Validation`: malformed input
/// - `Upstream`: the database failed
/// - `Email`: the email boundary failed
///
/// # Example
///
/// ```
/// use cofound_shared::error::ServiceError;
///
/// let err = ServiceError::invalid_state("already a participant");
/// assert_eq!(err.to_string(), "Invalid state: already a participant");
/// assert!(!err.is_upstream());
/// ```

use crate::email::EmailError;

/// Result alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error type for service operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Missing or invalid session
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed to act on the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Referenced row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Workflow precondition violated
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed input
    #[error("Validation failed on {field}: {message}")]
    Validation { field: String, message: String },

    /// Persistence failure
    #[error("Database error: {0}")]
    Upstream(#[from] sqlx::Error),

    /// Email delivery failure
    #[error("Email delivery failed: {0}")]
    Email(#[from] EmailError),
}

impl ServiceError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        ServiceError::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        ServiceError::InvalidState(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Forbidden(msg.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for failures of an external collaborator rather than of the caller
    pub fn is_upstream(&self) -> bool {
        matches!(self, ServiceError::Upstream(_) | ServiceError::Email(_))
    }
}

/// Returns the name of the violated unique constraint, if `err` is one
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Some(db_err.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}
