//! Reconciliation error types
//!
//! Every remote failure is funneled into one of four classifications
//! (not-found, permission-denied, transient, fatal) that drive reconciler
//! behavior. Plan-construction failures are caught before any network call
//! and carry their own taxonomy.

use std::time::Duration;
use thiserror::Error;

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Classified outcome of a failed reconciliation step.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The target object does not exist remotely.
    ///
    /// During Read/Update/Delete the caller treats this as "already gone"
    /// and drops the object from tracked state rather than reporting it.
    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    /// The caller's credentials lack the scopes required for the operation.
    #[error("permission denied: {message} (missing scopes: {})", missing_scopes.join(", "))]
    PermissionDenied {
        message: String,
        /// Statically declared scopes the operation requires, threaded in
        /// from the resource schema so the message can name them.
        missing_scopes: Vec<String>,
    },

    /// A temporary condition (throttling, gateway failure, network error,
    /// deadline expiry). The caller may retry; the reconciler never does.
    #[error("transient failure: {message}")]
    Transient {
        message: String,
        /// Retry-After hint parsed from response headers, when present.
        retry_after: Option<Duration>,
    },

    /// An unrecoverable condition. The original diagnostic text is
    /// preserved verbatim for operator debugging.
    #[error("fatal: {message}")]
    Fatal { message: String },

    /// Two remote objects matched the same display name.
    ///
    /// Reserved: by-name resolution currently stops at the first exact
    /// match and never produces this variant.
    #[error("ambiguous match for display name '{display_name}'")]
    AmbiguousMatch { display_name: String },

    /// The plan could not be constructed from the declared object.
    /// Always a client-side error, raised before any network call.
    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl ReconcileError {
    /// Create a fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        ReconcileError::Fatal {
            message: message.into(),
        }
    }

    /// Create a transient error without a retry hint.
    pub fn transient(message: impl Into<String>) -> Self {
        ReconcileError::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a not-found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        ReconcileError::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a transient error for an expired operation deadline.
    pub fn timeout(operation: &str, deadline: Duration) -> Self {
        ReconcileError::Transient {
            message: format!("{operation} aborted after deadline of {deadline:?} expired"),
            retry_after: None,
        }
    }

    /// Check if this error is transient and the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, ReconcileError::Transient { .. })
    }

    /// Check if this error means the object no longer exists remotely.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::NotFound { .. })
    }
}

/// Error constructing a reconciliation plan or wire payload.
///
/// These indicate a programming or configuration error on the client side,
/// never a server-side condition; the reconciler surfaces them as fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// A required field resolved to unset (or explicit-null) at plan time.
    #[error("required field '{field}' is not set")]
    RequiredUnset { field: String },

    /// A field value failed its schema validator.
    #[error("invalid value for field '{field}': {message}")]
    Invalid { field: String, message: String },

    /// An unknown variant cannot be encoded back to the wire; the client
    /// cannot fabricate fields it does not understand.
    #[error("cannot encode unknown {family} variant '{discriminator}'")]
    UnknownVariant {
        family: &'static str,
        discriminator: String,
    },

    /// The caller supplied both or neither of {id, display name} when
    /// exactly one is required.
    #[error("exactly one of id or display name must be supplied, got {supplied}")]
    InvalidTarget { supplied: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ReconcileError::transient("throttled").is_transient());
        assert!(ReconcileError::timeout("read", Duration::from_secs(5)).is_transient());
        assert!(!ReconcileError::fatal("bad body").is_transient());
        assert!(!ReconcileError::not_found("x").is_transient());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(ReconcileError::not_found("policy-1").is_not_found());
        assert!(!ReconcileError::fatal("x").is_not_found());
    }

    #[test]
    fn test_permission_denied_display_names_scopes() {
        let err = ReconcileError::PermissionDenied {
            message: "Authorization_RequestDenied".to_string(),
            missing_scopes: vec![
                "DeviceManagementConfiguration.ReadWrite.All".to_string(),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("DeviceManagementConfiguration.ReadWrite.All"));
    }

    #[test]
    fn test_plan_error_is_fatal_side() {
        let err: ReconcileError = PlanError::RequiredUnset {
            field: "displayName".to_string(),
        }
        .into();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("displayName"));
    }
}
