//! Error classifier
//!
//! Inspects a failed transport exchange and classifies it into the four
//! outcomes that drive reconciler behavior: not-found (drop from state),
//! permission-denied (surface with a missing-scope hint), transient (caller
//! may retry), or fatal (preserve the diagnostic verbatim).

use serde::Deserialize;
use tracing::debug;

use crate::error::ReconcileError;
use crate::transport::{TransportFailure, WireResponse};

/// OData-style error envelope returned by the remote service.
#[derive(Debug, Deserialize)]
pub struct ODataError {
    pub error: ODataErrorBody,
}

/// OData error body.
#[derive(Debug, Deserialize)]
pub struct ODataErrorBody {
    pub code: String,
    pub message: String,
}

/// Error codes the service uses when the caller lacks a required scope.
const PERMISSION_CODES: &[&str] = &["Authorization_RequestDenied", "Forbidden", "AccessDenied"];

/// Classify a non-success response.
///
/// `resource` names the object for not-found diagnostics; `required_scopes`
/// is the static per-resource scope list for the attempted operation, so a
/// bare 403 can say which scope is missing.
pub fn classify_response(
    response: &WireResponse,
    resource: &str,
    required_scopes: &[String],
) -> ReconcileError {
    debug_assert!(!response.is_success());

    let odata = serde_json::from_str::<ODataError>(&response.body).ok();
    let code = odata.as_ref().map(|e| e.error.code.as_str()).unwrap_or("");
    let message = odata
        .as_ref()
        .map(|e| e.error.message.clone())
        .unwrap_or_else(|| response.body.clone());

    let classified = match response.status {
        404 => ReconcileError::not_found(resource),
        403 => ReconcileError::PermissionDenied {
            message,
            missing_scopes: required_scopes.to_vec(),
        },
        _ if PERMISSION_CODES.contains(&code) => ReconcileError::PermissionDenied {
            message,
            missing_scopes: required_scopes.to_vec(),
        },
        429 => ReconcileError::Transient {
            message: format!("throttled: {message}"),
            retry_after: response.retry_after,
        },
        status if status >= 500 => ReconcileError::Transient {
            message: format!("server error {status}: {message}"),
            retry_after: response.retry_after,
        },
        status => ReconcileError::fatal(format!(
            // The raw body is preserved verbatim for operator debugging.
            "unexpected status {status}: {}",
            response.body
        )),
    };

    debug!(status = response.status, %resource, "classified failure");
    classified
}

/// Classify a network-level failure. Always transient: the request never
/// reached a status code and may succeed on a later attempt.
pub fn classify_failure(failure: TransportFailure) -> ReconcileError {
    ReconcileError::transient(failure.to_string())
}
