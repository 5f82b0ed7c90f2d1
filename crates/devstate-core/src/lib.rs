//! # devstate-core
//!
//! Generic reconciliation and polymorphic-mapping engine for declarative
//! management of remote directory/device-management resources.
//!
//! The engine converges a caller-owned desired state ([`DeclaredObject`])
//! toward the remote state ([`RemoteObject`]) of a resource instance over a
//! partial-update (PATCH) wire protocol:
//!
//! - [`optional`] - tri-state optional codec (unset / explicit-null / set)
//! - [`variant`] - tagged-union codec for mutually exclusive sub-object
//!   shapes (assignment targets, run schedules, scope filters)
//! - [`diff`] - minimal-mutation planner with field-removal semantics
//! - [`reconciler`] - create/read/update/delete orchestration under
//!   caller-supplied deadlines
//! - [`classify`] - transport-failure classification (not-found /
//!   permission-denied / transient / fatal)
//! - [`resolver`] - by-id and paged by-name target resolution
//!
//! The remote service is reached only through the narrow [`Transport`]
//! contract; [`transport::memory::InMemoryService`] is an explicit
//! in-memory implementation for tests.
//!
//! ## Example
//!
//! ```ignore
//! use devstate_core::prelude::*;
//!
//! let schema = ResourceSchema::new("assignmentFilter", "/deviceManagement/assignmentFilters")
//!     .with_field(FieldSpec::computed("id"))
//!     .with_field(FieldSpec::required("displayName"))
//!     .with_field(FieldSpec::optional("description"))
//!     .with_write_scopes(["DeviceManagementConfiguration.ReadWrite.All"]);
//!
//! let reconciler = Reconciler::new(transport, schema);
//!
//! let mut desired = DeclaredObject::new().with("displayName", "Filter1");
//! let remote = reconciler.create(&mut desired, deadline).await?;
//!
//! // Clear the description on the next apply:
//! let desired = desired.with_null("description");
//! let outcome = reconciler.update(&remote, &desired, deadline).await?;
//! ```

pub mod classify;
pub mod diff;
pub mod error;
pub mod object;
pub mod optional;
pub mod reconciler;
pub mod resolver;
pub mod schema;
pub mod transport;
pub mod variant;

/// Prelude module for convenient imports.
///
/// ```
/// use devstate_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::classify::{classify_failure, classify_response};
    pub use crate::diff::{plan_create, plan_update, ReconciliationPlan};
    pub use crate::error::{PlanError, ReconcileError, ReconcileResult};
    pub use crate::object::{DeclaredObject, RemoteObject};
    pub use crate::optional::{FieldValue, WireEntry};
    pub use crate::reconciler::{Outcome, Reconciler};
    pub use crate::resolver::TargetRef;
    pub use crate::schema::{FieldKind, FieldSpec, ResourceSchema, Validator};
    pub use crate::transport::{
        Method, Transport, TransportFailure, WireRequest, WireResponse,
    };
    pub use crate::variant::{
        AssignmentTarget, RunSchedule, ScopeFilter, TargetKind, VariantFamily,
    };
}

pub use error::{ReconcileError, ReconcileResult};
pub use object::{DeclaredObject, RemoteObject};
pub use transport::Transport;

// Re-export async_trait for transport implementors
pub use async_trait::async_trait;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        // Verify the prelude types are accessible
        let _declared = DeclaredObject::new().with("displayName", "x");
        let _target = TargetRef::by_name("x");
        let _field = FieldValue::Unset;
        let _spec = FieldSpec::optional("description");
        let _err = ReconcileError::transient("throttled");
    }
}
