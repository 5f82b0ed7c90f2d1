//! CRUD reconciler
//!
//! Orchestrates create/read/update/delete for one resource kind against the
//! remote service. Each invocation is a single synchronous state machine:
//! plan, send, decode, classify. The reconciler performs no implicit
//! retries (retry policy belongs to the caller) and every operation runs
//! under a caller-supplied deadline; on expiry the in-flight call is
//! abandoned and a transient timeout reported, never stale state.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument};

use crate::classify::{classify_failure, classify_response};
use crate::diff::{plan_create, plan_update};
use crate::error::{ReconcileError, ReconcileResult};
use crate::object::{DeclaredObject, RemoteObject};
use crate::resolver::{self, TargetRef};
use crate::schema::ResourceSchema;
use crate::transport::{Transport, WireRequest, WireResponse};

/// Result of a read (or post-update re-read).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The object exists remotely; both representations are returned and
    /// the remote snapshot replaces any prior one wholesale.
    Found {
        remote: RemoteObject,
        declared: DeclaredObject,
    },
    /// The object no longer exists remotely. The caller drops it from
    /// tracked state; this is not an error to report to the user.
    Gone,
}

impl Outcome {
    /// The remote snapshot, if the object was found.
    pub fn remote(&self) -> Option<&RemoteObject> {
        match self {
            Outcome::Found { remote, .. } => Some(remote),
            Outcome::Gone => None,
        }
    }

    /// The mapped declared form, if the object was found.
    pub fn declared(&self) -> Option<&DeclaredObject> {
        match self {
            Outcome::Found { declared, .. } => Some(declared),
            Outcome::Gone => None,
        }
    }
}

/// Reconciles one resource kind over a transport.
///
/// Concurrent reconciliations of different resource instances are
/// independent; serializing concurrent operations on the same id is the
/// orchestrating caller's responsibility.
pub struct Reconciler<T> {
    transport: T,
    schema: ResourceSchema,
}

impl<T: Transport> Reconciler<T> {
    /// Bind a transport to a resource schema.
    pub fn new(transport: T, schema: ResourceSchema) -> Self {
        Self { transport, schema }
    }

    /// The bound schema.
    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    /// Create the declared object remotely.
    ///
    /// On success the server-issued id is bound into `desired` and the
    /// echoed document is returned as the initial remote snapshot.
    #[instrument(skip(self, desired), fields(resource_type = %self.schema.resource_type))]
    pub async fn create(
        &self,
        desired: &mut DeclaredObject,
        deadline: Duration,
    ) -> ReconcileResult<RemoteObject> {
        let expires = Instant::now() + deadline;
        let plan = plan_create(&self.schema, desired)?;
        let request = WireRequest::post(self.schema.collection_path.clone(), plan.into_body());

        let response = self.send_by("create", deadline, expires, request).await?;
        if !response.is_success() {
            let err = classify_response(&response, "<new object>", self.schema.scopes_for(true));
            // A missing prerequisite (e.g. a referenced group id) answers
            // 404 on create; that is a misconfigured reference, not a
            // drop-from-state condition.
            return Err(match err {
                ReconcileError::NotFound { resource } => ReconcileError::fatal(format!(
                    "create failed: referenced prerequisite not found ({resource}): {}",
                    response.body
                )),
                other => other,
            });
        }

        let body = response
            .parse_json()
            .map_err(|e| ReconcileError::fatal(format!("malformed create response: {e}")))?;
        let remote = RemoteObject::from_value(body)?;
        let id = remote
            .id()
            .ok_or_else(|| ReconcileError::fatal("create response carried no id"))?;
        desired.bind_id(id);

        info!(id, "created");
        Ok(remote)
    }

    /// Read the current remote state of a target.
    #[instrument(skip(self), fields(resource_type = %self.schema.resource_type))]
    pub async fn read(&self, target: &TargetRef, deadline: Duration) -> ReconcileResult<Outcome> {
        self.read_by(target, deadline, Instant::now() + deadline).await
    }

    /// Read against an already-running deadline, so multi-phase operations
    /// spend one budget across all their requests.
    async fn read_by(
        &self,
        target: &TargetRef,
        deadline: Duration,
        expires: Instant,
    ) -> ReconcileResult<Outcome> {
        let resolved = self
            .by(
                "read",
                deadline,
                expires,
                resolver::resolve(&self.transport, &self.schema, target),
            )
            .await?;
        match resolved {
            Ok(remote) => {
                let declared = DeclaredObject::from_remote(&self.schema, &remote);
                Ok(Outcome::Found { remote, declared })
            }
            Err(err) if err.is_not_found() => {
                info!(target = %target.describe(), "object gone remotely");
                Ok(Outcome::Gone)
            }
            Err(err) => Err(err),
        }
    }

    /// Converge the remote object toward the declared state.
    ///
    /// The minimal patch is computed against the last-known snapshot; after
    /// a successful send the object is re-read for the authoritative
    /// post-update state, because the service may echo only a subset of
    /// fields on the patch response.
    #[instrument(skip(self, remote, desired), fields(resource_type = %self.schema.resource_type))]
    pub async fn update(
        &self,
        remote: &RemoteObject,
        desired: &DeclaredObject,
        deadline: Duration,
    ) -> ReconcileResult<Outcome> {
        let expires = Instant::now() + deadline;
        let id = remote
            .id()
            .ok_or_else(|| ReconcileError::fatal("update requires a remote snapshot with an id"))?
            .to_string();

        let plan = plan_update(&self.schema, remote, desired)?;
        if plan.is_empty() {
            info!(id, "already converged");
            return self.read_by(&TargetRef::by_id(&id), deadline, expires).await;
        }

        let request = WireRequest::patch(self.schema.object_path(&id), plan.into_body());
        let response = self.send_by("update", deadline, expires, request).await?;
        if !response.is_success() {
            let err = classify_response(&response, &id, self.schema.scopes_for(true));
            if err.is_not_found() {
                info!(id, "object vanished during update");
                return Ok(Outcome::Gone);
            }
            return Err(err);
        }

        // The re-read spends whatever is left of the same budget.
        info!(id, "patched, re-reading");
        self.read_by(&TargetRef::by_id(&id), deadline, expires).await
    }

    /// Delete the object. Not-found is success: the desired end state
    /// (object absent) already holds.
    #[instrument(skip(self), fields(resource_type = %self.schema.resource_type))]
    pub async fn delete(&self, id: &str, deadline: Duration) -> ReconcileResult<()> {
        let expires = Instant::now() + deadline;
        let request = WireRequest::delete(self.schema.object_path(id));
        let response = self.send_by("delete", deadline, expires, request).await?;
        if !response.is_success() {
            let err = classify_response(&response, id, self.schema.scopes_for(true));
            if err.is_not_found() {
                info!(id, "already deleted");
                return Ok(());
            }
            return Err(err);
        }
        info!(id, "deleted");
        Ok(())
    }

    async fn send_by(
        &self,
        operation: &str,
        deadline: Duration,
        expires: Instant,
        request: WireRequest,
    ) -> ReconcileResult<WireResponse> {
        self.by(operation, deadline, expires, self.transport.send(request))
            .await?
            .map_err(classify_failure)
    }

    /// Run a future against the operation's absolute expiry. `deadline` is
    /// the original caller-supplied budget, carried for the diagnostic.
    async fn by<F: Future>(
        &self,
        operation: &str,
        deadline: Duration,
        expires: Instant,
        fut: F,
    ) -> ReconcileResult<F::Output> {
        tokio::time::timeout_at(expires, fut)
            .await
            .map_err(|_| ReconcileError::timeout(operation, deadline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optional::FieldValue;
    use crate::schema::FieldSpec;
    use crate::transport::memory::InMemoryService;
    use crate::transport::TransportFailure;
    use async_trait::async_trait;
    use serde_json::json;

    const DEADLINE: Duration = Duration::from_secs(5);

    fn schema() -> ResourceSchema {
        ResourceSchema::new(
            "deviceManagementAssignmentFilter",
            "/deviceManagement/assignmentFilters",
        )
        .with_field(FieldSpec::computed("id"))
        .with_field(FieldSpec::required("displayName"))
        .with_field(FieldSpec::required("platform"))
        .with_field(FieldSpec::required("rule"))
        .with_field(FieldSpec::optional("description"))
        .with_field(FieldSpec::optional("roleScopeTags").as_collection())
        .with_read_scopes(["DeviceManagementConfiguration.Read.All"])
        .with_write_scopes(["DeviceManagementConfiguration.ReadWrite.All"])
    }

    fn minimal_declared() -> DeclaredObject {
        DeclaredObject::new()
            .with("displayName", "Filter1")
            .with("platform", "windows10AndLater")
            .with("rule", "(device.manufacturer -eq \"Dell\")")
    }

    fn reconciler() -> Reconciler<InMemoryService> {
        Reconciler::new(InMemoryService::new(), schema())
    }

    #[tokio::test]
    async fn test_create_binds_server_id() {
        let reconciler = reconciler();
        let mut desired = minimal_declared();

        let remote = reconciler.create(&mut desired, DEADLINE).await.unwrap();
        assert!(desired.id().is_some());
        assert_eq!(desired.id(), remote.id());
        assert_eq!(remote.get("displayName"), Some(&json!("Filter1")));
    }

    #[tokio::test]
    async fn test_read_after_create_round_trips() {
        let reconciler = reconciler();
        let mut desired = minimal_declared();
        reconciler.create(&mut desired, DEADLINE).await.unwrap();

        let outcome = reconciler
            .read(&TargetRef::by_id(desired.id().unwrap()), DEADLINE)
            .await
            .unwrap();
        let declared = outcome.declared().unwrap();
        assert_eq!(declared.get("displayName"), &FieldValue::set("Filter1"));
        assert!(declared.get("description").is_unset());
    }

    #[tokio::test]
    async fn test_read_by_name() {
        let reconciler = reconciler();
        let mut desired = minimal_declared();
        reconciler.create(&mut desired, DEADLINE).await.unwrap();

        let outcome = reconciler
            .read(&TargetRef::by_name("Filter1"), DEADLINE)
            .await
            .unwrap();
        assert_eq!(outcome.remote().unwrap().id(), desired.id());
    }

    #[tokio::test]
    async fn test_read_missing_is_gone_not_error() {
        let reconciler = reconciler();
        let outcome = reconciler
            .read(
                &TargetRef::by_id(uuid::Uuid::new_v4().to_string()),
                DEADLINE,
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Gone);
    }

    #[tokio::test]
    async fn test_update_removal_round_trip() {
        // Scenario: remote has description "old"; declared clears it.
        let reconciler = reconciler();
        let mut desired = minimal_declared().with("description", "old");
        let remote = reconciler.create(&mut desired, DEADLINE).await.unwrap();
        assert_eq!(remote.get("description"), Some(&json!("old")));

        let cleared = minimal_declared().with_null("description");
        let outcome = reconciler.update(&remote, &cleared, DEADLINE).await.unwrap();

        // After re-read the mapped declared form has description unset.
        let declared = outcome.declared().unwrap();
        assert!(declared.get("description").is_unset());
        assert!(outcome.remote().unwrap().get("description").is_none());
    }

    #[tokio::test]
    async fn test_update_converged_skips_patch() {
        let reconciler = reconciler();
        let mut desired = minimal_declared();
        let remote = reconciler.create(&mut desired, DEADLINE).await.unwrap();

        let outcome = reconciler
            .update(&remote, &minimal_declared(), DEADLINE)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Found { .. }));
    }

    #[tokio::test]
    async fn test_update_vanished_object_is_gone() {
        let reconciler = reconciler();
        let mut desired = minimal_declared();
        let remote = reconciler.create(&mut desired, DEADLINE).await.unwrap();
        let id = remote.id().unwrap().to_string();
        reconciler.delete(&id, DEADLINE).await.unwrap();

        let changed = minimal_declared().with("description", "new");
        let outcome = reconciler.update(&remote, &changed, DEADLINE).await.unwrap();
        assert_eq!(outcome, Outcome::Gone);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let reconciler = reconciler();
        let mut desired = minimal_declared();
        let remote = reconciler.create(&mut desired, DEADLINE).await.unwrap();
        let id = remote.id().unwrap().to_string();

        reconciler.delete(&id, DEADLINE).await.unwrap();
        // Second delete observes not-found, classified as success.
        reconciler.delete(&id, DEADLINE).await.unwrap();
    }

    #[tokio::test]
    async fn test_plan_error_surfaces_before_network() {
        let reconciler = reconciler();
        let mut incomplete = DeclaredObject::new().with("displayName", "x");
        let err = reconciler.create(&mut incomplete, DEADLINE).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Plan(_)));
    }

    /// Transport that never completes, for deadline tests.
    struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn send(&self, _request: WireRequest) -> Result<WireResponse, TransportFailure> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry_reports_transient_timeout() {
        let reconciler = Reconciler::new(StalledTransport, schema());
        let err = reconciler
            .delete("some-id", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("deadline"));
    }

    /// Transport that answers correctly but slowly.
    struct SlowTransport {
        inner: InMemoryService,
        delay: Duration,
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportFailure> {
            tokio::time::sleep(self.delay).await;
            self.inner.send(request).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_deadline_spans_patch_and_reread() {
        // Each request takes 60ms; the 100ms budget covers the PATCH but
        // must expire during the re-read rather than being granted afresh
        // to each phase.
        let service = InMemoryService::new();
        let mut doc = serde_json::Map::new();
        doc.insert("displayName".to_string(), json!("Filter1"));
        doc.insert("platform".to_string(), json!("windows10AndLater"));
        doc.insert("rule".to_string(), json!("(device.manufacturer -eq \"Dell\")"));
        let id = service
            .seed("/deviceManagement/assignmentFilters", doc)
            .await;

        let reconciler = Reconciler::new(
            SlowTransport {
                inner: service,
                delay: Duration::from_millis(60),
            },
            schema(),
        );

        let remote = RemoteObject::from_value(json!({
            "id": id,
            "displayName": "Filter1",
            "platform": "windows10AndLater",
            "rule": "(device.manufacturer -eq \"Dell\")"
        }))
        .unwrap();
        let desired = minimal_declared().with("description", "new");

        let started = tokio::time::Instant::now();
        let err = reconciler
            .update(&remote, &desired, Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("deadline"));
        // The operation as a whole stopped at the budget, not at 2x it.
        assert_eq!(started.elapsed(), Duration::from_millis(100));
    }
}
