//! List/page resolver
//!
//! Resolves one target object either by direct id lookup or by scanning the
//! paginated collection for an exact display-name match. Callers that have
//! no id yet (imports, lookups by human-readable name) go through here
//! before any CRUD operation.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::classify::{classify_failure, classify_response};
use crate::error::{PlanError, ReconcileError, ReconcileResult};
use crate::object::RemoteObject;
use crate::schema::ResourceSchema;
use crate::transport::{Transport, WireRequest};

/// How the caller identifies the object to resolve.
///
/// Exactly one of id or display name must be supplied; anything else is a
/// configuration error caught before a network call is issued.
#[derive(Debug, Clone, Default)]
pub struct TargetRef {
    id: Option<String>,
    display_name: Option<String>,
}

impl TargetRef {
    /// Reference by server-assigned id.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            display_name: None,
        }
    }

    /// Reference by display name (resolved via a collection scan).
    pub fn by_name(display_name: impl Into<String>) -> Self {
        Self {
            id: None,
            display_name: Some(display_name.into()),
        }
    }

    /// The id, if this is an id reference.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The display name, if this is a name reference.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// A short description for diagnostics.
    pub fn describe(&self) -> String {
        match (&self.id, &self.display_name) {
            (Some(id), _) => id.clone(),
            (None, Some(name)) => format!("displayName={name}"),
            (None, None) => "<empty target>".to_string(),
        }
    }

    fn validate(&self) -> Result<(), PlanError> {
        match (&self.id, &self.display_name) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err(PlanError::InvalidTarget { supplied: "both" }),
            (None, None) => Err(PlanError::InvalidTarget { supplied: "neither" }),
        }
    }
}

/// One page of a collection listing.
#[derive(Debug, Deserialize)]
struct ListPage {
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Resolve a target to its current remote document.
#[instrument(skip(transport, schema), fields(resource_type = %schema.resource_type))]
pub async fn resolve<T: Transport>(
    transport: &T,
    schema: &ResourceSchema,
    target: &TargetRef,
) -> ReconcileResult<RemoteObject> {
    target.validate()?;
    match (target.id(), target.display_name()) {
        (Some(id), _) => resolve_by_id(transport, schema, id).await,
        (None, Some(name)) => resolve_by_name(transport, schema, name).await,
        (None, None) => unreachable!("validated above"),
    }
}

/// Direct lookup by server-assigned id.
pub async fn resolve_by_id<T: Transport>(
    transport: &T,
    schema: &ResourceSchema,
    id: &str,
) -> ReconcileResult<RemoteObject> {
    let response = transport
        .send(WireRequest::get(schema.object_path(id)))
        .await
        .map_err(classify_failure)?;
    if !response.is_success() {
        return Err(classify_response(&response, id, schema.scopes_for(false)));
    }
    let body = response
        .parse_json()
        .map_err(|e| ReconcileError::fatal(format!("malformed object body: {e}")))?;
    RemoteObject::from_value(body)
}

/// Scan the paginated collection for an exact display-name match.
///
/// Pages through the entire collection via `@odata.nextLink` rather than
/// assuming a single page, and stops at the first exact match. When two
/// remote objects share a display name the result depends on page order;
/// multi-match detection is not implemented (first match wins).
pub async fn resolve_by_name<T: Transport>(
    transport: &T,
    schema: &ResourceSchema,
    display_name: &str,
) -> ReconcileResult<RemoteObject> {
    let mut path = schema.collection_path.clone();
    loop {
        let response = transport
            .send(WireRequest::get(path))
            .await
            .map_err(classify_failure)?;
        if !response.is_success() {
            return Err(classify_response(
                &response,
                display_name,
                schema.scopes_for(false),
            ));
        }
        let page: ListPage = serde_json::from_str(&response.body)
            .map_err(|e| ReconcileError::fatal(format!("malformed list page: {e}")))?;

        debug!(objects = page.value.len(), "scanning page");
        for doc in page.value {
            let matches = doc
                .get(&schema.display_name_field)
                .and_then(Value::as_str)
                .is_some_and(|name| name == display_name);
            if matches {
                return RemoteObject::from_value(doc);
            }
        }

        match page.next_link {
            Some(next) => path = next,
            None => {
                return Err(ReconcileError::not_found(format!(
                    "{} with displayName '{display_name}'",
                    schema.resource_type
                )))
            }
        }
    }
}
