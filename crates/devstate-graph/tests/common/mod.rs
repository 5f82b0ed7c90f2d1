//! Common test utilities for devstate-graph integration tests.

use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::MockServer;

use devstate_core::prelude::*;
use devstate_graph::{GraphConfig, GraphTransport, StaticToken};

/// Schema for the assignment-filter resource used across the suite.
pub fn filter_schema() -> ResourceSchema {
    ResourceSchema::new(
        "deviceManagementAssignmentFilter",
        "/deviceManagement/assignmentFilters",
    )
    .with_field(FieldSpec::computed("id"))
    .with_field(FieldSpec::required("displayName"))
    .with_field(
        FieldSpec::required("platform").with_validator(Validator::one_of([
            "windows10AndLater",
            "macOS",
            "iOS",
            "android",
        ])),
    )
    .with_field(FieldSpec::required("rule"))
    .with_field(FieldSpec::optional("description"))
    .with_field(FieldSpec::optional("roleScopeTags").as_collection())
    .with_read_scopes(["DeviceManagementConfiguration.Read.All"])
    .with_write_scopes(["DeviceManagementConfiguration.ReadWrite.All"])
}

/// A declared filter with only the required fields set.
pub fn minimal_filter() -> DeclaredObject {
    DeclaredObject::new()
        .with("displayName", "Filter1")
        .with("platform", "windows10AndLater")
        .with("rule", "(device.manufacturer -eq \"Dell\")")
}

/// Server-side filter document factory.
pub fn filter_doc(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "displayName": name,
        "platform": "windows10AndLater",
        "rule": "(device.manufacturer -eq \"Dell\")"
    })
}

/// Wraps items in an OData list response, optionally with a next link.
pub fn odata_page(items: Vec<Value>, next_link: Option<&str>) -> Value {
    let mut response = json!({ "value": items });
    if let Some(link) = next_link {
        response["@odata.nextLink"] = json!(link);
    }
    response
}

/// Creates an OData error response body.
pub fn odata_error(code: &str, message: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message
        }
    })
}

/// Builds a reconciler over a transport pointed at the mock server.
pub fn reconciler_for(server: &MockServer) -> Reconciler<GraphTransport> {
    let config = GraphConfig::builder()
        .endpoint(server.uri())
        .max_retries(2)
        .build()
        .expect("valid test config");
    let transport = GraphTransport::new(config, Arc::new(StaticToken::new("test-token")))
        .expect("transport construction");
    Reconciler::new(transport, filter_schema())
}
