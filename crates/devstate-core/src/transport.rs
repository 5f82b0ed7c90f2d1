//! Transport contract
//!
//! The engine depends on a single narrow capability: send one wire request,
//! get back a status/body pair or a network-level failure. Authentication,
//! connection pooling, and transport-level retry policy live behind this
//! seam, not in the engine.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// HTTP-style method for a wire request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Patch => write!(f, "PATCH"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// One request against the remote service.
///
/// `path` is service-relative and may carry a query string; paging
/// next-links come back as ready-to-follow paths.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl WireRequest {
    /// Build a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    /// Build a POST request.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Build a PATCH request.
    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Build a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// One response from the remote service.
#[derive(Debug, Clone)]
pub struct WireResponse {
    /// HTTP-equivalent status code.
    pub status: u16,
    /// Retry-After hint, when the service sent one.
    pub retry_after: Option<Duration>,
    /// Raw response body text, possibly empty.
    pub body: String,
}

impl WireResponse {
    /// Build a response with a JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.to_string(),
        }
    }

    /// Build a bodyless response.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }

    /// Attach a Retry-After hint.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Whether the status is a 2xx success.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.
    pub fn parse_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Network-level failure: the request never produced a status code.
#[derive(Debug, Error)]
#[error("network failure: {message}")]
pub struct TransportFailure {
    pub message: String,
}

impl TransportFailure {
    /// Create a failure from a diagnostic message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The opaque send capability the engine is built against.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one request to completion.
    ///
    /// Returns `Ok` for any response that carried a status code, including
    /// error statuses; `Err` only for network-level failures.
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportFailure>;
}

pub mod memory {
    //! Explicit in-memory stand-in for the remote service.
    //!
    //! Constructed fresh per test, never a process-wide singleton. Models
    //! the behaviors the engine depends on: server-assigned ids on create,
    //! PATCH null-removal semantics, paginated collection listing, and
    //! OData-style error bodies.

    use super::*;
    use serde_json::{json, Map};
    use std::collections::HashMap;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    /// In-memory implementation of the [`Transport`] contract.
    pub struct InMemoryService {
        collections: Mutex<HashMap<String, Vec<Map<String, Value>>>>,
        page_size: usize,
    }

    impl InMemoryService {
        /// Create an empty service.
        pub fn new() -> Self {
            Self {
                collections: Mutex::new(HashMap::new()),
                page_size: 100,
            }
        }

        /// Use a small page size to exercise pagination.
        #[must_use]
        pub fn with_page_size(mut self, page_size: usize) -> Self {
            self.page_size = page_size.max(1);
            self
        }

        /// Seed an object directly, returning its assigned id.
        pub async fn seed(&self, collection: &str, mut doc: Map<String, Value>) -> String {
            let id = Uuid::new_v4().to_string();
            doc.insert("id".to_string(), Value::String(id.clone()));
            self.collections
                .lock()
                .await
                .entry(collection.to_string())
                .or_default()
                .push(doc);
            id
        }

        /// Number of objects currently stored in a collection.
        pub async fn count(&self, collection: &str) -> usize {
            self.collections
                .lock()
                .await
                .get(collection)
                .map_or(0, Vec::len)
        }

        fn not_found(id: &str) -> WireResponse {
            WireResponse::json(
                404,
                &json!({
                    "error": {
                        "code": "ResourceNotFound",
                        "message": format!("resource '{id}' does not exist")
                    }
                }),
            )
        }

        fn list_page(
            &self,
            collection: &str,
            objects: &[Map<String, Value>],
            skip: usize,
        ) -> WireResponse {
            let page: Vec<Value> = objects
                .iter()
                .skip(skip)
                .take(self.page_size)
                .cloned()
                .map(Value::Object)
                .collect();
            let mut body = json!({ "value": page });
            if skip + self.page_size < objects.len() {
                body["@odata.nextLink"] = json!(format!(
                    "{collection}?$skiptoken={}",
                    skip + self.page_size
                ));
            }
            WireResponse::json(200, &body)
        }
    }

    impl Default for InMemoryService {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Split `path` into collection path, optional object id, and skip
    /// offset parsed from a `$skiptoken` query parameter.
    fn parse_path(path: &str) -> (String, Option<String>, usize) {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };
        let skip = query
            .and_then(|q| {
                q.split('&')
                    .find_map(|pair| pair.strip_prefix("$skiptoken="))
            })
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let path = path.trim_end_matches('/');
        // A trailing uuid segment addresses one object; otherwise the whole
        // path names the collection. Ids here are always uuids.
        if let Some((head, tail)) = path.rsplit_once('/') {
            if Uuid::parse_str(tail).is_ok() {
                return (head.to_string(), Some(tail.to_string()), skip);
            }
        }
        (path.to_string(), None, skip)
    }

    #[async_trait]
    impl Transport for InMemoryService {
        async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportFailure> {
            let (collection, object_id, skip) = parse_path(&request.path);
            let mut collections = self.collections.lock().await;

            match (request.method, object_id) {
                (Method::Post, None) => {
                    let Some(Value::Object(mut doc)) = request.body else {
                        return Ok(WireResponse::json(
                            400,
                            &json!({"error": {"code": "BadRequest", "message": "body must be an object"}}),
                        ));
                    };
                    let id = Uuid::new_v4().to_string();
                    doc.insert("id".to_string(), Value::String(id));
                    let stored = doc.clone();
                    collections.entry(collection).or_default().push(doc);
                    Ok(WireResponse::json(201, &Value::Object(stored)))
                }
                (Method::Get, Some(id)) => {
                    let found = collections
                        .get(&collection)
                        .and_then(|objs| objs.iter().find(|o| o.get("id") == Some(&json!(id))));
                    match found {
                        Some(doc) => Ok(WireResponse::json(200, &Value::Object(doc.clone()))),
                        None => Ok(Self::not_found(&id)),
                    }
                }
                (Method::Get, None) => {
                    let objects = collections.get(&collection).cloned().unwrap_or_default();
                    Ok(self.list_page(&collection, &objects, skip))
                }
                (Method::Patch, Some(id)) => {
                    let Some(Value::Object(patch)) = request.body else {
                        return Ok(WireResponse::json(
                            400,
                            &json!({"error": {"code": "BadRequest", "message": "body must be an object"}}),
                        ));
                    };
                    let target = collections
                        .get_mut(&collection)
                        .and_then(|objs| objs.iter_mut().find(|o| o.get("id") == Some(&json!(id))));
                    match target {
                        Some(doc) => {
                            for (key, value) in patch {
                                // An explicit null clears the field; anything
                                // else replaces it wholesale.
                                if value.is_null() {
                                    doc.remove(&key);
                                } else {
                                    doc.insert(key, value);
                                }
                            }
                            Ok(WireResponse::empty(204))
                        }
                        None => Ok(Self::not_found(&id)),
                    }
                }
                (Method::Delete, Some(id)) => {
                    let removed = collections.get_mut(&collection).is_some_and(|objs| {
                        let before = objs.len();
                        objs.retain(|o| o.get("id") != Some(&json!(id)));
                        objs.len() < before
                    });
                    if removed {
                        Ok(WireResponse::empty(204))
                    } else {
                        Ok(Self::not_found(&id))
                    }
                }
                _ => Ok(WireResponse::json(
                    405,
                    &json!({"error": {"code": "MethodNotAllowed", "message": request.path}}),
                )),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn doc(name: &str) -> Map<String, Value> {
            let mut doc = Map::new();
            doc.insert("displayName".to_string(), json!(name));
            doc
        }

        #[tokio::test]
        async fn test_create_assigns_id() {
            let service = InMemoryService::new();
            let response = service
                .send(WireRequest::post("/things", json!({"displayName": "a"})))
                .await
                .unwrap();
            assert_eq!(response.status, 201);
            let body = response.parse_json().unwrap();
            assert!(body["id"].as_str().is_some());
            assert_eq!(service.count("/things").await, 1);
        }

        #[tokio::test]
        async fn test_patch_null_removes_field() {
            let service = InMemoryService::new();
            let mut seeded = doc("a");
            seeded.insert("description".to_string(), json!("old"));
            let id = service.seed("/things", seeded).await;

            let response = service
                .send(WireRequest::patch(
                    format!("/things/{id}"),
                    json!({"description": null}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status, 204);

            let fetched = service
                .send(WireRequest::get(format!("/things/{id}")))
                .await
                .unwrap();
            let body = fetched.parse_json().unwrap();
            assert!(body.get("description").is_none());
        }

        #[tokio::test]
        async fn test_get_missing_is_404_with_odata_body() {
            let service = InMemoryService::new();
            let id = Uuid::new_v4();
            let response = service
                .send(WireRequest::get(format!("/things/{id}")))
                .await
                .unwrap();
            assert_eq!(response.status, 404);
            let body = response.parse_json().unwrap();
            assert_eq!(body["error"]["code"], "ResourceNotFound");
        }

        #[tokio::test]
        async fn test_delete_twice_second_is_404() {
            let service = InMemoryService::new();
            let id = service.seed("/things", doc("a")).await;

            let first = service
                .send(WireRequest::delete(format!("/things/{id}")))
                .await
                .unwrap();
            assert_eq!(first.status, 204);

            let second = service
                .send(WireRequest::delete(format!("/things/{id}")))
                .await
                .unwrap();
            assert_eq!(second.status, 404);
        }

        #[tokio::test]
        async fn test_listing_paginates_with_next_link() {
            let service = InMemoryService::new().with_page_size(2);
            for i in 0..5 {
                service.seed("/things", doc(&format!("thing-{i}"))).await;
            }

            let first = service
                .send(WireRequest::get("/things"))
                .await
                .unwrap()
                .parse_json()
                .unwrap();
            assert_eq!(first["value"].as_array().unwrap().len(), 2);
            let next = first["@odata.nextLink"].as_str().unwrap().to_string();

            let second = service
                .send(WireRequest::get(next))
                .await
                .unwrap()
                .parse_json()
                .unwrap();
            assert_eq!(second["value"].as_array().unwrap().len(), 2);

            let next = second["@odata.nextLink"].as_str().unwrap().to_string();
            let last = service
                .send(WireRequest::get(next))
                .await
                .unwrap()
                .parse_json()
                .unwrap();
            assert_eq!(last["value"].as_array().unwrap().len(), 1);
            assert!(last.get("@odata.nextLink").is_none());
        }
    }
}
