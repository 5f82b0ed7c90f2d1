//! Declared and remote object models
//!
//! A `DeclaredObject` is the caller-owned desired configuration for one
//! resource instance: a field table of tri-state values plus the bound
//! server id once one exists. A `RemoteObject` is the last-known
//! server-side document, loosely typed and keyed by its immutable `id`; it
//! is refreshed wholesale on every read and never partially mutated in
//! memory.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{ReconcileError, ReconcileResult};
use crate::optional::FieldValue;
use crate::schema::ResourceSchema;

/// The user's desired configuration for one resource instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclaredObject {
    fields: BTreeMap<String, FieldValue>,
    id: Option<String>,
}

impl DeclaredObject {
    /// Create an empty declared object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field value (builder style).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Mark a field explicitly cleared (builder style).
    #[must_use]
    pub fn with_null(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldValue::Null);
        self
    }

    /// Set a field value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Mark a field explicitly cleared.
    pub fn clear(&mut self, name: impl Into<String>) {
        self.fields.insert(name.into(), FieldValue::Null);
    }

    /// Remove any mention of a field (back to unset).
    pub fn unset(&mut self, name: &str) {
        self.fields.remove(name);
    }

    /// Get a field's declared state. Unmentioned fields are unset.
    pub fn get(&self, name: &str) -> &FieldValue {
        static UNSET: FieldValue = FieldValue::Unset;
        self.fields.get(name).unwrap_or(&UNSET)
    }

    /// The server-assigned id, once bound.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Bind the server-assigned id after a successful create.
    pub fn bind_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Iterate over explicitly mentioned fields.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Map a remote document into declared form using the schema's field
    /// table: absent keys become unset, nulls stay explicit, values stay
    /// set. The server id is bound when present.
    pub fn from_remote(schema: &ResourceSchema, remote: &RemoteObject) -> Self {
        let mut declared = DeclaredObject::new();
        for spec in &schema.fields {
            let state = FieldValue::decode(remote.get(&spec.name));
            if !state.is_unset() {
                declared.fields.insert(spec.name.clone(), state);
            }
        }
        if let Some(id) = remote.id() {
            declared.bind_id(id);
        }
        declared
    }
}

/// The last-known server-side representation of one resource instance.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    doc: Map<String, Value>,
}

impl RemoteObject {
    /// Wrap a response document. The value must be a JSON object.
    pub fn from_value(value: Value) -> ReconcileResult<Self> {
        match value {
            Value::Object(doc) => Ok(Self { doc }),
            other => Err(ReconcileError::fatal(format!(
                "remote object is not a JSON object: {other}"
            ))),
        }
    }

    /// The server-assigned immutable id, if the document carries one.
    pub fn id(&self) -> Option<&str> {
        self.doc.get("id").and_then(Value::as_str)
    }

    /// Look up a field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.doc.get(name)
    }

    /// The display-name value under the schema's display-name field.
    pub fn display_name(&self, schema: &ResourceSchema) -> Option<&str> {
        self.doc
            .get(&schema.display_name_field)
            .and_then(Value::as_str)
    }

    /// Borrow the underlying document.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.doc
    }

    /// Consume into the underlying document.
    pub fn into_value(self) -> Value {
        Value::Object(self.doc)
    }
}
