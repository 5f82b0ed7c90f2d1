//! Tri-state optional-value codec
//!
//! A declared optional field carries three distinguishable states that a
//! plain `Option` cannot: *unset* (the user never mentioned it), *null*
//! (the user cleared it), and *set*. Under partial-update (PATCH) semantics
//! these encode differently on the wire: unset omits the key entirely
//! ("leave unchanged"), null emits an explicit JSON null ("clear it"), and
//! set emits the value. Collapsing null into omission is the classic bug
//! this codec exists to prevent.

use serde_json::{Map, Value};

/// Declared state of one optional field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// The user did not mention the field. Omitted on create, left
    /// untouched on update.
    #[default]
    Unset,
    /// The user cleared the field. Sent as an explicit null so the remote
    /// service removes it.
    Null,
    /// A concrete declared value.
    Set(Value),
}

impl FieldValue {
    /// Create a set value.
    pub fn set(value: impl Into<Value>) -> Self {
        FieldValue::Set(value.into())
    }

    /// Check if the field is unset.
    pub fn is_unset(&self) -> bool {
        matches!(self, FieldValue::Unset)
    }

    /// Check if the field is explicitly cleared.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Check if the field carries a value.
    pub fn is_set(&self) -> bool {
        matches!(self, FieldValue::Set(_))
    }

    /// Get the concrete value, if set.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldValue::Set(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as a string, if set to one.
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// Encode the declared state into its wire form.
    pub fn encode(&self) -> WireEntry {
        match self {
            FieldValue::Unset => WireEntry::Omitted,
            FieldValue::Null => WireEntry::Null,
            FieldValue::Set(v) => WireEntry::Present(v.clone()),
        }
    }

    /// Decode a server-response entry back into a declared state.
    ///
    /// `entry` is the looked-up key: `None` means the key was absent from
    /// the response document.
    pub fn decode(entry: Option<&Value>) -> Self {
        match entry {
            None => FieldValue::Unset,
            Some(Value::Null) => FieldValue::Null,
            Some(v) => FieldValue::Set(v.clone()),
        }
    }

    /// Decode from a wire entry. Inverse of [`FieldValue::encode`].
    pub fn from_wire(entry: WireEntry) -> Self {
        match entry {
            WireEntry::Omitted => FieldValue::Unset,
            WireEntry::Null => FieldValue::Null,
            WireEntry::Present(v) => FieldValue::Set(v),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => FieldValue::Null,
            other => FieldValue::Set(other),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Set(Value::String(s.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Set(Value::String(s))
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Set(Value::Bool(b))
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Set(Value::Number(i.into()))
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        FieldValue::Set(Value::Array(
            items.into_iter().map(Value::String).collect(),
        ))
    }
}

/// Wire form of one optional field in a create/update payload.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEntry {
    /// Key omitted entirely (leave unchanged on update).
    Omitted,
    /// Key present with JSON null (clear the remote value).
    Null,
    /// Key present with a concrete value.
    Present(Value),
}

impl WireEntry {
    /// Write this entry into a wire object under `key`.
    ///
    /// `Omitted` writes nothing; the other two insert the key.
    pub fn apply(self, key: &str, body: &mut Map<String, Value>) {
        match self {
            WireEntry::Omitted => {}
            WireEntry::Null => {
                body.insert(key.to_string(), Value::Null);
            }
            WireEntry::Present(v) => {
                body.insert(key.to_string(), v);
            }
        }
    }

    /// Read the entry for `key` out of a wire object.
    pub fn from_map(body: &Map<String, Value>, key: &str) -> Self {
        match body.get(key) {
            None => WireEntry::Omitted,
            Some(Value::Null) => WireEntry::Null,
            Some(v) => WireEntry::Present(v.clone()),
        }
    }
}
