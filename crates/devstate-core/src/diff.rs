//! Desired-state differ
//!
//! Computes the minimal wire mutation from a declared object, in create
//! mode (no remote exists yet) or update mode (diffed against the
//! last-known remote snapshot). Field removal is preserved: an
//! explicit-null declaration always lands in an update plan as a JSON
//! null, even when the remote already lacks the key, because correctness
//! must not depend on the remote state being exactly known.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PlanError;
use crate::object::{DeclaredObject, RemoteObject};
use crate::optional::FieldValue;
use crate::schema::{FieldKind, FieldSpec, ResourceSchema};

/// The minimal wire patch for one create or update call.
///
/// Ephemeral: built per call, consumed by one send, then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationPlan {
    body: Map<String, Value>,
}

impl ReconciliationPlan {
    /// Whether the plan contains no mutations.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Number of fields in the plan.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Look up a planned entry. `Some(Value::Null)` is a removal.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// Whether the plan mentions a field at all.
    pub fn contains(&self, name: &str) -> bool {
        self.body.contains_key(name)
    }

    /// The wire body to send.
    pub fn into_body(self) -> Value {
        Value::Object(self.body)
    }

    /// Borrow the wire body.
    pub fn as_body(&self) -> &Map<String, Value> {
        &self.body
    }
}

/// Compute a create-mode plan: every set field of the declared object.
///
/// Unset optionals are omitted; explicit-null optionals are also omitted
/// (there is no remote value to clear yet). A required field left unset is
/// a plan-construction error.
pub fn plan_create(
    schema: &ResourceSchema,
    desired: &DeclaredObject,
) -> Result<ReconciliationPlan, PlanError> {
    let mut body = Map::new();
    for spec in &schema.fields {
        if spec.kind == FieldKind::Computed {
            continue;
        }
        let declared = desired.get(&spec.name);
        check_required(spec, declared)?;
        if let FieldValue::Set(value) = declared {
            check_value(spec, value)?;
            body.insert(spec.name.clone(), value.clone());
        }
    }
    debug!(
        resource_type = %schema.resource_type,
        fields = body.len(),
        "built create plan"
    );
    Ok(ReconciliationPlan { body })
}

/// Compute an update-mode plan against the last-known remote snapshot.
///
/// Contains only fields whose declared value differs from the remote
/// value, plus every explicit-null field regardless of remote state.
/// Collections compare and replace as whole values.
pub fn plan_update(
    schema: &ResourceSchema,
    remote: &RemoteObject,
    desired: &DeclaredObject,
) -> Result<ReconciliationPlan, PlanError> {
    let mut body = Map::new();
    for spec in &schema.fields {
        if spec.kind == FieldKind::Computed {
            continue;
        }
        let declared = desired.get(&spec.name);
        check_required(spec, declared)?;
        match declared {
            FieldValue::Unset => {}
            FieldValue::Null => {
                // Idempotent removal: sent even when remote lacks the key.
                body.insert(spec.name.clone(), Value::Null);
            }
            FieldValue::Set(value) => {
                check_value(spec, value)?;
                if remote.get(&spec.name) != Some(value) {
                    body.insert(spec.name.clone(), value.clone());
                }
            }
        }
    }
    debug!(
        resource_type = %schema.resource_type,
        fields = body.len(),
        "built update plan"
    );
    Ok(ReconciliationPlan { body })
}

fn check_required(spec: &FieldSpec, declared: &FieldValue) -> Result<(), PlanError> {
    if spec.kind == FieldKind::Required && !declared.is_set() {
        return Err(PlanError::RequiredUnset {
            field: spec.name.clone(),
        });
    }
    Ok(())
}

/// Structural checks on an outgoing value: schema validators, and variant
/// encodability for fields (or collections) carrying tagged payloads.
fn check_value(spec: &FieldSpec, value: &Value) -> Result<(), PlanError> {
    if let Some(validator) = &spec.validator {
        validator.check(&spec.name, value)?;
    }
    if let Some(family) = spec.variant {
        if spec.collection {
            let items = value.as_array().ok_or_else(|| PlanError::Invalid {
                field: spec.name.clone(),
                message: format!("expected an array of {} payloads", family.name()),
            })?;
            for item in items {
                family.ensure_encodable(item)?;
            }
        } else {
            family.ensure_encodable(value)?;
        }
    }
    Ok(())
}
