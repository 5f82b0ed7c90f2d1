//! Resource schema types
//!
//! Static per-resource-kind descriptions: the field table a declared object
//! is constructed against, structural validators, and the permission scopes
//! threaded into error classification. The engine consumes these as data;
//! it does not validate business rules beyond optional/variant structure.

use regex::Regex;
use serde_json::Value;

use crate::error::PlanError;
use crate::variant::VariantFamily;

/// How a field participates in the declared/remote contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Must be set in every plan; absence is a plan-construction error.
    Required,
    /// Tri-state optional (unset / explicit-null / set).
    Optional,
    /// Server-assigned; read back into state but never planned.
    Computed,
}

/// Structural validator applied to set values at plan time.
#[derive(Debug, Clone)]
pub enum Validator {
    /// Value must be a string matching the pattern.
    Pattern(Regex),
    /// Value must be one of the listed strings.
    OneOf(Vec<String>),
}

impl Validator {
    /// Compile a pattern validator.
    ///
    /// # Panics
    /// Panics if the pattern is not a valid regular expression; patterns
    /// are compile-time constants in schema tables.
    pub fn pattern(pattern: &str) -> Self {
        Validator::Pattern(Regex::new(pattern).unwrap())
    }

    /// Build an enumeration validator.
    pub fn one_of(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Validator::OneOf(values.into_iter().map(Into::into).collect())
    }

    /// Check a wire value against this validator.
    pub fn check(&self, field: &str, value: &Value) -> Result<(), PlanError> {
        let Some(s) = value.as_str() else {
            return Err(PlanError::Invalid {
                field: field.to_string(),
                message: format!("expected a string, got {value}"),
            });
        };
        match self {
            Validator::Pattern(re) => {
                if re.is_match(s) {
                    Ok(())
                } else {
                    Err(PlanError::Invalid {
                        field: field.to_string(),
                        message: format!("'{s}' does not match pattern {}", re.as_str()),
                    })
                }
            }
            Validator::OneOf(allowed) => {
                if allowed.iter().any(|a| a == s) {
                    Ok(())
                } else {
                    Err(PlanError::Invalid {
                        field: field.to_string(),
                        message: format!("'{s}' is not one of [{}]", allowed.join(", ")),
                    })
                }
            }
        }
    }
}

/// One entry in a resource's field table.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Wire name of the field (camelCase).
    pub name: String,
    /// Required / optional / computed.
    pub kind: FieldKind,
    /// Optional structural validator for set values.
    pub validator: Option<Validator>,
    /// Variant family the field's values belong to, if any. Collections of
    /// variants set this together with `collection`.
    pub variant: Option<VariantFamily>,
    /// Whether the field is a collection. Collections diff as whole-value
    /// replacements, never element-wise.
    pub collection: bool,
}

impl FieldSpec {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            validator: None,
            variant: None,
            collection: false,
        }
    }

    /// A required field.
    pub fn required(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Required)
    }

    /// An optional tri-state field.
    pub fn optional(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Optional)
    }

    /// A server-assigned field.
    pub fn computed(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Computed)
    }

    /// Attach a validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Mark the field as carrying values of a variant family.
    #[must_use]
    pub fn with_variant(mut self, family: VariantFamily) -> Self {
        self.variant = Some(family);
        self
    }

    /// Mark the field as a collection.
    #[must_use]
    pub fn as_collection(mut self) -> Self {
        self.collection = true;
        self
    }
}

/// Static description of one remote resource kind.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    /// Resource kind name, for diagnostics.
    pub resource_type: String,
    /// Collection path on the remote service, e.g.
    /// `/deviceManagement/assignmentFilters`.
    pub collection_path: String,
    /// Wire name of the display-name field used for by-name resolution.
    pub display_name_field: String,
    /// The field table.
    pub fields: Vec<FieldSpec>,
    /// Scopes required for read operations.
    pub read_scopes: Vec<String>,
    /// Scopes required for create/update/delete operations.
    pub write_scopes: Vec<String>,
}

impl ResourceSchema {
    /// Create a schema for a resource kind rooted at `collection_path`.
    pub fn new(resource_type: impl Into<String>, collection_path: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            collection_path: collection_path.into(),
            display_name_field: "displayName".to_string(),
            fields: Vec::new(),
            read_scopes: Vec::new(),
            write_scopes: Vec::new(),
        }
    }

    /// Override the display-name field.
    #[must_use]
    pub fn with_display_name_field(mut self, name: impl Into<String>) -> Self {
        self.display_name_field = name.into();
        self
    }

    /// Add a field to the table.
    #[must_use]
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare the read scopes.
    #[must_use]
    pub fn with_read_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.read_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Declare the write scopes.
    #[must_use]
    pub fn with_write_scopes(
        mut self,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.write_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Find a field spec by wire name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Path of a single object within the collection.
    pub fn object_path(&self, id: &str) -> String {
        format!("{}/{}", self.collection_path, id)
    }

    /// Scopes relevant to the given operation, for permission hints.
    pub fn scopes_for(&self, write: bool) -> &[String] {
        if write {
            &self.write_scopes
        } else {
            &self.read_scopes
        }
    }
}
