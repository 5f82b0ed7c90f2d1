//! Tagged-variant codec
//!
//! Families of mutually exclusive sub-object shapes (assignment targets,
//! run schedules, scope filters) are carried on the wire as a flat JSON
//! object with a discriminator string selecting the shape. Each family is a
//! closed sum type with one constructor per shape, so sibling fields can
//! never cross-contaminate. Decoding an unregistered discriminator yields
//! an `Unknown` value that survives reads of forward-compatible server
//! responses; encoding an `Unknown` back to the wire is always an error.

use chrono::{DateTime, NaiveTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::error::{PlanError, ReconcileError, ReconcileResult};
use crate::optional::{FieldValue, WireEntry};

/// Discriminator key carried by every assignment-target payload.
pub const TARGET_TYPE_KEY: &str = "targetType";
/// Discriminator key carried by every run-schedule payload.
pub const SCHEDULE_TYPE_KEY: &str = "scheduleType";
/// Discriminator key carried by every scope-filter payload.
pub const FILTER_TYPE_KEY: &str = "filterType";

/// Site-bound collection identifiers look like `MEM12345678`: a three
/// letter site code followed by eight hex digits.
fn collection_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[A-Za-z]{3}[0-9A-Fa-f]{8}$").unwrap())
}

/// The registered variant families.
///
/// The desired-state differ uses this to verify that a wire value stored in
/// a declared field actually carries a discriminator it could have produced
/// itself; an unregistered discriminator in an outgoing payload is an
/// encoding error, not a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantFamily {
    AssignmentTarget,
    RunSchedule,
    ScopeFilter,
}

impl VariantFamily {
    /// The discriminator key for payloads of this family.
    pub fn discriminator_key(&self) -> &'static str {
        match self {
            VariantFamily::AssignmentTarget => TARGET_TYPE_KEY,
            VariantFamily::RunSchedule => SCHEDULE_TYPE_KEY,
            VariantFamily::ScopeFilter => FILTER_TYPE_KEY,
        }
    }

    /// The family name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            VariantFamily::AssignmentTarget => "assignment target",
            VariantFamily::RunSchedule => "run schedule",
            VariantFamily::ScopeFilter => "scope filter",
        }
    }

    /// Check whether `discriminator` names a shape this client can encode.
    pub fn is_registered(&self, discriminator: &str) -> bool {
        match self {
            VariantFamily::AssignmentTarget => matches!(
                discriminator,
                "allDevices"
                    | "allLicensedUsers"
                    | "groupAssignment"
                    | "exclusionGroupAssignment"
                    | "configurationManagerCollection"
            ),
            VariantFamily::RunSchedule => {
                matches!(discriminator, "once" | "hourly" | "daily")
            }
            VariantFamily::ScopeFilter => {
                matches!(discriminator, "deviceFilter" | "appFilter")
            }
        }
    }

    /// Verify an outgoing wire value belongs to this family and carries a
    /// registered discriminator.
    pub fn ensure_encodable(&self, value: &Value) -> Result<(), PlanError> {
        let Some(obj) = value.as_object() else {
            return Err(PlanError::Invalid {
                field: self.discriminator_key().to_string(),
                message: format!("{} payload must be an object", self.name()),
            });
        };
        let discriminator = obj
            .get(self.discriminator_key())
            .and_then(Value::as_str)
            .unwrap_or_default();
        if self.is_registered(discriminator) {
            Ok(())
        } else {
            Err(PlanError::UnknownVariant {
                family: self.name(),
                discriminator: discriminator.to_string(),
            })
        }
    }
}

/// Where a configuration assignment lands.
///
/// The `kind` selects exactly one shape; the optional assignment-filter
/// pair is shared by every shape in the family and rides through the
/// optional-value codec independently of the discriminator dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentTarget {
    kind: TargetKind,
    /// Id of an assignment filter further narrowing the target.
    filter_id: FieldValue,
    /// Filter application mode (`include` / `exclude`).
    filter_mode: FieldValue,
}

/// The closed set of assignment-target shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetKind {
    AllDevices,
    AllLicensedUsers,
    GroupAssignment { group_id: String },
    ExclusionGroupAssignment { group_id: String },
    ConfigurationManagerCollection { collection_id: String },
    /// A discriminator this client does not model. Preserved verbatim so
    /// forward-compatible reads survive; refuses to encode.
    Unknown {
        discriminator: String,
        payload: Map<String, Value>,
    },
}

impl AssignmentTarget {
    fn from_kind(kind: TargetKind) -> Self {
        Self {
            kind,
            filter_id: FieldValue::Unset,
            filter_mode: FieldValue::Unset,
        }
    }

    /// Target every managed device.
    pub fn all_devices() -> Self {
        Self::from_kind(TargetKind::AllDevices)
    }

    /// Target every licensed user.
    pub fn all_licensed_users() -> Self {
        Self::from_kind(TargetKind::AllLicensedUsers)
    }

    /// Target the members of a directory group.
    pub fn group(group_id: impl Into<String>) -> Self {
        Self::from_kind(TargetKind::GroupAssignment {
            group_id: group_id.into(),
        })
    }

    /// Exclude the members of a directory group.
    pub fn exclusion_group(group_id: impl Into<String>) -> Self {
        Self::from_kind(TargetKind::ExclusionGroupAssignment {
            group_id: group_id.into(),
        })
    }

    /// Target a Configuration Manager collection. The collection id must
    /// match the site-code pattern (e.g. `MEM12345678`).
    pub fn configuration_manager_collection(
        collection_id: impl Into<String>,
    ) -> Result<Self, PlanError> {
        let collection_id = collection_id.into();
        if !collection_id_pattern().is_match(&collection_id) {
            return Err(PlanError::Invalid {
                field: "collectionId".to_string(),
                message: format!(
                    "'{collection_id}' does not match the site-code pattern"
                ),
            });
        }
        Ok(Self::from_kind(TargetKind::ConfigurationManagerCollection {
            collection_id,
        }))
    }

    /// Attach the cross-cutting assignment filter.
    pub fn with_filter(mut self, filter_id: impl Into<String>, mode: impl Into<String>) -> Self {
        self.filter_id = FieldValue::from(filter_id.into());
        self.filter_mode = FieldValue::from(mode.into());
        self
    }

    /// Clear a previously set assignment filter (sends explicit nulls).
    pub fn without_filter(mut self) -> Self {
        self.filter_id = FieldValue::Null;
        self.filter_mode = FieldValue::Null;
        self
    }

    /// The shape of this target.
    pub fn kind(&self) -> &TargetKind {
        &self.kind
    }

    /// The cross-cutting filter id state.
    pub fn filter_id(&self) -> &FieldValue {
        &self.filter_id
    }

    /// The cross-cutting filter mode state.
    pub fn filter_mode(&self) -> &FieldValue {
        &self.filter_mode
    }

    /// Encode to a wire object tagged with the shape's discriminator.
    ///
    /// Only the active shape's fields are emitted.
    pub fn encode(&self) -> Result<Value, PlanError> {
        let mut body = Map::new();
        match &self.kind {
            TargetKind::AllDevices => {
                body.insert(TARGET_TYPE_KEY.into(), "allDevices".into());
            }
            TargetKind::AllLicensedUsers => {
                body.insert(TARGET_TYPE_KEY.into(), "allLicensedUsers".into());
            }
            TargetKind::GroupAssignment { group_id } => {
                body.insert(TARGET_TYPE_KEY.into(), "groupAssignment".into());
                body.insert("groupId".into(), group_id.as_str().into());
            }
            TargetKind::ExclusionGroupAssignment { group_id } => {
                body.insert(TARGET_TYPE_KEY.into(), "exclusionGroupAssignment".into());
                body.insert("groupId".into(), group_id.as_str().into());
            }
            TargetKind::ConfigurationManagerCollection { collection_id } => {
                body.insert(
                    TARGET_TYPE_KEY.into(),
                    "configurationManagerCollection".into(),
                );
                body.insert("collectionId".into(), collection_id.as_str().into());
            }
            TargetKind::Unknown { discriminator, .. } => {
                return Err(PlanError::UnknownVariant {
                    family: VariantFamily::AssignmentTarget.name(),
                    discriminator: discriminator.clone(),
                });
            }
        }
        self.filter_id.encode().apply("assignmentFilterId", &mut body);
        self.filter_mode
            .encode()
            .apply("assignmentFilterType", &mut body);
        Ok(Value::Object(body))
    }

    /// Decode a wire object, dispatching on the discriminator string.
    ///
    /// Unrecognized discriminators become [`TargetKind::Unknown`] rather
    /// than an error so new server-side target kinds do not break reads.
    pub fn decode(value: &Value) -> ReconcileResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            ReconcileError::fatal(format!("assignment target is not an object: {value}"))
        })?;
        let discriminator = obj
            .get(TARGET_TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ReconcileError::fatal(format!(
                    "assignment target missing '{TARGET_TYPE_KEY}' discriminator: {value}"
                ))
            })?;

        let kind = match discriminator {
            "allDevices" => TargetKind::AllDevices,
            "allLicensedUsers" => TargetKind::AllLicensedUsers,
            "groupAssignment" => TargetKind::GroupAssignment {
                group_id: require_str(obj, "groupId", "groupAssignment")?,
            },
            "exclusionGroupAssignment" => TargetKind::ExclusionGroupAssignment {
                group_id: require_str(obj, "groupId", "exclusionGroupAssignment")?,
            },
            "configurationManagerCollection" => TargetKind::ConfigurationManagerCollection {
                collection_id: require_str(obj, "collectionId", "configurationManagerCollection")?,
            },
            other => TargetKind::Unknown {
                discriminator: other.to_string(),
                payload: obj.clone(),
            },
        };

        Ok(Self {
            kind,
            filter_id: FieldValue::from_wire(WireEntry::from_map(obj, "assignmentFilterId")),
            filter_mode: FieldValue::from_wire(WireEntry::from_map(obj, "assignmentFilterType")),
        })
    }
}

/// When a remediation or compliance task runs.
#[derive(Debug, Clone, PartialEq)]
pub enum RunSchedule {
    /// Run once at a fixed instant.
    Once { start: DateTime<Utc> },
    /// Run every `interval` hours.
    Hourly { interval: u32 },
    /// Run every `interval` days at a fixed local time.
    Daily { interval: u32, time: NaiveTime },
    /// A schedule kind this client does not model.
    Unknown {
        discriminator: String,
        payload: Map<String, Value>,
    },
}

impl RunSchedule {
    /// Encode to a wire object tagged with the schedule discriminator.
    pub fn encode(&self) -> Result<Value, PlanError> {
        let mut body = Map::new();
        match self {
            RunSchedule::Once { start } => {
                body.insert(SCHEDULE_TYPE_KEY.into(), "once".into());
                body.insert("startDateTime".into(), start.to_rfc3339().into());
            }
            RunSchedule::Hourly { interval } => {
                body.insert(SCHEDULE_TYPE_KEY.into(), "hourly".into());
                body.insert("interval".into(), (*interval).into());
            }
            RunSchedule::Daily { interval, time } => {
                body.insert(SCHEDULE_TYPE_KEY.into(), "daily".into());
                body.insert("interval".into(), (*interval).into());
                body.insert("time".into(), time.format("%H:%M:%S").to_string().into());
            }
            RunSchedule::Unknown { discriminator, .. } => {
                return Err(PlanError::UnknownVariant {
                    family: VariantFamily::RunSchedule.name(),
                    discriminator: discriminator.clone(),
                });
            }
        }
        Ok(Value::Object(body))
    }

    /// Decode a wire object, dispatching on the discriminator string.
    pub fn decode(value: &Value) -> ReconcileResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            ReconcileError::fatal(format!("run schedule is not an object: {value}"))
        })?;
        let discriminator = obj
            .get(SCHEDULE_TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ReconcileError::fatal(format!(
                    "run schedule missing '{SCHEDULE_TYPE_KEY}' discriminator: {value}"
                ))
            })?;

        match discriminator {
            "once" => {
                let raw = require_str(obj, "startDateTime", "once")?;
                let start = DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| {
                        ReconcileError::fatal(format!(
                            "invalid startDateTime '{raw}' in once schedule: {e}"
                        ))
                    })?
                    .with_timezone(&Utc);
                Ok(RunSchedule::Once { start })
            }
            "hourly" => Ok(RunSchedule::Hourly {
                interval: require_u32(obj, "interval", "hourly")?,
            }),
            "daily" => {
                let raw = require_str(obj, "time", "daily")?;
                let time = NaiveTime::parse_from_str(&raw, "%H:%M:%S").map_err(|e| {
                    ReconcileError::fatal(format!("invalid time '{raw}' in daily schedule: {e}"))
                })?;
                Ok(RunSchedule::Daily {
                    interval: require_u32(obj, "interval", "daily")?,
                    time,
                })
            }
            other => Ok(RunSchedule::Unknown {
                discriminator: other.to_string(),
                payload: obj.clone(),
            }),
        }
    }
}

/// A filter narrowing which devices or apps a configuration applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeFilter {
    /// A device-property rule, e.g. `(device.manufacturer -eq "Dell")`.
    DeviceFilter { rule: String },
    /// An app-property rule.
    AppFilter { rule: String },
    /// A filter kind this client does not model.
    Unknown {
        discriminator: String,
        payload: Map<String, Value>,
    },
}

impl ScopeFilter {
    /// Encode to a wire object tagged with the filter discriminator.
    pub fn encode(&self) -> Result<Value, PlanError> {
        let mut body = Map::new();
        match self {
            ScopeFilter::DeviceFilter { rule } => {
                body.insert(FILTER_TYPE_KEY.into(), "deviceFilter".into());
                body.insert("rule".into(), rule.as_str().into());
            }
            ScopeFilter::AppFilter { rule } => {
                body.insert(FILTER_TYPE_KEY.into(), "appFilter".into());
                body.insert("rule".into(), rule.as_str().into());
            }
            ScopeFilter::Unknown { discriminator, .. } => {
                return Err(PlanError::UnknownVariant {
                    family: VariantFamily::ScopeFilter.name(),
                    discriminator: discriminator.clone(),
                });
            }
        }
        Ok(Value::Object(body))
    }

    /// Decode a wire object, dispatching on the discriminator string.
    pub fn decode(value: &Value) -> ReconcileResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            ReconcileError::fatal(format!("scope filter is not an object: {value}"))
        })?;
        let discriminator = obj
            .get(FILTER_TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ReconcileError::fatal(format!(
                    "scope filter missing '{FILTER_TYPE_KEY}' discriminator: {value}"
                ))
            })?;

        match discriminator {
            "deviceFilter" => Ok(ScopeFilter::DeviceFilter {
                rule: require_str(obj, "rule", "deviceFilter")?,
            }),
            "appFilter" => Ok(ScopeFilter::AppFilter {
                rule: require_str(obj, "rule", "appFilter")?,
            }),
            other => Ok(ScopeFilter::Unknown {
                discriminator: other.to_string(),
                payload: obj.clone(),
            }),
        }
    }
}

fn require_str(obj: &Map<String, Value>, key: &str, shape: &str) -> ReconcileResult<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ReconcileError::fatal(format!("{shape} payload missing required field '{key}'"))
        })
}

fn require_u32(obj: &Map<String, Value>, key: &str, shape: &str) -> ReconcileResult<u32> {
    obj.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            ReconcileError::fatal(format!("{shape} payload missing required field '{key}'"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_target_round_trip() {
        let target = AssignmentTarget::group("g1").with_filter("f1", "include");
        let wire = target.encode().unwrap();

        assert_eq!(wire["targetType"], "groupAssignment");
        assert_eq!(wire["groupId"], "g1");
        assert_eq!(wire["assignmentFilterId"], "f1");

        let decoded = AssignmentTarget::decode(&wire).unwrap();
        assert_eq!(decoded, target);
    }

    #[test]
    fn test_sibling_fields_never_emitted() {
        let wire = AssignmentTarget::all_devices().encode().unwrap();
        let obj = wire.as_object().unwrap();
        assert!(!obj.contains_key("groupId"));
        assert!(!obj.contains_key("collectionId"));
        assert_eq!(obj["targetType"], "allDevices");
    }

    #[test]
    fn test_decoded_targets_do_not_cross_contaminate() {
        let group = AssignmentTarget::decode(&json!({
            "targetType": "groupAssignment",
            "groupId": "g1"
        }))
        .unwrap();
        let all = AssignmentTarget::decode(&json!({"targetType": "allDevices"})).unwrap();

        assert_eq!(
            group.kind(),
            &TargetKind::GroupAssignment {
                group_id: "g1".to_string()
            }
        );
        assert_eq!(all.kind(), &TargetKind::AllDevices);
        // groupId must never appear on the re-encoded allDevices value
        let wire = all.encode().unwrap();
        assert!(wire.get("groupId").is_none());
    }

    #[test]
    fn test_unknown_discriminator_tolerated_on_decode() {
        let wire = json!({
            "targetType": "roamingProfileAssignment",
            "profileId": "p1"
        });
        let decoded = AssignmentTarget::decode(&wire).unwrap();
        match decoded.kind() {
            TargetKind::Unknown {
                discriminator,
                payload,
            } => {
                assert_eq!(discriminator, "roamingProfileAssignment");
                assert_eq!(payload.get("profileId"), Some(&json!("p1")));
            }
            other => panic!("expected unknown kind, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_refuses_to_encode() {
        let decoded = AssignmentTarget::decode(&json!({"targetType": "mystery"})).unwrap();
        let err = decoded.encode().unwrap_err();
        assert_eq!(
            err,
            PlanError::UnknownVariant {
                family: "assignment target",
                discriminator: "mystery".to_string(),
            }
        );
    }

    #[test]
    fn test_collection_id_pattern_enforced_at_construction() {
        assert!(AssignmentTarget::configuration_manager_collection("MEM12345678").is_ok());
        assert!(AssignmentTarget::configuration_manager_collection("nope").is_err());
        assert!(AssignmentTarget::configuration_manager_collection("MEM1234567Z").is_err());
    }

    #[test]
    fn test_cleared_filter_encodes_nulls() {
        let wire = AssignmentTarget::group("g1").without_filter().encode().unwrap();
        assert_eq!(wire["assignmentFilterId"], Value::Null);
        assert_eq!(wire["assignmentFilterType"], Value::Null);
    }

    #[test]
    fn test_unset_filter_omitted() {
        let wire = AssignmentTarget::group("g1").encode().unwrap();
        let obj = wire.as_object().unwrap();
        assert!(!obj.contains_key("assignmentFilterId"));
        assert!(!obj.contains_key("assignmentFilterType"));
    }

    #[test]
    fn test_schedule_round_trips() {
        let daily = RunSchedule::Daily {
            interval: 2,
            time: NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
        };
        let wire = daily.encode().unwrap();
        assert_eq!(wire["scheduleType"], "daily");
        assert_eq!(wire["time"], "13:30:00");
        assert_eq!(RunSchedule::decode(&wire).unwrap(), daily);

        let once = RunSchedule::Once {
            start: DateTime::parse_from_rfc3339("2026-01-15T08:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let wire = once.encode().unwrap();
        assert_eq!(RunSchedule::decode(&wire).unwrap(), once);
    }

    #[test]
    fn test_unknown_schedule_round_trip_refused() {
        let decoded =
            RunSchedule::decode(&json!({"scheduleType": "lunar", "phase": "full"})).unwrap();
        assert!(matches!(decoded, RunSchedule::Unknown { .. }));
        assert!(decoded.encode().is_err());
    }

    #[test]
    fn test_scope_filter_round_trip() {
        let filter = ScopeFilter::DeviceFilter {
            rule: "(device.manufacturer -eq \"Dell\")".to_string(),
        };
        let wire = filter.encode().unwrap();
        assert_eq!(wire["filterType"], "deviceFilter");
        assert_eq!(ScopeFilter::decode(&wire).unwrap(), filter);
    }

    #[test]
    fn test_family_registry() {
        let family = VariantFamily::AssignmentTarget;
        assert!(family.is_registered("groupAssignment"));
        assert!(!family.is_registered("mystery"));

        assert!(family
            .ensure_encodable(&json!({"targetType": "allDevices"}))
            .is_ok());
        assert!(family
            .ensure_encodable(&json!({"targetType": "mystery"}))
            .is_err());
        assert!(family.ensure_encodable(&json!("not an object")).is_err());
    }

    #[test]
    fn test_missing_discriminator_is_fatal() {
        let err = AssignmentTarget::decode(&json!({"groupId": "g1"})).unwrap_err();
        assert!(matches!(err, ReconcileError::Fatal { .. }));
    }
}
