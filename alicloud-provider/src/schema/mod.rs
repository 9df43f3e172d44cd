//! Schema - attribute declarations for resources and data sources
//!
//! A [`Schema`] lists every attribute a type accepts or reports, together with
//! its type, mutability, validation and diff behaviour. The provider uses it to
//! check configurations before any handler runs and to decide whether an
//! update can be applied in place.

mod data;
pub mod validation;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{ProviderError, Result};

pub use data::{ResourceData, ResourceState};

/// Attribute value predicate. `Err` carries a human readable reason.
pub type Validator = Arc<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>;

/// Returns `true` when the change from `old` to `new` is not a real change.
/// `planned` is the full planned attribute map, for rules that depend on
/// sibling attributes.
pub type DiffSuppressFn =
    fn(key: &str, old: &Value, new: &Value, planned: &Map<String, Value>) -> bool;

/// Attribute type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Int,
    Bool,
    List(Box<AttributeType>),
    /// Unordered, duplicates removed.
    Set(Box<AttributeType>),
    /// String keys.
    Map(Box<AttributeType>),
    /// Nested block with a fixed set of keys, each optional.
    Object(BTreeMap<&'static str, AttributeType>),
}

impl AttributeType {
    pub fn list(inner: Self) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn set(inner: Self) -> Self {
        Self::Set(Box::new(inner))
    }

    pub fn map(inner: Self) -> Self {
        Self::Map(Box::new(inner))
    }

    pub fn object<const N: usize>(fields: [(&'static str, Self); N]) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    /// Check if a value conforms to this type
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        match (self, value) {
            (Self::String, Value::String(_)) | (Self::Bool, Value::Bool(_)) => Ok(()),
            (Self::Int, Value::Number(n)) if n.is_i64() => Ok(()),
            (Self::List(inner) | Self::Set(inner), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner
                        .check(item)
                        .map_err(|e| format!("item at index {i}: {e}"))?;
                }
                Ok(())
            }
            (Self::Map(inner), Value::Object(map)) => {
                for (k, v) in map {
                    inner
                        .check(v)
                        .map_err(|e| format!("value for key '{k}': {e}"))?;
                }
                Ok(())
            }
            (Self::Object(fields), Value::Object(map)) => {
                for (k, v) in map {
                    let Some(field) = fields.get(k.as_str()) else {
                        return Err(format!("unknown key '{k}'"));
                    };
                    if !v.is_null() {
                        field
                            .check(v)
                            .map_err(|e| format!("value for key '{k}': {e}"))?;
                    }
                }
                Ok(())
            }
            _ => Err(format!(
                "expected {self}, got {}",
                json_type_name(value)
            )),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("String"),
            Self::Int => f.write_str("Int"),
            Self::Bool => f.write_str("Bool"),
            Self::List(inner) => write!(f, "List<{inner}>"),
            Self::Set(inner) => write!(f, "Set<{inner}>"),
            Self::Map(inner) => write!(f, "Map<{inner}>"),
            Self::Object(fields) => {
                f.write_str("Object{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_i64() => "Int",
        Value::Number(_) => "Float",
        Value::String(_) => "String",
        Value::Array(_) => "List",
        Value::Object(_) => "Map",
    }
}

/// Who sets the attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Required,
    Optional,
    /// Reported by the vendor only; never accepted from configuration.
    Computed,
    /// Optional in configuration, reported by the vendor when omitted.
    OptionalComputed,
}

impl Mutability {
    pub fn is_computed(self) -> bool {
        matches!(self, Self::Computed | Self::OptionalComputed)
    }
}

/// One attribute declaration.
#[derive(Clone)]
pub struct Attribute {
    pub ty: AttributeType,
    pub mutability: Mutability,
    /// Changing the value requires replacing the resource.
    pub force_new: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub validate: Option<Validator>,
    pub diff_suppress: Option<DiffSuppressFn>,
    pub deprecated: Option<&'static str>,
    pub description: &'static str,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("ty", &self.ty)
            .field("mutability", &self.mutability)
            .field("force_new", &self.force_new)
            .field("sensitive", &self.sensitive)
            .field("default", &self.default)
            .field("deprecated", &self.deprecated)
            .finish_non_exhaustive()
    }
}

impl Attribute {
    fn new(ty: AttributeType, mutability: Mutability) -> Self {
        Self {
            ty,
            mutability,
            force_new: false,
            sensitive: false,
            default: None,
            validate: None,
            diff_suppress: None,
            deprecated: None,
            description: "",
        }
    }

    pub fn required(ty: AttributeType) -> Self {
        Self::new(ty, Mutability::Required)
    }

    pub fn optional(ty: AttributeType) -> Self {
        Self::new(ty, Mutability::Optional)
    }

    pub fn computed(ty: AttributeType) -> Self {
        Self::new(ty, Mutability::Computed)
    }

    pub fn optional_computed(ty: AttributeType) -> Self {
        Self::new(ty, Mutability::OptionalComputed)
    }

    #[must_use]
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn validate(mut self, validator: Validator) -> Self {
        self.validate = Some(validator);
        self
    }

    #[must_use]
    pub fn diff_suppress(mut self, f: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(f);
        self
    }

    #[must_use]
    pub fn deprecated(mut self, message: &'static str) -> Self {
        self.deprecated = Some(message);
        self
    }

    #[must_use]
    pub fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

/// Which handler a timeout applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Create,
    Read,
    Update,
    Delete,
}

/// Per-operation deadlines, used by retry and wait loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        let twenty_minutes = Duration::from_secs(20 * 60);
        Self {
            create: twenty_minutes,
            read: twenty_minutes,
            update: twenty_minutes,
            delete: twenty_minutes,
        }
    }
}

impl Timeouts {
    pub fn get(&self, kind: TimeoutKind) -> Duration {
        match kind {
            TimeoutKind::Create => self.create,
            TimeoutKind::Read => self.read,
            TimeoutKind::Update => self.update,
            TimeoutKind::Delete => self.delete,
        }
    }

    #[must_use]
    pub fn with(mut self, kind: TimeoutKind, value: Duration) -> Self {
        match kind {
            TimeoutKind::Create => self.create = value,
            TimeoutKind::Read => self.read = value,
            TimeoutKind::Update => self.update = value,
            TimeoutKind::Delete => self.delete = value,
        }
        self
    }
}

/// Attribute declarations of one resource or data source type.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    attributes: BTreeMap<&'static str, Attribute>,
    timeouts: Timeouts,
}

fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn attribute(mut self, name: &'static str, attribute: Attribute) -> Self {
        self.attributes.insert(name, attribute);
        self
    }

    #[must_use]
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&'static str, &Attribute)> {
        self.attributes.iter().map(|(name, attr)| (*name, attr))
    }

    pub fn default_timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Checks a user configuration against the declarations.
    pub fn validate_config(&self, config: &Map<String, Value>) -> Result<()> {
        let invalid = |param: &str, detail: String| ProviderError::InvalidParameter {
            param: param.to_string(),
            detail,
        };

        for (name, value) in config {
            if value.is_null() {
                continue;
            }
            let Some(attr) = self.attributes.get(name.as_str()) else {
                return Err(invalid(name, "unknown attribute".to_string()));
            };
            if attr.mutability == Mutability::Computed {
                return Err(invalid(
                    name,
                    "attribute is computed and cannot be set".to_string(),
                ));
            }
            attr.ty.check(value).map_err(|e| invalid(name, e))?;
            if let Some(validate) = &attr.validate {
                validate(value).map_err(|e| invalid(name, e))?;
            }
            if let Some(message) = attr.deprecated {
                log::warn!("Attribute '{name}' is deprecated: {message}");
            }
        }

        for (name, attr) in &self.attributes {
            if attr.mutability == Mutability::Required
                && attr.default.is_none()
                && present(config, name).is_none()
            {
                return Err(invalid(name, "attribute is required".to_string()));
            }
        }
        Ok(())
    }

    /// Fills unset attributes that declare a default.
    pub fn apply_defaults(&self, config: &mut Map<String, Value>) {
        for (name, attr) in &self.attributes {
            if let Some(default) = &attr.default
                && present(config, name).is_none()
            {
                config.insert((*name).to_string(), default.clone());
            }
        }
    }

    /// Sorts and de-duplicates `Set` attributes so equal sets compare equal.
    pub fn normalize(&self, attributes: &mut Map<String, Value>) {
        for (name, attr) in &self.attributes {
            if let AttributeType::Set(_) = attr.ty
                && let Some(Value::Array(items)) = attributes.get_mut(*name)
            {
                items.sort_by_key(ToString::to_string);
                items.dedup();
            }
        }
    }

    /// Copies computed values the configuration leaves unset from prior state.
    pub fn carry_computed(&self, prior: &Map<String, Value>, planned: &mut Map<String, Value>) {
        for (name, attr) in &self.attributes {
            if attr.mutability.is_computed()
                && present(planned, name).is_none()
                && let Some(value) = present(prior, name)
            {
                planned.insert((*name).to_string(), value.clone());
            }
        }
    }

    /// Restores prior values where the attribute's diff-suppress rule says the
    /// change is not real.
    pub fn suppress_diffs(&self, prior: &Map<String, Value>, planned: &mut Map<String, Value>) {
        for (name, attr) in &self.attributes {
            let Some(suppress) = attr.diff_suppress else {
                continue;
            };
            let old = prior.get(*name).cloned().unwrap_or(Value::Null);
            let new = planned.get(*name).cloned().unwrap_or(Value::Null);
            if old != new && suppress(name, &old, &new, planned) {
                log::debug!("Suppressing diff on '{name}'");
                planned.insert((*name).to_string(), old);
            }
        }
    }

    /// Force-new attributes whose planned value differs from prior state.
    pub fn replacement_attributes(
        &self,
        prior: &Map<String, Value>,
        planned: &Map<String, Value>,
    ) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(_, attr)| attr.force_new)
            .filter(|(name, _)| present(prior, name) != present(planned, name))
            .map(|(name, _)| (*name).to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn sample_schema() -> Schema {
        Schema::new()
            .attribute(
                "name",
                Attribute::required(AttributeType::String).force_new(),
            )
            .attribute(
                "ttl",
                Attribute::optional(AttributeType::Int)
                    .default(600)
                    .validate(validation::int_between(1, 86_400)),
            )
            .attribute(
                "tags",
                Attribute::optional(AttributeType::map(AttributeType::String)),
            )
            .attribute(
                "security_groups",
                Attribute::optional(AttributeType::set(AttributeType::String)),
            )
            .attribute("status", Attribute::computed(AttributeType::String))
            .attribute(
                "old_name",
                Attribute::optional(AttributeType::String).deprecated("use 'name'"),
            )
    }

    #[test]
    fn type_check_nested() {
        let ty = AttributeType::list(AttributeType::map(AttributeType::String));
        assert!(ty.check(&json!([{ "a": "b" }])).is_ok());
        let err = ty.check(&json!([{ "a": 1 }]));
        assert_eq!(
            err,
            Err("item at index 0: value for key 'a': expected String, got Int".to_string())
        );
    }

    #[test]
    fn type_check_object_block() {
        let ty = AttributeType::list(AttributeType::object([
            ("name", AttributeType::String),
            ("ports", AttributeType::list(AttributeType::Int)),
        ]));
        assert!(ty.check(&json!([{ "name": "a", "ports": [80, 443] }])).is_ok());
        assert!(ty.check(&json!([{ "name": "a" }])).is_ok());
        assert_eq!(
            ty.check(&json!([{ "nmae": "a" }])),
            Err("item at index 0: unknown key 'nmae'".to_string())
        );
        assert_eq!(
            ty.to_string(),
            "List<Object{name: String, ports: List<Int>}>"
        );
    }

    #[test]
    fn null_counts_as_unset() {
        let schema = sample_schema();
        let config = as_map(json!({ "name": null }));
        assert!(schema.validate_config(&config).is_err());

        let mut config = as_map(json!({ "name": "a", "ttl": null }));
        schema.apply_defaults(&mut config);
        assert_eq!(config.get("ttl"), Some(&json!(600)));
    }

    #[test]
    fn int_rejects_float() {
        assert!(AttributeType::Int.check(&json!(1.5)).is_err());
        assert!(AttributeType::Int.check(&json!(-3)).is_ok());
    }

    #[test]
    fn validate_ok() {
        let config = as_map(json!({ "name": "a", "ttl": 60, "tags": { "env": "dev" } }));
        assert!(sample_schema().validate_config(&config).is_ok());
    }

    #[test]
    fn validate_missing_required() {
        let err = sample_schema().validate_config(&as_map(json!({ "ttl": 60 })));
        assert!(matches!(
            err,
            Err(ProviderError::InvalidParameter { ref param, .. }) if param == "name"
        ));
    }

    #[test]
    fn validate_unknown_attribute() {
        let err = sample_schema().validate_config(&as_map(json!({ "name": "a", "nope": 1 })));
        assert!(matches!(
            err,
            Err(ProviderError::InvalidParameter { ref param, .. }) if param == "nope"
        ));
    }

    #[test]
    fn validate_computed_only_rejected() {
        let err =
            sample_schema().validate_config(&as_map(json!({ "name": "a", "status": "Running" })));
        assert!(matches!(
            err,
            Err(ProviderError::InvalidParameter { ref param, .. }) if param == "status"
        ));
    }

    #[test]
    fn validate_runs_validator() {
        let err = sample_schema().validate_config(&as_map(json!({ "name": "a", "ttl": 0 })));
        assert!(matches!(
            err,
            Err(ProviderError::InvalidParameter { ref param, .. }) if param == "ttl"
        ));
    }

    #[test]
    fn deprecated_attribute_still_accepted() {
        let config = as_map(json!({ "name": "a", "old_name": "b" }));
        assert!(sample_schema().validate_config(&config).is_ok());
    }

    #[test]
    fn defaults_fill_only_missing() {
        let schema = sample_schema();
        let mut config = as_map(json!({ "name": "a" }));
        schema.apply_defaults(&mut config);
        assert_eq!(config.get("ttl"), Some(&json!(600)));

        let mut config = as_map(json!({ "name": "a", "ttl": 30 }));
        schema.apply_defaults(&mut config);
        assert_eq!(config.get("ttl"), Some(&json!(30)));
    }

    #[test]
    fn sets_normalized() {
        let mut attrs = as_map(json!({ "security_groups": ["sg-2", "sg-1", "sg-2"] }));
        sample_schema().normalize(&mut attrs);
        assert_eq!(attrs.get("security_groups"), Some(&json!(["sg-1", "sg-2"])));
    }

    #[test]
    fn replacement_only_for_force_new() {
        let schema = sample_schema();
        let prior = as_map(json!({ "name": "a", "ttl": 600 }));
        let planned = as_map(json!({ "name": "b", "ttl": 60 }));
        assert_eq!(schema.replacement_attributes(&prior, &planned), vec!["name"]);

        let planned = as_map(json!({ "name": "a", "ttl": 60 }));
        assert!(schema.replacement_attributes(&prior, &planned).is_empty());
    }

    #[test]
    fn computed_values_carried_over() {
        let schema = sample_schema();
        let prior = as_map(json!({ "name": "a", "status": "Running" }));
        let mut planned = as_map(json!({ "name": "a" }));
        schema.carry_computed(&prior, &mut planned);
        assert_eq!(planned.get("status"), Some(&json!("Running")));
    }

    #[test]
    fn suppressed_diff_keeps_prior() {
        fn ignore_case(_: &str, old: &Value, new: &Value, _: &Map<String, Value>) -> bool {
            match (old.as_str(), new.as_str()) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            }
        }
        let schema = Schema::new().attribute(
            "policy",
            Attribute::optional(AttributeType::String).diff_suppress(ignore_case),
        );
        let prior = as_map(json!({ "policy": "Accept" }));
        let mut planned = as_map(json!({ "policy": "accept" }));
        schema.suppress_diffs(&prior, &mut planned);
        assert_eq!(planned.get("policy"), Some(&json!("Accept")));

        let mut planned = as_map(json!({ "policy": "drop" }));
        schema.suppress_diffs(&prior, &mut planned);
        assert_eq!(planned.get("policy"), Some(&json!("drop")));
    }

    #[test]
    fn timeouts_override() {
        let t = Timeouts::default().with(TimeoutKind::Delete, Duration::from_secs(60));
        assert_eq!(t.get(TimeoutKind::Delete), Duration::from_secs(60));
        assert_eq!(t.get(TimeoutKind::Create), Duration::from_secs(1200));
    }
}
