use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{TimeoutKind, Timeouts};
use crate::utils::json_path::scalar_to_string;

/// Identifier plus attributes, as persisted by the hosting tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: String,
    pub attributes: Map<String, Value>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }
}

/// Working view of one resource instance during a handler call.
///
/// `prior` is the last persisted state (empty on create); `planned` starts as
/// the desired configuration and is overwritten by handlers as they learn the
/// vendor's values. The planned map becomes the new state.
#[derive(Debug, Clone)]
pub struct ResourceData {
    id: String,
    prior: Map<String, Value>,
    planned: Map<String, Value>,
    is_new: bool,
    timeouts: Timeouts,
}

impl ResourceData {
    /// Data for a create call.
    pub fn new(config: Map<String, Value>, timeouts: Timeouts) -> Self {
        Self {
            id: String::new(),
            prior: Map::new(),
            planned: config,
            is_new: true,
            timeouts,
        }
    }

    /// Data for read and delete calls.
    pub fn from_state(state: ResourceState, timeouts: Timeouts) -> Self {
        Self {
            id: state.id,
            prior: state.attributes.clone(),
            planned: state.attributes,
            is_new: false,
            timeouts,
        }
    }

    /// Data for an update call.
    pub fn for_update(prior: ResourceState, planned: Map<String, Value>, timeouts: Timeouts) -> Self {
        Self {
            id: prior.id,
            prior: prior.attributes,
            planned,
            is_new: false,
            timeouts,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Marks the resource as gone.
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    /// True while the create handler (and the read it ends with) runs.
    pub fn is_new_resource(&self) -> bool {
        self.is_new
    }

    pub fn timeout(&self, kind: TimeoutKind) -> Duration {
        self.timeouts.get(kind)
    }

    /// Planned value, `None` when unset or `null`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.planned.get(key).filter(|v| !v.is_null())
    }

    /// Non-empty string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// String value, `""` when unset.
    pub fn get_string(&self, key: &str) -> String {
        self.get_str(key).unwrap_or_default().to_string()
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Boolean value, `false` when unset.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_list(&self, key: &str) -> &[Value] {
        match self.get(key) {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get_list(key)
            .iter()
            .filter_map(scalar_to_string)
            .collect()
    }

    pub fn get_string_map(&self, key: &str) -> BTreeMap<String, String> {
        match self.get(key) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| scalar_to_string(v).map(|v| (k.clone(), v)))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.planned.insert(key.to_string(), value.into());
    }

    /// Sets `key` when `value` is `Some`, leaves it untouched otherwise.
    pub fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    /// Prior and planned values differ.
    pub fn has_change(&self, key: &str) -> bool {
        let (old, new) = self.get_change(key);
        old != new
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(k))
    }

    /// `(prior, planned)`, with `Value::Null` for unset.
    pub fn get_change(&self, key: &str) -> (Value, Value) {
        let pick = |map: &Map<String, Value>| map.get(key).cloned().unwrap_or(Value::Null);
        (pick(&self.prior), pick(&self.planned))
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.planned
    }

    pub fn into_state(self) -> ResourceState {
        ResourceState {
            id: self.id,
            attributes: self.planned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn typed_getters() {
        let d = ResourceData::new(
            map(json!({
                "name": "web",
                "empty": "",
                "ttl": 600,
                "enabled": true,
                "groups": ["sg-1", "sg-2"],
                "tags": { "env": "prod", "tier": 1 }
            })),
            Timeouts::default(),
        );
        assert_eq!(d.get_str("name"), Some("web"));
        assert_eq!(d.get_str("empty"), None);
        assert_eq!(d.get_string("missing"), "");
        assert_eq!(d.get_i64("ttl"), Some(600));
        assert!(d.get_bool("enabled"));
        assert!(!d.get_bool("missing"));
        assert_eq!(d.get_string_list("groups"), vec!["sg-1", "sg-2"]);
        assert_eq!(
            d.get_string_map("tags").get("tier").map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn change_tracking() {
        let prior = ResourceState::new("vpc-1", map(json!({ "name": "a", "description": "x" })));
        let d = ResourceData::for_update(
            prior,
            map(json!({ "name": "b", "description": "x" })),
            Timeouts::default(),
        );
        assert!(d.has_change("name"));
        assert!(!d.has_change("description"));
        assert!(d.has_changes(&["description", "name"]));
        assert_eq!(d.get_change("name"), (json!("a"), json!("b")));
        assert_eq!(d.get_change("other"), (Value::Null, Value::Null));
    }

    #[test]
    fn state_round_trip_has_no_changes() {
        let state = ResourceState::new("i-1", map(json!({ "status": "Running" })));
        let d = ResourceData::from_state(state.clone(), Timeouts::default());
        assert!(!d.has_change("status"));
        assert!(!d.is_new_resource());
        assert_eq!(d.into_state(), state);
    }

    #[test]
    fn clear_id_empties_state_id() {
        let mut d = ResourceData::new(Map::new(), Timeouts::default());
        assert!(d.is_new_resource());
        d.set_id("rec-1");
        d.set("ttl", 60);
        d.set_opt::<String>("remark", None);
        assert_eq!(d.id(), "rec-1");
        d.clear_id();
        let state = d.into_state();
        assert!(state.id.is_empty());
        assert_eq!(state.attributes.get("ttl"), Some(&json!(60)));
        assert!(!state.attributes.contains_key("remark"));
    }
}
