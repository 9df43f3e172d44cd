//! Managed resource types
//!
//! Each handler follows the same shape: Create issues the vendor create call,
//! records the id, waits for the object to settle and ends with Read. Read
//! maps the described object back onto attributes. Update touches only the
//! fields that changed. Delete tolerates an already-missing object and waits
//! for it to disappear.

mod alidns_domain;
mod alidns_record;
mod datahub_project;
mod instance;
mod network_acl_entries;
mod security_group_rule;
mod service_linked_role;
mod vpc;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::schema::ResourceData;
use crate::traits::Resource;
use crate::utils::json_path::scalar_to_string;

pub use alidns_domain::AlidnsDomain;
pub use alidns_record::AlidnsRecord;
pub use datahub_project::DatahubProject;
pub use instance::Instance;
pub use network_acl_entries::NetworkAclEntries;
pub use security_group_rule::SecurityGroupRule;
pub use service_linked_role::ServiceLinkedRole;
pub use vpc::Vpc;

/// Every resource type this crate implements.
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(Instance),
        Arc::new(SecurityGroupRule),
        Arc::new(Vpc),
        Arc::new(NetworkAclEntries),
        Arc::new(AlidnsDomain),
        Arc::new(AlidnsRecord),
        Arc::new(DatahubProject),
        Arc::new(ServiceLinkedRole),
    ]
}

/// Read-handler rule for a failed describe: an existing resource whose object
/// is gone is dropped from state; anything else is an error.
pub(crate) fn clear_if_gone(d: &mut ResourceData, err: ProviderError) -> Result<()> {
    if err.is_not_found() && !d.is_new_resource() {
        log::warn!("'{}' no longer exists, removing it from state: {err}", d.id());
        d.clear_id();
        return Ok(());
    }
    Err(err)
}

/// Delete-handler rule: a missing object means the work is already done.
pub(crate) fn ignore_not_found(result: Result<Value>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => {
            log::debug!("Already gone: {e}");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub(crate) fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn string_map(value: &Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| scalar_to_string(v).map(|v| (k.clone(), v)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// `(added, removed)` between two string sets.
pub(crate) fn set_difference(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old: BTreeSet<&String> = old.iter().collect();
    let new: BTreeSet<&String> = new.iter().collect();
    (
        new.difference(&old).map(|s| (*s).clone()).collect(),
        old.difference(&new).map(|s| (*s).clone()).collect(),
    )
}
