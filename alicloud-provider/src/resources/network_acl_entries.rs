//! `alicloud_network_acl_entries`: the custom entries of one ACL direction
//!
//! Id: `{network_acl_id}:{direction}`. The whole list is replaced on every
//! write; deleting the resource empties that direction.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::clear_if_gone;
use crate::client::{Product, ProviderClient};
use crate::error::Result;
use crate::identifier::build_id;
use crate::retry::{retry, retry_on};
use crate::schema::validation::string_in_slice;
use crate::schema::{Attribute, AttributeType, ResourceData, Schema, TimeoutKind};
use crate::services::{AclDirection, VpcService, parse_acl_entries_id};
use crate::traits::Resource;
use crate::utils::json_path;
use crate::wait::StateRefreshConf;

const RETRY_CODES: &[&str] = &[
    "OperationConflict",
    "IncorrectStatus",
    "IncorrectStatus.NetworkAcl",
    "LastTokenProcessing",
    "TaskConflict",
];

/// `(attribute key, ingress parameter, egress parameter)` of one entry.
const ENTRY_FIELDS: [(&str, &str, &str); 6] = [
    ("entry_name", "NetworkAclEntryName", "NetworkAclEntryName"),
    ("description", "Description", "Description"),
    ("policy", "Policy", "Policy"),
    ("protocol", "Protocol", "Protocol"),
    ("port", "Port", "Port"),
    ("cidr_ip", "SourceCidrIp", "DestinationCidrIp"),
];

pub struct NetworkAclEntries;

fn field_name(direction: AclDirection, ingress: &'static str, egress: &'static str) -> &'static str {
    match direction {
        AclDirection::Ingress => ingress,
        AclDirection::Egress => egress,
    }
}

/// Entry maps from configuration to request objects.
fn entries_to_request(direction: AclDirection, entries: &[Value]) -> Vec<Value> {
    entries
        .iter()
        .map(|entry| {
            let mut out = Map::new();
            out.insert("EntryType".into(), json!("custom"));
            for &(key, ingress, egress) in &ENTRY_FIELDS {
                if let Some(value) = json_path::get_string(entry, key).filter(|s| !s.is_empty()) {
                    out.insert(field_name(direction, ingress, egress).into(), json!(value));
                }
            }
            Value::Object(out)
        })
        .collect()
}

/// Described entries back to attribute maps.
fn entries_from_response(direction: AclDirection, entries: &[Value]) -> Vec<Value> {
    entries
        .iter()
        .map(|entry| {
            let mut out = Map::new();
            for &(key, ingress, egress) in &ENTRY_FIELDS {
                let value = json_path::get_string(entry, field_name(direction, ingress, egress))
                    .unwrap_or_default();
                out.insert(key.to_string(), json!(value));
            }
            Value::Object(out)
        })
        .collect()
}

/// Entries with every field present, unset ones as `""`, so configured and
/// described lists compare equal.
fn normalized(entries: &Value) -> Vec<Value> {
    let Value::Array(entries) = entries else {
        return Vec::new();
    };
    entries
        .iter()
        .map(|entry| {
            let out: Map<String, Value> = ENTRY_FIELDS
                .iter()
                .map(|&(key, _, _)| {
                    let value = json_path::get_string(entry, key).unwrap_or_default();
                    (key.to_string(), json!(value))
                })
                .collect();
            Value::Object(out)
        })
        .collect()
}

impl NetworkAclEntries {
    async fn write(
        acl_id: &str,
        direction: AclDirection,
        entries: &[Value],
        d: &ResourceData,
        kind: TimeoutKind,
        client: &ProviderClient,
    ) -> Result<()> {
        let mut params = json!({
            "RegionId": client.region_id(),
            "NetworkAclId": acl_id,
            "ClientToken": uuid::Uuid::new_v4().to_string(),
        });
        params[direction.update_flag()] = json!(true);
        params[direction.request_key()] = Value::Array(entries_to_request(direction, entries));

        let api = client.product(Product::Vpc);
        retry(d.timeout(kind), || {
            let params = params.clone();
            async move {
                api.rpc("UpdateNetworkAclEntries", params)
                    .await
                    .map_err(|e| retry_on(e, RETRY_CODES))
            }
        })
        .await
        .map_err(|e| e.context("UpdateNetworkAclEntries", acl_id))?;

        let service = VpcService::new(client);
        StateRefreshConf::new(&["Modifying"], &["Available"], d.timeout(kind))
            .wait_for_state(acl_id, || service.network_acl_state_refresh(acl_id, &[]))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for NetworkAclEntries {
    fn type_name(&self) -> &'static str {
        "alicloud_network_acl_entries"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute("network_acl_id", Attribute::required(AttributeType::String).force_new())
            .attribute(
                "direction",
                Attribute::required(AttributeType::String)
                    .validate(string_in_slice(&["ingress", "egress"], false))
                    .force_new(),
            )
            .attribute(
                "entries",
                Attribute::required(AttributeType::list(AttributeType::object(
                    ENTRY_FIELDS.map(|(key, _, _)| (key, AttributeType::String)),
                )))
                .description("Ordered custom entries of the direction"),
            )
    }

    async fn create(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let acl_id = d.get_string("network_acl_id");
        let direction = d.get_string("direction");
        let id = build_id(&[acl_id.as_str(), direction.as_str()]);
        let (_, direction) = parse_acl_entries_id(&id)?;

        let entries = d.get_list("entries").to_vec();
        Self::write(&acl_id, direction, &entries, d, TimeoutKind::Create, client).await?;
        d.set_id(id);

        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let (acl_id, direction) = parse_acl_entries_id(d.id())?;
        let entries = match VpcService::new(client).describe_network_acl_entries(d.id()).await {
            Ok(entries) => entries,
            Err(e) => return clear_if_gone(d, e),
        };

        d.set("network_acl_id", acl_id);
        d.set("direction", direction.as_str());
        d.set("entries", entries_from_response(direction, &entries));
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let (old, new) = d.get_change("entries");
        if normalized(&old) != normalized(&new) {
            let (acl_id, direction) = parse_acl_entries_id(d.id())?;
            let entries = d.get_list("entries").to_vec();
            Self::write(&acl_id, direction, &entries, d, TimeoutKind::Update, client).await?;
        }
        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let (acl_id, direction) = parse_acl_entries_id(d.id())?;
        match Self::write(&acl_id, direction, &[], d, TimeoutKind::Delete, client).await {
            Err(e) if e.code() == Some("InvalidNetworkAcl.NotFound") || e.is_not_found() => {
                log::debug!("Network ACL {acl_id} is already gone");
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn egress_entries_use_destination_cidr() {
        let entries = vec![json!({
            "entry_name": "web",
            "policy": "accept",
            "protocol": "tcp",
            "port": "80/80",
            "cidr_ip": "0.0.0.0/0",
            "description": ""
        })];
        let request = entries_to_request(AclDirection::Egress, &entries);
        assert_eq!(request[0]["DestinationCidrIp"], "0.0.0.0/0");
        assert_eq!(request[0]["EntryType"], "custom");
        assert!(request[0].get("SourceCidrIp").is_none());
        assert!(request[0].get("Description").is_none());
    }

    #[test]
    fn unset_entry_fields_compare_as_empty() {
        let configured = json!([{
            "entry_name": "web",
            "policy": "accept",
            "protocol": "tcp",
            "port": "80/80",
            "cidr_ip": "0.0.0.0/0"
        }]);
        let described = json!([{
            "entry_name": "web",
            "description": "",
            "policy": "accept",
            "protocol": "tcp",
            "port": "80/80",
            "cidr_ip": "0.0.0.0/0"
        }]);
        assert_eq!(normalized(&configured), normalized(&described));

        let moved = json!([{ "entry_name": "web", "port": "443/443" }]);
        assert_ne!(normalized(&moved), normalized(&described));
        assert!(normalized(&Value::Null).is_empty());
    }

    #[test]
    fn entries_schema_rejects_unknown_keys() {
        let schema = NetworkAclEntries.schema();
        let config = json!({
            "network_acl_id": "nacl-1",
            "direction": "ingress",
            "entries": [{ "entry_name": "web", "source_cidr": "0.0.0.0/0" }]
        });
        let Value::Object(config) = config else { unreachable!() };
        assert!(schema.validate_config(&config).is_err());
    }

    #[test]
    fn response_round_trips_to_attributes() {
        let described = vec![json!({
            "NetworkAclEntryName": "ssh",
            "Policy": "accept",
            "Protocol": "tcp",
            "Port": "22/22",
            "SourceCidrIp": "10.0.0.0/8",
            "Description": "admin",
            "EntryType": "custom"
        })];
        let attrs = entries_from_response(AclDirection::Ingress, &described);
        assert_eq!(attrs[0]["cidr_ip"], "10.0.0.0/8");
        assert_eq!(attrs[0]["entry_name"], "ssh");
        assert_eq!(attrs[0]["port"], "22/22");
    }
}
