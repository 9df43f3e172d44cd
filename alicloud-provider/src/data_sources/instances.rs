//! `alicloud_instances`

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{hash_ids, name_regex};
use crate::client::ProviderClient;
use crate::error::Result;
use crate::resources::string_list;
use crate::schema::validation::{string_in_slice, valid_regex};
use crate::schema::{Attribute, AttributeType, ResourceData, Schema};
use crate::services::{EcsService, tags_to_map};
use crate::traits::DataSource;
use crate::utils::json_path;

const STATUSES: &[&str] = &["Pending", "Starting", "Running", "Stopping", "Stopped"];

pub struct Instances;

/// Request filters the API applies server-side.
fn request_filters(d: &ResourceData) -> Map<String, Value> {
    let mut filters = Map::new();
    let ids = d.get_string_list("ids");
    if !ids.is_empty() {
        filters.insert("InstanceIds".into(), json!(json!(ids).to_string()));
    }
    for (key, param) in [
        ("status", "Status"),
        ("vpc_id", "VpcId"),
        ("vswitch_id", "VSwitchId"),
        ("availability_zone", "ZoneId"),
        ("resource_group_id", "ResourceGroupId"),
    ] {
        if let Some(value) = d.get_str(key) {
            filters.insert(param.into(), json!(value));
        }
    }
    filters
}

fn flatten(instance: &Value) -> Value {
    let field = |path: &str| json_path::get_string(instance, path).unwrap_or_default();
    let mut groups = string_list(
        json_path::get(instance, "SecurityGroupIds.SecurityGroupId").unwrap_or(&Value::Null),
    );
    groups.sort();
    json!({
        "id": field("InstanceId"),
        "name": field("InstanceName"),
        "description": field("Description"),
        "status": field("Status"),
        "instance_type": field("InstanceType"),
        "image_id": field("ImageId"),
        "availability_zone": field("ZoneId"),
        "vpc_id": field("VpcAttributes.VpcId"),
        "vswitch_id": field("VpcAttributes.VSwitchId"),
        "private_ip": field("VpcAttributes.PrivateIpAddress.IpAddress.0"),
        "public_ip": field("PublicIpAddress.IpAddress.0"),
        "instance_charge_type": field("InstanceChargeType"),
        "resource_group_id": field("ResourceGroupId"),
        "security_groups": groups,
        "tags": tags_to_map(json_path::get_array(instance, "Tags.Tag")),
    })
}

/// Shape of one `instances` element, as built by [`flatten`].
fn instance_block() -> AttributeType {
    let text = || AttributeType::String;
    AttributeType::object([
        ("id", text()),
        ("name", text()),
        ("description", text()),
        ("status", text()),
        ("instance_type", text()),
        ("image_id", text()),
        ("availability_zone", text()),
        ("vpc_id", text()),
        ("vswitch_id", text()),
        ("private_ip", text()),
        ("public_ip", text()),
        ("instance_charge_type", text()),
        ("resource_group_id", text()),
        ("security_groups", AttributeType::list(text())),
        ("tags", AttributeType::map(text())),
    ])
}

#[async_trait]
impl DataSource for Instances {
    fn type_name(&self) -> &'static str {
        "alicloud_instances"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute(
                "ids",
                Attribute::optional_computed(AttributeType::list(AttributeType::String)),
            )
            .attribute("name_regex", Attribute::optional(AttributeType::String).validate(valid_regex()))
            .attribute(
                "status",
                Attribute::optional(AttributeType::String).validate(string_in_slice(STATUSES, false)),
            )
            .attribute("vpc_id", Attribute::optional(AttributeType::String))
            .attribute("vswitch_id", Attribute::optional(AttributeType::String))
            .attribute("availability_zone", Attribute::optional(AttributeType::String))
            .attribute("resource_group_id", Attribute::optional(AttributeType::String))
            .attribute("names", Attribute::computed(AttributeType::list(AttributeType::String)))
            .attribute(
                "instances",
                Attribute::computed(AttributeType::list(instance_block())),
            )
    }

    async fn read(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let pattern = name_regex(d)?;
        let described = EcsService::new(client)
            .describe_instances(&request_filters(d))
            .await?;

        let matched: Vec<Value> = described
            .iter()
            .filter(|i| {
                pattern.as_ref().is_none_or(|re| {
                    re.is_match(&json_path::get_string(i, "InstanceName").unwrap_or_default())
                })
            })
            .map(flatten)
            .collect();
        log::debug!("alicloud_instances matched {} of {}", matched.len(), described.len());

        let ids: Vec<String> = matched.iter().filter_map(|i| json_path::get_string(i, "id")).collect();
        let names: Vec<String> = matched
            .iter()
            .filter_map(|i| json_path::get_string(i, "name"))
            .collect();

        d.set_id(hash_ids(&ids));
        d.set("ids", ids);
        d.set("names", names);
        d.set("instances", matched);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Timeouts;

    #[test]
    fn ids_are_sent_as_json_text() {
        let Value::Object(config) = json!({ "ids": ["i-1", "i-2"], "vpc_id": "vpc-1" }) else {
            unreachable!()
        };
        let filters = request_filters(&ResourceData::new(config, Timeouts::default()));
        assert_eq!(filters["InstanceIds"], r#"["i-1","i-2"]"#);
        assert_eq!(filters["VpcId"], "vpc-1");
        assert!(!filters.contains_key("Status"));
    }

    #[test]
    fn flatten_picks_network_fields() {
        let flat = flatten(&json!({
            "InstanceId": "i-1",
            "InstanceName": "web",
            "VpcAttributes": {
                "VpcId": "vpc-1",
                "VSwitchId": "vsw-1",
                "PrivateIpAddress": { "IpAddress": ["10.0.0.5"] }
            },
            "SecurityGroupIds": { "SecurityGroupId": ["sg-2", "sg-1"] },
            "Tags": { "Tag": [{ "TagKey": "env", "TagValue": "prod" }] }
        }));
        assert_eq!(flat["private_ip"], "10.0.0.5");
        assert_eq!(flat["security_groups"], json!(["sg-1", "sg-2"]));
        assert_eq!(flat["tags"]["env"], "prod");
        assert_eq!(flat["public_ip"], "");
        assert_eq!(instance_block().check(&flat), Ok(()));
    }
}
