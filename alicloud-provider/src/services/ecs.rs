//! ECS describe helpers (instances, security groups, tags)

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use super::{PAGE_SIZE, call, not_found, not_found_on, paginate};
use crate::client::{Product, ProviderClient};
use crate::error::{ProviderError, Result};
use crate::identifier::parse_id;
use crate::utils::json_path;
use crate::wait::{Refreshed, status_refresh};

/// Tag key prefixes managed by the vendor, never reported or removed.
const SYSTEM_TAG_PREFIXES: &[&str] = &["aliyun", "acs:", "http://", "https://"];

/// Whether `key` is a vendor-managed tag.
pub fn is_system_tag(key: &str) -> bool {
    SYSTEM_TAG_PREFIXES.iter().any(|p| key.starts_with(p))
}

#[derive(Clone, Copy)]
pub struct EcsService<'a> {
    client: &'a ProviderClient,
}

impl<'a> EcsService<'a> {
    pub fn new(client: &'a ProviderClient) -> Self {
        Self { client }
    }

    fn region(&self) -> &str {
        self.client.region_id()
    }

    async fn rpc(&self, action: &str, params: Value) -> Result<Value> {
        call(self.client.product(Product::Ecs), action, params).await
    }

    /// One instance by id.
    pub async fn describe_instance(&self, id: &str) -> Result<Value> {
        let response = self
            .rpc(
                "DescribeInstances",
                json!({
                    "RegionId": self.region(),
                    // InstanceIds takes a JSON-encoded list
                    "InstanceIds": json!([id]).to_string(),
                }),
            )
            .await
            .map_err(|e| e.context("DescribeInstances", id))?;

        json_path::get_array(&response, "Instances.Instance")
            .iter()
            .find(|i| json_path::get_string(i, "InstanceId").as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| not_found("Instance", id))
    }

    /// Every instance matching `filters` (vendor parameter names), all pages.
    pub async fn describe_instances(&self, filters: &Map<String, Value>) -> Result<Vec<Value>> {
        let api = self.client.product(Product::Ecs);
        paginate("Instances.Instance", |page| {
            let mut params = filters.clone();
            params.insert("RegionId".into(), json!(self.region()));
            params.insert("PageNumber".into(), json!(page));
            params.insert("PageSize".into(), json!(PAGE_SIZE));
            async move { call(api, "DescribeInstances", Value::Object(params)).await }
        })
        .await
        .map_err(|e| e.context("DescribeInstances", ""))
    }

    /// One refresh step for [`crate::wait::StateRefreshConf::wait_for_state`].
    pub async fn instance_state_refresh(&self, id: &str, fail_states: &[&str]) -> Result<Option<Refreshed>> {
        status_refresh(id, self.describe_instance(id).await, "Status", fail_states)
    }

    pub async fn describe_security_group(&self, id: &str) -> Result<Value> {
        let response = self
            .rpc(
                "DescribeSecurityGroupAttribute",
                json!({ "RegionId": self.region(), "SecurityGroupId": id }),
            )
            .await
            .map_err(|e| {
                not_found_on(e, &["InvalidSecurityGroupId.NotFound"], "SecurityGroup", id)
                    .context("DescribeSecurityGroupAttribute", id)
            })?;

        if json_path::get_string(&response, "SecurityGroupId").as_deref() != Some(id) {
            return Err(not_found("SecurityGroup", id));
        }
        Ok(response)
    }

    /// The permission entry identified by
    /// `{group}:{direction}:{protocol}:{port_range}:{nic_type}:{cidr_or_group}:{policy}:{priority}`.
    pub async fn describe_security_group_rule(&self, id: &str) -> Result<Value> {
        let parts = parse_id(id, 8)?;
        let [group_id, direction, ip_protocol, port_range, nic_type, source, policy, priority] =
            parts.as_slice()
        else {
            return Err(ProviderError::InvalidResourceId {
                id: id.to_string(),
                detail: "expected 8 parts".to_string(),
            });
        };

        let response = self
            .rpc(
                "DescribeSecurityGroupAttribute",
                json!({
                    "RegionId": self.region(),
                    "SecurityGroupId": group_id,
                    "Direction": direction,
                    "NicType": nic_type,
                }),
            )
            .await
            .map_err(|e| {
                not_found_on(e, &["InvalidSecurityGroupId.NotFound"], "SecurityGroup", group_id)
                    .context("DescribeSecurityGroupAttribute", id)
            })?;

        json_path::get_array(&response, "Permissions.Permission")
            .iter()
            .find(|rule| {
                let field = |name: &str| json_path::get_string(rule, name).unwrap_or_default();
                field("IpProtocol").eq_ignore_ascii_case(ip_protocol)
                    && field("PortRange") == *port_range
                    && rule_peer(rule, direction) == *source
                    && field("Policy").eq_ignore_ascii_case(policy)
                    && field("Priority") == *priority
            })
            .cloned()
            .ok_or_else(|| not_found("SecurityGroupRule", id))
    }

    /// Adds the instance to each group. Already-joined groups are skipped.
    pub async fn join_security_groups(&self, instance_id: &str, group_ids: &[String]) -> Result<()> {
        for group_id in group_ids {
            let result = self
                .rpc(
                    "JoinSecurityGroup",
                    json!({
                        "RegionId": self.region(),
                        "InstanceId": instance_id,
                        "SecurityGroupId": group_id,
                    }),
                )
                .await;
            match result {
                Ok(_) => {}
                Err(e) if e.code() == Some("InvalidInstanceId.AlreadyExists") => {
                    log::debug!("Instance {instance_id} is already in {group_id}");
                }
                Err(e) => return Err(e.context("JoinSecurityGroup", instance_id)),
            }
        }
        Ok(())
    }

    /// Removes the instance from each group. Missing groups are skipped.
    pub async fn leave_security_groups(&self, instance_id: &str, group_ids: &[String]) -> Result<()> {
        for group_id in group_ids {
            let result = self
                .rpc(
                    "LeaveSecurityGroup",
                    json!({
                        "RegionId": self.region(),
                        "InstanceId": instance_id,
                        "SecurityGroupId": group_id,
                    }),
                )
                .await;
            match result {
                Ok(_) => {}
                Err(e) if e.code() == Some("InvalidSecurityGroupId.NotFound") => {
                    log::debug!("Security group {group_id} is already gone");
                }
                Err(e) => return Err(e.context("LeaveSecurityGroup", instance_id)),
            }
        }
        Ok(())
    }

    /// Applies the difference between `old` and `new` user tags.
    pub async fn set_instance_tags(
        &self,
        instance_id: &str,
        old: &BTreeMap<String, String>,
        new: &BTreeMap<String, String>,
    ) -> Result<()> {
        let (added, removed) = diff_tags(old, new);

        if !removed.is_empty() {
            self.rpc(
                "UntagResources",
                json!({
                    "RegionId": self.region(),
                    "ResourceType": "instance",
                    "ResourceId": [instance_id],
                    "TagKey": removed,
                }),
            )
            .await
            .map_err(|e| e.context("UntagResources", instance_id))?;
        }

        if !added.is_empty() {
            let tags: Vec<Value> = added
                .iter()
                .map(|(k, v)| json!({ "Key": k, "Value": v }))
                .collect();
            self.rpc(
                "TagResources",
                json!({
                    "RegionId": self.region(),
                    "ResourceType": "instance",
                    "ResourceId": [instance_id],
                    "Tag": tags,
                }),
            )
            .await
            .map_err(|e| e.context("TagResources", instance_id))?;
        }
        Ok(())
    }
}

/// The CIDR or security group the rule points at, depending on direction.
fn rule_peer(rule: &Value, direction: &str) -> String {
    let (cidr, group) = if direction == "egress" {
        ("DestCidrIp", "DestGroupId")
    } else {
        ("SourceCidrIp", "SourceGroupId")
    };
    json_path::get_string(rule, cidr)
        .filter(|s| !s.is_empty())
        .or_else(|| json_path::get_string(rule, group))
        .unwrap_or_default()
}

/// `(added_or_changed, removed_keys)` between two tag maps, system tags excluded.
pub fn diff_tags(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, Vec<String>) {
    let removed = old
        .keys()
        .filter(|k| !new.contains_key(*k) && !is_system_tag(k))
        .cloned()
        .collect();
    let added = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v) && !is_system_tag(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    (added, removed)
}

/// `Tags.Tag` entries (`TagKey`/`TagValue`) as a map, without vendor tags.
pub fn tags_to_map(tags: &[Value]) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|t| {
            let key = json_path::get_string(t, "TagKey")?;
            let value = json_path::get_string(t, "TagValue").unwrap_or_default();
            (!is_system_tag(&key)).then_some((key, value))
        })
        .collect()
}
