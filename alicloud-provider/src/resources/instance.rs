//! `alicloud_instance`: ECS instance lifecycle

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{clear_if_gone, set_difference, string_list, string_map};
use crate::client::{Product, ProviderClient};
use crate::error::{ProviderError, Result};
use crate::retry::{retry, retry_on};
use crate::schema::validation::{int_between, string_does_not_start_with, string_in_slice, string_len_between};
use crate::schema::{Attribute, AttributeType, ResourceData, Schema, TimeoutKind};
use crate::services::{EcsService, tags_to_map};
use crate::traits::Resource;
use crate::utils::json_path;
use crate::wait::StateRefreshConf;

const CREATE_RETRY_CODES: &[&str] = &["IncorrectVSwitchStatus", "OperationConflict"];
const MODIFY_RETRY_CODES: &[&str] = &["IncorrectInstanceStatus", "OperationConflict"];
const DELETE_RETRY_CODES: &[&str] = &[
    "IncorrectInstanceStatus",
    "IncorrectInstanceStatus.Initializing",
    "DependencyViolation.RouteEntry",
    "LastTokenProcessing",
];

/// Attributes sent through `ModifyInstanceAttribute`, with their parameter names.
const MODIFIABLE: &[(&str, &str)] = &[
    ("instance_name", "InstanceName"),
    ("description", "Description"),
    ("host_name", "HostName"),
    ("password", "Password"),
    ("deletion_protection", "DeletionProtection"),
];

pub struct Instance;

impl Instance {
    /// Stops the instance, waits for `Stopped`, starts it and waits for `Running`.
    async fn restart(id: &str, d: &ResourceData, client: &ProviderClient) -> Result<()> {
        let ecs = client.product(Product::Ecs);
        let service = EcsService::new(client);
        let timeout = d.timeout(TimeoutKind::Update);

        for (action, pending, target) in [
            ("StopInstance", &["Pending", "Running", "Stopping"], "Stopped"),
            ("StartInstance", &["Pending", "Starting", "Stopped"], "Running"),
        ] {
            let params = json!({ "InstanceId": id });
            retry(timeout, || {
                let params = params.clone();
                async move {
                    ecs.rpc(action, params)
                        .await
                        .map_err(|e| retry_on(e, MODIFY_RETRY_CODES))
                }
            })
            .await
            .map_err(|e| e.context(action, id))?;

            StateRefreshConf::new(pending, &[target], timeout)
                .wait_for_state(id, || service.instance_state_refresh(id, &[]))
                .await?;
        }
        Ok(())
    }
}

/// `ModifyInstanceAttribute` parameters for the changed attributes, `None`
/// when nothing needs sending. A removed password is left as it is.
fn modify_params(d: &ResourceData, region: &str) -> Option<Value> {
    let mut params = json!({ "RegionId": region, "InstanceId": d.id() });
    let mut modified = false;
    for (attribute, param) in MODIFIABLE {
        if !d.has_change(attribute) {
            continue;
        }
        match d.get(attribute) {
            Some(value) => params[*param] = value.clone(),
            None if *attribute == "password" => continue,
            None => params[*param] = json!(""),
        }
        modified = true;
    }
    modified.then_some(params)
}

/// A new host name or password was sent.
fn needs_restart(d: &ResourceData) -> bool {
    ["host_name", "password"]
        .iter()
        .any(|key| d.has_change(key) && d.get_str(key).is_some())
}

#[async_trait]
impl Resource for Instance {
    fn type_name(&self) -> &'static str {
        "alicloud_instance"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute("image_id", Attribute::required(AttributeType::String).force_new())
            .attribute("instance_type", Attribute::required(AttributeType::String).force_new())
            .attribute(
                "security_groups",
                Attribute::required(AttributeType::set(AttributeType::String))
                    .description("Security group ids; at least one"),
            )
            .attribute("vswitch_id", Attribute::optional(AttributeType::String).force_new())
            .attribute(
                "availability_zone",
                Attribute::optional_computed(AttributeType::String).force_new(),
            )
            .attribute(
                "instance_name",
                Attribute::optional_computed(AttributeType::String)
                    .validate(string_does_not_start_with(&["http://", "https://"])),
            )
            .attribute(
                "description",
                Attribute::optional(AttributeType::String).validate(string_len_between(2, 256)),
            )
            .attribute("host_name", Attribute::optional_computed(AttributeType::String))
            .attribute("password", Attribute::optional(AttributeType::String).sensitive())
            .attribute(
                "instance_charge_type",
                Attribute::optional(AttributeType::String)
                    .default("PostPaid")
                    .validate(string_in_slice(&["PrePaid", "PostPaid"], false))
                    .force_new(),
            )
            .attribute(
                "internet_max_bandwidth_out",
                Attribute::optional(AttributeType::Int)
                    .default(0)
                    .validate(int_between(0, 100))
                    .force_new(),
            )
            .attribute(
                "system_disk_category",
                Attribute::optional(AttributeType::String)
                    .default("cloud_efficiency")
                    .validate(string_in_slice(
                        &["cloud", "cloud_efficiency", "cloud_ssd", "cloud_essd"],
                        false,
                    ))
                    .force_new(),
            )
            .attribute(
                "system_disk_size",
                Attribute::optional(AttributeType::Int)
                    .default(40)
                    .validate(int_between(20, 500))
                    .force_new(),
            )
            .attribute(
                "user_data",
                Attribute::optional(AttributeType::String)
                    .force_new()
                    .description("Base64-encoded user data"),
            )
            .attribute("private_ip", Attribute::optional_computed(AttributeType::String).force_new())
            .attribute(
                "resource_group_id",
                Attribute::optional_computed(AttributeType::String).force_new(),
            )
            .attribute(
                "deletion_protection",
                Attribute::optional(AttributeType::Bool).default(false),
            )
            .attribute("tags", Attribute::optional(AttributeType::map(AttributeType::String)))
            .attribute("status", Attribute::computed(AttributeType::String))
            .attribute("public_ip", Attribute::computed(AttributeType::String))
    }

    async fn create(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let params = run_instances_params(d, client.region_id());
        let ecs = client.product(Product::Ecs);

        let response = retry(d.timeout(TimeoutKind::Create), || {
            let params = params.clone();
            async move {
                ecs.rpc("RunInstances", params)
                    .await
                    .map_err(|e| retry_on(e, CREATE_RETRY_CODES))
            }
        })
        .await
        .map_err(|e| e.context("RunInstances", ""))?;

        let id = json_path::get_string(&response, "InstanceIdSets.InstanceIdSet.0").unwrap_or_default();
        if id.is_empty() {
            return Err(ProviderError::ParseError {
                product: Product::Ecs.to_string(),
                detail: "RunInstances returned no instance id".to_string(),
            });
        }
        d.set_id(&id);

        let service = EcsService::new(client);
        StateRefreshConf::new(
            &["Pending", "Starting", "Stopped"],
            &["Running"],
            d.timeout(TimeoutKind::Create),
        )
        .wait_for_state(&id, || service.instance_state_refresh(&id, &["Stopping"]))
        .await?;

        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let instance = match EcsService::new(client).describe_instance(d.id()).await {
            Ok(instance) => instance,
            Err(e) => return clear_if_gone(d, e),
        };
        let field = |path: &str| json_path::get_string(&instance, path);

        d.set_opt("image_id", field("ImageId"));
        d.set_opt("instance_type", field("InstanceType"));
        d.set_opt("instance_name", field("InstanceName"));
        d.set_opt("description", field("Description").filter(|s| !s.is_empty()));
        d.set_opt("host_name", field("HostName"));
        d.set_opt("availability_zone", field("ZoneId"));
        d.set_opt("status", field("Status"));
        d.set_opt("instance_charge_type", field("InstanceChargeType"));
        d.set_opt("resource_group_id", field("ResourceGroupId"));
        d.set_opt(
            "internet_max_bandwidth_out",
            json_path::get_i64(&instance, "InternetMaxBandwidthOut"),
        );
        d.set_opt(
            "deletion_protection",
            json_path::get_bool(&instance, "DeletionProtection"),
        );
        d.set_opt("vswitch_id", field("VpcAttributes.VSwitchId").filter(|s| !s.is_empty()));
        d.set_opt("private_ip", field("VpcAttributes.PrivateIpAddress.IpAddress.0"));
        d.set(
            "public_ip",
            field("PublicIpAddress.IpAddress.0")
                .or_else(|| field("EipAddress.IpAddress"))
                .unwrap_or_default(),
        );

        let mut groups = string_list(
            json_path::get(&instance, "SecurityGroupIds.SecurityGroupId").unwrap_or(&Value::Null),
        );
        groups.sort();
        d.set("security_groups", groups);
        d.set(
            "tags",
            json!(tags_to_map(json_path::get_array(&instance, "Tags.Tag"))),
        );
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let id = d.id().to_string();
        let service = EcsService::new(client);

        if d.has_change("tags") {
            let (old, new) = d.get_change("tags");
            service
                .set_instance_tags(&id, &string_map(&old), &string_map(&new))
                .await?;
        }

        if d.has_change("security_groups") {
            let (old, new) = d.get_change("security_groups");
            let (join, leave) = set_difference(&string_list(&old), &string_list(&new));
            // join first so the instance never has zero groups
            service.join_security_groups(&id, &join).await?;
            service.leave_security_groups(&id, &leave).await?;
        }

        if let Some(params) = modify_params(d, client.region_id()) {
            let ecs = client.product(Product::Ecs);
            retry(d.timeout(TimeoutKind::Update), || {
                let params = params.clone();
                async move {
                    ecs.rpc("ModifyInstanceAttribute", params)
                        .await
                        .map_err(|e| retry_on(e, MODIFY_RETRY_CODES))
                }
            })
            .await
            .map_err(|e| e.context("ModifyInstanceAttribute", &id))?;
        }

        // new host name and password only apply after a restart
        if needs_restart(d) && d.get_str("status") == Some("Running") {
            Self::restart(&id, d, client).await?;
        }

        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let id = d.id().to_string();
        let ecs = client.product(Product::Ecs);
        let params = json!({ "InstanceId": id, "Force": true });

        retry(d.timeout(TimeoutKind::Delete), || {
            let params = params.clone();
            async move {
                match ecs.rpc("DeleteInstance", params).await {
                    Ok(_) => Ok(()),
                    Err(e) if e.code() == Some("InvalidInstanceId.NotFound") => Ok(()),
                    Err(e) => Err(retry_on(e, DELETE_RETRY_CODES)),
                }
            }
        })
        .await
        .map_err(|e| e.context("DeleteInstance", &id))?;

        let service = EcsService::new(client);
        StateRefreshConf::new(&[], &[], d.timeout(TimeoutKind::Delete))
            .wait_for_state(&id, || service.instance_state_refresh(&id, &[]))
            .await?;
        Ok(())
    }
}

fn run_instances_params(d: &ResourceData, region: &str) -> Value {
    let mut params = json!({
        "RegionId": region,
        "ImageId": d.get_string("image_id"),
        "InstanceType": d.get_string("instance_type"),
        "SecurityGroupIds": d.get_string_list("security_groups"),
        "InstanceChargeType": d.get_string("instance_charge_type"),
        "InternetMaxBandwidthOut": d.get_i64("internet_max_bandwidth_out").unwrap_or(0),
        "SystemDisk": {
            "Category": d.get_string("system_disk_category"),
            "Size": d.get_i64("system_disk_size").unwrap_or(40),
        },
        "DeletionProtection": d.get_bool("deletion_protection"),
        "Amount": 1,
        "ClientToken": uuid::Uuid::new_v4().to_string(),
    });

    for (attribute, param) in [
        ("vswitch_id", "VSwitchId"),
        ("availability_zone", "ZoneId"),
        ("instance_name", "InstanceName"),
        ("description", "Description"),
        ("host_name", "HostName"),
        ("password", "Password"),
        ("user_data", "UserData"),
        ("private_ip", "PrivateIpAddress"),
        ("resource_group_id", "ResourceGroupId"),
    ] {
        if let Some(value) = d.get_str(attribute) {
            params[param] = json!(value);
        }
    }

    let tags: Vec<Value> = d
        .get_string_map("tags")
        .into_iter()
        .map(|(k, v)| json!({ "Key": k, "Value": v }))
        .collect();
    if !tags.is_empty() {
        params["Tag"] = Value::Array(tags);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ResourceState, Timeouts};
    use serde_json::Map;

    #[test]
    fn run_instances_params_skip_unset_optionals() {
        let config = json!({
            "image_id": "ubuntu_22_04_x64",
            "instance_type": "ecs.g7.large",
            "security_groups": ["sg-1"],
            "vswitch_id": "vsw-1",
            "instance_charge_type": "PostPaid",
            "system_disk_category": "cloud_essd",
            "tags": { "env": "prod" }
        });
        let Value::Object(config) = config else { unreachable!() };
        let d = ResourceData::new(config, Timeouts::default());

        let params = run_instances_params(&d, "cn-hangzhou");
        assert_eq!(params["VSwitchId"], "vsw-1");
        assert_eq!(params["SecurityGroupIds"], json!(["sg-1"]));
        assert_eq!(params["SystemDisk"]["Category"], "cloud_essd");
        assert_eq!(params["Tag"], json!([{ "Key": "env", "Value": "prod" }]));
        assert!(params.get("Password").is_none());
        assert!(params.get("HostName").is_none());
        assert_eq!(params["ClientToken"].as_str().map(str::len), Some(36));
    }

    fn update_data(prior: Value, planned: Value) -> ResourceData {
        let (Value::Object(prior), Value::Object(planned)) = (prior, planned) else {
            unreachable!()
        };
        ResourceData::for_update(ResourceState::new("i-1", prior), planned, Timeouts::default())
    }

    #[test]
    fn removed_password_is_not_sent() {
        let d = update_data(
            json!({ "password": "Old-pass1", "status": "Running" }),
            json!({ "status": "Running" }),
        );
        assert!(modify_params(&d, "cn-hangzhou").is_none());
        assert!(!needs_restart(&d));
    }

    #[test]
    fn changed_password_is_sent_and_restarts() {
        let d = update_data(
            json!({ "password": "Old-pass1", "description": "web" }),
            json!({ "password": "New-pass1" }),
        );
        let params = modify_params(&d, "cn-hangzhou").unwrap();
        assert_eq!(params["Password"], "New-pass1");
        assert_eq!(params["Description"], "");
        assert_eq!(params["InstanceId"], "i-1");
        assert!(needs_restart(&d));
    }

    #[test]
    fn schema_defaults() {
        let schema = Instance.schema();
        let mut config = Map::new();
        schema.apply_defaults(&mut config);
        assert_eq!(config.get("instance_charge_type"), Some(&json!("PostPaid")));
        assert_eq!(config.get("system_disk_size"), Some(&json!(40)));
        assert!(schema.get("image_id").is_some_and(|a| a.force_new));
    }
}
