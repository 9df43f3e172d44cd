//! `alicloud_vpc`

use async_trait::async_trait;
use serde_json::{Value, json};

use super::clear_if_gone;
use crate::client::{Product, ProviderClient};
use crate::error::{ProviderError, Result};
use crate::retry::{retry, retry_on};
use crate::schema::validation::{cidr, string_does_not_start_with, string_len_between};
use crate::schema::{Attribute, AttributeType, ResourceData, Schema, TimeoutKind};
use crate::services::VpcService;
use crate::traits::Resource;
use crate::utils::json_path;
use crate::wait::StateRefreshConf;

const CREATE_RETRY_CODES: &[&str] = &["TaskConflict", "UnknownError", "Throttling"];
const MODIFY_RETRY_CODES: &[&str] = &["OperationConflict", "IncorrectStatus", "IncorrectVpcStatus"];
const DELETE_RETRY_CODES: &[&str] = &[
    "DependencyViolation.Instance",
    "DependencyViolation.RouteEntry",
    "DependencyViolation.VSwitch",
    "DependencyViolation.SecurityGroup",
    "IncorrectVpcStatus",
    "OperationConflict",
];
const GONE_CODES: &[&str] = &["InvalidVpcID.NotFound", "Forbidden.VpcNotFound"];

pub struct Vpc;

impl Vpc {
    /// `vpc_name`, falling back to the deprecated `name`.
    fn configured_name(d: &ResourceData) -> Option<String> {
        d.get_str("vpc_name")
            .or_else(|| d.get_str("name"))
            .map(str::to_string)
    }

    async fn wait_available(id: &str, d: &ResourceData, kind: TimeoutKind, client: &ProviderClient) -> Result<()> {
        let service = VpcService::new(client);
        StateRefreshConf::new(&["Pending"], &["Available"], d.timeout(kind))
            .wait_for_state(id, || service.vpc_state_refresh(id, &[]))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for Vpc {
    fn type_name(&self) -> &'static str {
        "alicloud_vpc"
    }

    fn schema(&self) -> Schema {
        let name = || {
            Attribute::optional_computed(AttributeType::String)
                .validate(string_does_not_start_with(&["http://", "https://"]))
        };
        Schema::new()
            .attribute(
                "cidr_block",
                Attribute::optional_computed(AttributeType::String)
                    .validate(cidr())
                    .force_new(),
            )
            .attribute("vpc_name", name())
            .attribute("name", name().deprecated("use 'vpc_name' instead"))
            .attribute(
                "description",
                Attribute::optional(AttributeType::String).validate(string_len_between(2, 256)),
            )
            .attribute("resource_group_id", Attribute::optional_computed(AttributeType::String))
            .attribute("status", Attribute::computed(AttributeType::String))
            .attribute("router_id", Attribute::computed(AttributeType::String))
    }

    async fn create(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let mut params = json!({
            "RegionId": client.region_id(),
            "ClientToken": uuid::Uuid::new_v4().to_string(),
        });
        if let Some(block) = d.get_str("cidr_block") {
            params["CidrBlock"] = json!(block);
        }
        if let Some(name) = Self::configured_name(d) {
            params["VpcName"] = json!(name);
        }
        if let Some(description) = d.get_str("description") {
            params["Description"] = json!(description);
        }
        if let Some(group) = d.get_str("resource_group_id") {
            params["ResourceGroupId"] = json!(group);
        }

        let api = client.product(Product::Vpc);
        let response = retry(d.timeout(TimeoutKind::Create), || {
            let params = params.clone();
            async move {
                api.rpc("CreateVpc", params)
                    .await
                    .map_err(|e| retry_on(e, CREATE_RETRY_CODES))
            }
        })
        .await
        .map_err(|e| e.context("CreateVpc", ""))?;

        let Some(id) = json_path::get_string(&response, "VpcId") else {
            return Err(ProviderError::ParseError {
                product: Product::Vpc.to_string(),
                detail: "CreateVpc returned no VpcId".to_string(),
            });
        };
        d.set_id(&id);
        Self::wait_available(&id, d, TimeoutKind::Create, client).await?;

        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let vpc = match VpcService::new(client).describe_vpc(d.id()).await {
            Ok(vpc) => vpc,
            Err(e) => return clear_if_gone(d, e),
        };
        let field = |path: &str| json_path::get_string(&vpc, path);

        d.set_opt("cidr_block", field("CidrBlock"));
        d.set_opt("vpc_name", field("VpcName"));
        d.set_opt("name", field("VpcName"));
        d.set_opt("description", field("Description").filter(|s| !s.is_empty()));
        d.set_opt("resource_group_id", field("ResourceGroupId"));
        d.set_opt("status", field("Status"));
        d.set_opt("router_id", field("VRouterId"));
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let id = d.id().to_string();
        let api = client.product(Product::Vpc);

        if d.has_change("resource_group_id") {
            let params = json!({
                "RegionId": client.region_id(),
                "ResourceId": id,
                "ResourceType": "vpc",
                "NewResourceGroupId": d.get_string("resource_group_id"),
            });
            retry(d.timeout(TimeoutKind::Update), || {
                let params = params.clone();
                async move {
                    api.rpc("MoveResourceGroup", params)
                        .await
                        .map_err(|e| retry_on(e, MODIFY_RETRY_CODES))
                }
            })
            .await
            .map_err(|e| e.context("MoveResourceGroup", &id))?;
        }

        if d.has_changes(&["vpc_name", "name", "description"]) {
            let mut params = json!({ "RegionId": client.region_id(), "VpcId": id });
            // vpc_name is carried from state when unset, so the deprecated
            // name only wins when it is the one that moved.
            if d.has_change("vpc_name") {
                params["VpcName"] = json!(d.get_string("vpc_name"));
            } else if d.has_change("name") {
                params["VpcName"] = json!(d.get_string("name"));
            }
            if d.has_change("description") {
                params["Description"] = json!(d.get_string("description"));
            }
            retry(d.timeout(TimeoutKind::Update), || {
                let params = params.clone();
                async move {
                    api.rpc("ModifyVpcAttribute", params)
                        .await
                        .map_err(|e| retry_on(e, MODIFY_RETRY_CODES))
                }
            })
            .await
            .map_err(|e| e.context("ModifyVpcAttribute", &id))?;
            Self::wait_available(&id, d, TimeoutKind::Update, client).await?;
        }

        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let id = d.id().to_string();
        let params = json!({ "RegionId": client.region_id(), "VpcId": id });
        let api = client.product(Product::Vpc);

        retry(d.timeout(TimeoutKind::Delete), || {
            let params: Value = params.clone();
            async move {
                match api.rpc("DeleteVpc", params).await {
                    Ok(_) => Ok(()),
                    Err(e) if e.code().is_some_and(|c| GONE_CODES.contains(&c)) => Ok(()),
                    Err(e) => Err(retry_on(e, DELETE_RETRY_CODES)),
                }
            }
        })
        .await
        .map_err(|e| e.context("DeleteVpc", &id))?;

        let service = VpcService::new(client);
        StateRefreshConf::new(&[], &[], d.timeout(TimeoutKind::Delete))
            .wait_for_state(&id, || service.vpc_state_refresh(&id, &[]))
            .await?;
        Ok(())
    }
}
