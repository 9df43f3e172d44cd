//! `alicloud_resource_manager_service_linked_role`
//!
//! Id: `{service_name}:{role_name}`. Deletion is asynchronous: the vendor
//! returns a task id whose status is polled until it succeeds or fails.

use async_trait::async_trait;
use serde_json::json;

use super::clear_if_gone;
use crate::client::{Product, ProviderClient};
use crate::error::{ProviderError, Result};
use crate::identifier::{build_id, parse_id};
use crate::retry::{retry, retry_on};
use crate::schema::{Attribute, AttributeType, ResourceData, Schema, TimeoutKind};
use crate::services::ResourceManagerService;
use crate::traits::Resource;
use crate::utils::json_path;
use crate::wait::StateRefreshConf;

const GONE_CODES: &[&str] = &["EntityNotExist.Role"];

pub struct ServiceLinkedRole;

#[async_trait]
impl Resource for ServiceLinkedRole {
    fn type_name(&self) -> &'static str {
        "alicloud_resource_manager_service_linked_role"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute(
                "service_name",
                Attribute::required(AttributeType::String)
                    .description("e.g. `ecs.aliyuncs.com`")
                    .force_new(),
            )
            .attribute("custom_suffix", Attribute::optional(AttributeType::String).force_new())
            .attribute("description", Attribute::optional(AttributeType::String).force_new())
            .attribute("role_name", Attribute::computed(AttributeType::String))
            .attribute("role_id", Attribute::computed(AttributeType::String))
            .attribute("arn", Attribute::computed(AttributeType::String))
    }

    async fn create(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let service_name = d.get_string("service_name");
        let mut params = json!({ "ServiceName": service_name });
        if let Some(suffix) = d.get_str("custom_suffix") {
            params["CustomSuffix"] = json!(suffix);
        }
        if let Some(description) = d.get_str("description") {
            params["Description"] = json!(description);
        }

        let api = client.product(Product::ResourceManager);
        let response = retry(d.timeout(TimeoutKind::Create), || {
            let params = params.clone();
            async move {
                api.rpc("CreateServiceLinkedRole", params)
                    .await
                    .map_err(|e| retry_on(e, &[]))
            }
        })
        .await
        .map_err(|e| e.context("CreateServiceLinkedRole", &service_name))?;

        let Some(role_name) = json_path::get_string(&response, "Role.RoleName") else {
            return Err(ProviderError::ParseError {
                product: Product::ResourceManager.to_string(),
                detail: "CreateServiceLinkedRole returned no Role.RoleName".to_string(),
            });
        };
        d.set_id(build_id(&[service_name.as_str(), role_name.as_str()]));

        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let parts = parse_id(d.id(), 2)?;
        let role = match ResourceManagerService::new(client)
            .describe_service_linked_role(d.id())
            .await
        {
            Ok(role) => role,
            Err(e) => return clear_if_gone(d, e),
        };

        d.set("service_name", parts[0].as_str());
        d.set_opt("role_name", json_path::get_string(&role, "RoleName"));
        d.set_opt("role_id", json_path::get_string(&role, "RoleId"));
        d.set_opt("arn", json_path::get_string(&role, "Arn"));
        d.set_opt(
            "description",
            json_path::get_string(&role, "Description").filter(|s| !s.is_empty()),
        );
        Ok(())
    }

    /// Every argument forces replacement, so there is nothing to send.
    async fn update(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let id = d.id().to_string();
        let parts = parse_id(&id, 2)?;
        let params = json!({ "RoleName": parts[1] });

        let api = client.product(Product::ResourceManager);
        let response = match retry(d.timeout(TimeoutKind::Delete), || {
            let params = params.clone();
            async move {
                api.rpc("DeleteServiceLinkedRole", params)
                    .await
                    .map_err(|e| retry_on(e, &[]))
            }
        })
        .await
        {
            Ok(response) => response,
            Err(e) if e.code().is_some_and(|c| GONE_CODES.contains(&c)) => return Ok(()),
            Err(e) => return Err(e.context("DeleteServiceLinkedRole", &id)),
        };

        let Some(task_id) = json_path::get_string(&response, "DeletionTaskId") else {
            return Err(ProviderError::ParseError {
                product: Product::ResourceManager.to_string(),
                detail: "DeleteServiceLinkedRole returned no DeletionTaskId".to_string(),
            });
        };

        let service = ResourceManagerService::new(client);
        StateRefreshConf::new(&["IN_PROGRESS", "NOT_STARTED"], &["SUCCEEDED"], d.timeout(TimeoutKind::Delete))
            .wait_for_state(&task_id, || service.deletion_status_refresh(&task_id, &["FAILED"]))
            .await
            .map_err(|e| e.context("DeleteServiceLinkedRole", &id))?;
        Ok(())
    }
}
