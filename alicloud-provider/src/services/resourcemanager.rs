//! Resource Manager describe helpers (service-linked roles)

use serde_json::{Value, json};

use super::{call, not_found, not_found_on};
use crate::client::{Product, ProviderClient};
use crate::error::{ProviderError, Result};
use crate::identifier::parse_id;
use crate::utils::json_path;
use crate::wait::Refreshed;

#[derive(Clone, Copy)]
pub struct ResourceManagerService<'a> {
    client: &'a ProviderClient,
}

impl<'a> ResourceManagerService<'a> {
    pub fn new(client: &'a ProviderClient) -> Self {
        Self { client }
    }

    async fn rpc(&self, action: &str, params: Value) -> Result<Value> {
        call(self.client.product(Product::ResourceManager), action, params).await
    }

    /// The `Role` object for an id `{service_name}:{role_name}`.
    pub async fn describe_service_linked_role(&self, id: &str) -> Result<Value> {
        let parts = parse_id(id, 2)?;
        let role_name = &parts[1];
        let response = self
            .rpc("GetRole", json!({ "RoleName": role_name }))
            .await
            .map_err(|e| {
                not_found_on(e, &["EntityNotExist.Role"], "ServiceLinkedRole", id).context("GetRole", id)
            })?;

        match json_path::get(&response, "Role") {
            Some(role) if json_path::get_string(role, "RoleName").as_deref() == Some(role_name.as_str()) => {
                Ok(role.clone())
            }
            _ => Err(not_found("ServiceLinkedRole", id)),
        }
    }

    /// One refresh step over `GetServiceLinkedRoleDeletionStatus`.
    ///
    /// A status in `fail_states` carries the vendor's `Reason.Message`.
    pub async fn deletion_status_refresh(
        &self,
        deletion_task_id: &str,
        fail_states: &[&str],
    ) -> Result<Option<Refreshed>> {
        let response = self
            .rpc(
                "GetServiceLinkedRoleDeletionStatus",
                json!({ "DeletionTaskId": deletion_task_id }),
            )
            .await
            .map_err(|e| e.context("GetServiceLinkedRoleDeletionStatus", deletion_task_id))?;

        let status = json_path::get_string(&response, "Status").unwrap_or_default();
        if fail_states.contains(&status.as_str()) {
            return Err(ProviderError::FailedToReachTarget {
                id: deletion_task_id.to_string(),
                status,
                reason: json_path::get_string(&response, "Reason.Message"),
            });
        }
        Ok(Some(Refreshed {
            object: response,
            status,
        }))
    }
}
