//! VPC describe helpers (VPCs, network ACLs)

use serde_json::{Value, json};

use super::{call, not_found, not_found_on};
use crate::client::{Product, ProviderClient};
use crate::error::{ProviderError, Result};
use crate::identifier::parse_id;
use crate::utils::json_path;
use crate::wait::{Refreshed, status_refresh};

/// Traffic direction of a network ACL entry list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclDirection {
    Ingress,
    Egress,
}

impl AclDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ingress" => Some(Self::Ingress),
            "egress" => Some(Self::Egress),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingress => "ingress",
            Self::Egress => "egress",
        }
    }

    /// Path of the entry list inside `NetworkAclAttribute`.
    pub fn entries_path(self) -> &'static str {
        match self {
            Self::Ingress => "IngressAclEntries.IngressAclEntry",
            Self::Egress => "EgressAclEntries.EgressAclEntry",
        }
    }

    /// Prefix of the `UpdateNetworkAclEntries` list parameter.
    pub fn request_key(self) -> &'static str {
        match self {
            Self::Ingress => "IngressAclEntries",
            Self::Egress => "EgressAclEntries",
        }
    }

    /// Flag telling `UpdateNetworkAclEntries` which list to replace.
    pub fn update_flag(self) -> &'static str {
        match self {
            Self::Ingress => "UpdateIngressAclEntries",
            Self::Egress => "UpdateEgressAclEntries",
        }
    }
}

#[derive(Clone, Copy)]
pub struct VpcService<'a> {
    client: &'a ProviderClient,
}

impl<'a> VpcService<'a> {
    pub fn new(client: &'a ProviderClient) -> Self {
        Self { client }
    }

    async fn rpc(&self, action: &str, params: Value) -> Result<Value> {
        call(self.client.product(Product::Vpc), action, params).await
    }

    pub async fn describe_vpc(&self, id: &str) -> Result<Value> {
        let response = self
            .rpc(
                "DescribeVpcs",
                json!({ "RegionId": self.client.region_id(), "VpcId": id }),
            )
            .await
            .map_err(|e| {
                not_found_on(e, &["Forbidden.VpcNotFound", "InvalidVpcID.NotFound"], "Vpc", id)
                    .context("DescribeVpcs", id)
            })?;

        match json_path::get_array(&response, "Vpcs.Vpc").first() {
            Some(vpc) if json_path::get_string(vpc, "VpcId").as_deref() == Some(id) => Ok(vpc.clone()),
            _ => Err(not_found("Vpc", id)),
        }
    }

    pub async fn vpc_state_refresh(&self, id: &str, fail_states: &[&str]) -> Result<Option<Refreshed>> {
        status_refresh(id, self.describe_vpc(id).await, "Status", fail_states)
    }

    /// The `NetworkAclAttribute` object.
    pub async fn describe_network_acl(&self, id: &str) -> Result<Value> {
        let response = self
            .rpc(
                "DescribeNetworkAclAttributes",
                json!({ "RegionId": self.client.region_id(), "NetworkAclId": id }),
            )
            .await
            .map_err(|e| {
                not_found_on(e, &["InvalidNetworkAcl.NotFound"], "NetworkAcl", id)
                    .context("DescribeNetworkAclAttributes", id)
            })?;

        match json_path::get(&response, "NetworkAclAttribute") {
            Some(acl @ Value::Object(_)) => Ok(acl.clone()),
            _ => Err(not_found("NetworkAcl", id)),
        }
    }

    pub async fn network_acl_state_refresh(&self, id: &str, fail_states: &[&str]) -> Result<Option<Refreshed>> {
        status_refresh(id, self.describe_network_acl(id).await, "Status", fail_states)
    }

    /// Custom entries of one direction, for an id `{network_acl_id}:{direction}`.
    ///
    /// System entries are skipped; a direction with no custom entries is
    /// reported as not found.
    pub async fn describe_network_acl_entries(&self, id: &str) -> Result<Vec<Value>> {
        let (acl_id, direction) = parse_acl_entries_id(id)?;
        let acl = self.describe_network_acl(&acl_id).await?;

        let entries: Vec<Value> = json_path::get_array(&acl, direction.entries_path())
            .iter()
            .filter(|e| json_path::get_string(e, "EntryType").as_deref() != Some("system"))
            .cloned()
            .collect();
        if entries.is_empty() {
            return Err(not_found("NetworkAclEntries", id));
        }
        Ok(entries)
    }
}

/// Splits `{network_acl_id}:{direction}`.
pub fn parse_acl_entries_id(id: &str) -> Result<(String, AclDirection)> {
    let mut parts = parse_id(id, 2)?;
    let direction = parts.pop().unwrap_or_default();
    let acl_id = parts.pop().unwrap_or_default();
    let direction = AclDirection::parse(&direction).ok_or_else(|| ProviderError::InvalidResourceId {
        id: id.to_string(),
        detail: format!("unknown direction '{direction}', expected ingress or egress"),
    })?;
    Ok((acl_id, direction))
}
