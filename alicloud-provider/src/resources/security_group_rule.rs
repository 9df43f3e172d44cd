//! `alicloud_security_group_rule`: one ingress or egress permission
//!
//! The vendor has no id for a permission; the resource id joins the fields
//! that identify it:
//! `{group}:{direction}:{protocol}:{port_range}:{nic_type}:{cidr_or_group}:{policy}:{priority}`.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::clear_if_gone;
use crate::client::{Product, ProviderClient};
use crate::error::{ProviderError, Result};
use crate::identifier::{build_id, parse_id};
use crate::retry::{RetryError, retry, retry_on};
use crate::schema::validation::{cidr, int_between, port_range, string_in_slice, string_len_between};
use crate::schema::{Attribute, AttributeType, ResourceData, Schema, TimeoutKind};
use crate::services::EcsService;
use crate::traits::Resource;
use crate::utils::json_path;

const RETRY_CODES: &[&str] = &["OperationConflict", "InvalidSecurityGroup.Busy"];

pub struct SecurityGroupRule;

/// The identifying fields of a rule, in id order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RuleKey {
    group_id: String,
    direction: String,
    ip_protocol: String,
    port_range: String,
    nic_type: String,
    peer: String,
    policy: String,
    priority: String,
}

impl RuleKey {
    /// `vpc_group`: the target group lives in a VPC.
    fn from_config(d: &ResourceData, vpc_group: bool) -> Result<Self> {
        let cidr_ip = d.get_str("cidr_ip");
        let source_group = d.get_str("source_security_group_id");
        let peer = match (cidr_ip, source_group) {
            (Some(c), None) => c.to_string(),
            (None, Some(g)) => g.to_string(),
            _ => {
                return Err(ProviderError::InvalidParameter {
                    param: "cidr_ip".to_string(),
                    detail: "exactly one of cidr_ip and source_security_group_id must be set"
                        .to_string(),
                });
            }
        };
        let ip_protocol = d.get_string("ip_protocol");
        let port_range = d.get_string("port_range");
        check_port_range(&ip_protocol, &port_range)?;

        // VPC groups and group-to-group rules only exist on the internal network
        let nic_type = d.get_string("nic_type");
        if nic_type == "internet" && (vpc_group || source_group.is_some()) {
            return Err(ProviderError::InvalidParameter {
                param: "nic_type".to_string(),
                detail: "must be intranet for VPC security groups and group-to-group rules"
                    .to_string(),
            });
        }

        Ok(Self {
            group_id: d.get_string("security_group_id"),
            direction: d.get_string("type"),
            ip_protocol,
            port_range,
            nic_type,
            peer,
            policy: d.get_string("policy"),
            priority: d.get_i64("priority").unwrap_or(1).to_string(),
        })
    }

    fn parse(id: &str) -> Result<Self> {
        let mut parts = parse_id(id, 8)?.into_iter();
        let mut next = || parts.next().unwrap_or_default();
        Ok(Self {
            group_id: next(),
            direction: next(),
            ip_protocol: next(),
            port_range: next(),
            nic_type: next(),
            peer: next(),
            policy: next(),
            priority: next(),
        })
    }

    fn id(&self) -> String {
        build_id(&[
            &self.group_id,
            &self.direction,
            &self.ip_protocol,
            &self.port_range,
            &self.nic_type,
            &self.peer,
            &self.policy,
            &self.priority,
        ])
    }

    fn is_egress(&self) -> bool {
        self.direction == "egress"
    }

    /// Request parameters shared by authorize, modify and revoke.
    fn params(&self, region: &str) -> Value {
        let mut params = json!({
            "RegionId": region,
            "SecurityGroupId": self.group_id,
            "IpProtocol": self.ip_protocol,
            "PortRange": self.port_range,
            "NicType": self.nic_type,
            "Policy": self.policy,
            "Priority": self.priority,
        });
        let is_cidr = self.peer.contains('/');
        let key = match (self.is_egress(), is_cidr) {
            (false, true) => "SourceCidrIp",
            (false, false) => "SourceGroupId",
            (true, true) => "DestCidrIp",
            (true, false) => "DestGroupId",
        };
        params[key] = json!(self.peer);
        params
    }

    fn action(&self, ingress: &'static str, egress: &'static str) -> &'static str {
        if self.is_egress() { egress } else { ingress }
    }
}

/// TCP and UDP need a real port range; other protocols only accept `-1/-1`.
fn check_port_range(ip_protocol: &str, port_range: &str) -> Result<()> {
    let all_ports = port_range == "-1/-1";
    let ok = match ip_protocol {
        "tcp" | "udp" => !all_ports,
        _ => all_ports,
    };
    if ok {
        Ok(())
    } else {
        Err(ProviderError::InvalidParameter {
            param: "port_range".to_string(),
            detail: format!("'{port_range}' is not valid for protocol {ip_protocol}"),
        })
    }
}

#[async_trait]
impl Resource for SecurityGroupRule {
    fn type_name(&self) -> &'static str {
        "alicloud_security_group_rule"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute(
                "type",
                Attribute::required(AttributeType::String)
                    .validate(string_in_slice(&["ingress", "egress"], false))
                    .force_new(),
            )
            .attribute(
                "ip_protocol",
                Attribute::required(AttributeType::String)
                    .validate(string_in_slice(&["tcp", "udp", "icmp", "gre", "all"], false))
                    .force_new(),
            )
            .attribute(
                "nic_type",
                Attribute::optional(AttributeType::String)
                    .default("intranet")
                    .validate(string_in_slice(&["internet", "intranet"], false))
                    .force_new(),
            )
            .attribute(
                "policy",
                Attribute::optional(AttributeType::String)
                    .default("accept")
                    .validate(string_in_slice(&["accept", "drop"], false))
                    .force_new(),
            )
            .attribute(
                "port_range",
                Attribute::optional(AttributeType::String)
                    .default("-1/-1")
                    .validate(port_range())
                    .force_new(),
            )
            .attribute(
                "priority",
                Attribute::optional(AttributeType::Int)
                    .default(1)
                    .validate(int_between(1, 100))
                    .force_new(),
            )
            .attribute(
                "security_group_id",
                Attribute::required(AttributeType::String).force_new(),
            )
            .attribute(
                "cidr_ip",
                Attribute::optional(AttributeType::String)
                    .validate(cidr())
                    .force_new(),
            )
            .attribute(
                "source_security_group_id",
                Attribute::optional(AttributeType::String).force_new(),
            )
            .attribute(
                "description",
                Attribute::optional(AttributeType::String).validate(string_len_between(1, 512)),
            )
    }

    async fn create(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let service = EcsService::new(client);
        let group = service
            .describe_security_group(&d.get_string("security_group_id"))
            .await?;
        let vpc_group = json_path::get_string(&group, "VpcId").is_some_and(|v| !v.is_empty());
        let key = RuleKey::from_config(d, vpc_group)?;
        let action = key.action("AuthorizeSecurityGroup", "AuthorizeSecurityGroupEgress");
        let mut params = key.params(client.region_id());
        if let Some(description) = d.get_str("description") {
            params["Description"] = json!(description);
        }

        let ecs = client.product(Product::Ecs);
        retry(d.timeout(TimeoutKind::Create), || {
            let params = params.clone();
            async move {
                ecs.rpc(action, params)
                    .await
                    .map_err(|e| retry_on(e, RETRY_CODES))
            }
        })
        .await
        .map_err(|e| e.context(action, &key.group_id))?;

        let id = key.id();
        d.set_id(&id);

        // the new permission can take a moment to show up
        retry(d.timeout(TimeoutKind::Create), || {
            let id = id.clone();
            async move {
                service
                    .describe_security_group_rule(&id)
                    .await
                    .map_err(|e| {
                        if e.is_not_found() {
                            RetryError::Retryable(e)
                        } else {
                            RetryError::NonRetryable(e)
                        }
                    })
            }
        })
        .await?;

        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let key = RuleKey::parse(d.id())?;
        let rule = match EcsService::new(client).describe_security_group_rule(d.id()).await {
            Ok(rule) => rule,
            Err(e) => return clear_if_gone(d, e),
        };

        d.set("security_group_id", key.group_id.as_str());
        d.set("type", key.direction.as_str());
        d.set("ip_protocol", key.ip_protocol.as_str());
        d.set("port_range", key.port_range.as_str());
        d.set("nic_type", key.nic_type.as_str());
        d.set("policy", key.policy.as_str());
        d.set("priority", key.priority.parse::<i64>().unwrap_or(1));
        if key.peer.contains('/') {
            d.set("cidr_ip", key.peer.as_str());
        } else {
            d.set("source_security_group_id", key.peer.as_str());
        }
        d.set_opt(
            "description",
            json_path::get_string(&rule, "Description").filter(|s| !s.is_empty()),
        );
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        if d.has_change("description") {
            let key = RuleKey::parse(d.id())?;
            let action = key.action("ModifySecurityGroupRule", "ModifySecurityGroupEgressRule");
            let mut params = key.params(client.region_id());
            params["Description"] = json!(d.get_string("description"));

            let ecs = client.product(Product::Ecs);
            retry(d.timeout(TimeoutKind::Update), || {
                let params = params.clone();
                async move {
                    ecs.rpc(action, params)
                        .await
                        .map_err(|e| retry_on(e, RETRY_CODES))
                }
            })
            .await
            .map_err(|e| e.context(action, d.id()))?;
        }
        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let key = RuleKey::parse(d.id())?;
        let action = key.action("RevokeSecurityGroup", "RevokeSecurityGroupEgress");
        let params = key.params(client.region_id());

        let ecs = client.product(Product::Ecs);
        retry(d.timeout(TimeoutKind::Delete), || {
            let params = params.clone();
            async move {
                match ecs.rpc(action, params).await {
                    Ok(_) => Ok(()),
                    Err(e) if e.code() == Some("InvalidSecurityGroupId.NotFound") => Ok(()),
                    Err(e) => Err(retry_on(e, RETRY_CODES)),
                }
            }
        })
        .await
        .map_err(|e| e.context(action, d.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Timeouts;

    fn data(config: Value) -> ResourceData {
        let Value::Object(config) = config else { unreachable!() };
        ResourceData::new(config, Timeouts::default())
    }

    #[test]
    fn key_from_config_builds_eight_part_id() {
        let d = data(json!({
            "type": "ingress",
            "ip_protocol": "tcp",
            "nic_type": "intranet",
            "policy": "accept",
            "port_range": "22/22",
            "priority": 1,
            "security_group_id": "sg-1",
            "cidr_ip": "10.0.0.0/8"
        }));
        let key = RuleKey::from_config(&d, false).unwrap();
        assert_eq!(key.id(), "sg-1:ingress:tcp:22/22:intranet:10.0.0.0/8:accept:1");
        assert_eq!(RuleKey::parse(&key.id()).unwrap(), key);

        let params = key.params("cn-hangzhou");
        assert_eq!(params["SourceCidrIp"], "10.0.0.0/8");
        assert!(params.get("DestCidrIp").is_none());
    }

    #[test]
    fn group_peer_uses_egress_keys() {
        let d = data(json!({
            "type": "egress",
            "ip_protocol": "all",
            "nic_type": "intranet",
            "policy": "drop",
            "port_range": "-1/-1",
            "priority": 5,
            "security_group_id": "sg-1",
            "source_security_group_id": "sg-2"
        }));
        let key = RuleKey::from_config(&d, false).unwrap();
        assert_eq!(key.id(), "sg-1:egress:all:-1/-1:intranet:sg-2:drop:5");
        assert_eq!(key.params("cn-hangzhou")["DestGroupId"], "sg-2");
        assert_eq!(key.action("A", "B"), "B");
    }

    #[test]
    fn group_peer_rejects_internet() {
        let d = data(json!({
            "type": "ingress",
            "ip_protocol": "all",
            "nic_type": "internet",
            "port_range": "-1/-1",
            "security_group_id": "sg-1",
            "source_security_group_id": "sg-2"
        }));
        assert!(matches!(
            RuleKey::from_config(&d, false),
            Err(ProviderError::InvalidParameter { ref param, .. }) if param == "nic_type"
        ));
    }

    #[test]
    fn vpc_group_rejects_internet() {
        let d = data(json!({
            "type": "ingress",
            "ip_protocol": "icmp",
            "nic_type": "internet",
            "policy": "accept",
            "port_range": "-1/-1",
            "priority": 1,
            "security_group_id": "sg-1",
            "cidr_ip": "0.0.0.0/0"
        }));
        assert_eq!(RuleKey::from_config(&d, false).unwrap().nic_type, "internet");
        assert!(matches!(
            RuleKey::from_config(&d, true),
            Err(ProviderError::InvalidParameter { ref param, .. }) if param == "nic_type"
        ));
    }

    #[test]
    fn peer_must_be_exactly_one() {
        let d = data(json!({
            "type": "ingress",
            "ip_protocol": "tcp",
            "port_range": "22/22",
            "security_group_id": "sg-1",
            "cidr_ip": "10.0.0.0/8",
            "source_security_group_id": "sg-2"
        }));
        assert!(matches!(
            RuleKey::from_config(&d, false),
            Err(ProviderError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn port_range_must_match_protocol() {
        assert!(check_port_range("tcp", "80/80").is_ok());
        assert!(check_port_range("tcp", "-1/-1").is_err());
        assert!(check_port_range("icmp", "-1/-1").is_ok());
        assert!(check_port_range("icmp", "1/2").is_err());
    }
}
