//! `alicloud_alidns_domains`

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{hash_ids, name_regex};
use crate::client::ProviderClient;
use crate::error::Result;
use crate::resources::string_list;
use crate::schema::validation::valid_regex;
use crate::schema::{Attribute, AttributeType, ResourceData, Schema};
use crate::services::AlidnsService;
use crate::traits::DataSource;
use crate::utils::json_path;

pub struct AlidnsDomains;

fn flatten(domain: &Value) -> Value {
    let field = |path: &str| json_path::get_string(domain, path).unwrap_or_default();
    json!({
        "id": field("DomainId"),
        "domain_name": field("DomainName"),
        "group_id": field("GroupId"),
        "group_name": field("GroupName"),
        "remark": field("Remark"),
        "resource_group_id": field("ResourceGroupId"),
        "version_code": field("VersionCode"),
        "dns_servers": string_list(json_path::get(domain, "DnsServers.DnsServer").unwrap_or(&Value::Null)),
    })
}

#[async_trait]
impl DataSource for AlidnsDomains {
    fn type_name(&self) -> &'static str {
        "alicloud_alidns_domains"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute(
                "ids",
                Attribute::optional_computed(AttributeType::list(AttributeType::String))
                    .description("Domain ids to keep"),
            )
            .attribute("name_regex", Attribute::optional(AttributeType::String).validate(valid_regex()))
            .attribute("group_id", Attribute::optional(AttributeType::String))
            .attribute("resource_group_id", Attribute::optional(AttributeType::String))
            .attribute("names", Attribute::computed(AttributeType::list(AttributeType::String)))
            .attribute(
                "domains",
                Attribute::computed(AttributeType::list(AttributeType::object([
                    ("id", AttributeType::String),
                    ("domain_name", AttributeType::String),
                    ("group_id", AttributeType::String),
                    ("group_name", AttributeType::String),
                    ("remark", AttributeType::String),
                    ("resource_group_id", AttributeType::String),
                    ("version_code", AttributeType::String),
                    ("dns_servers", AttributeType::list(AttributeType::String)),
                ]))),
            )
    }

    async fn read(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let pattern = name_regex(d)?;
        let wanted = d.get_string_list("ids");

        let mut filters = Map::new();
        if let Some(group) = d.get_str("group_id") {
            filters.insert("GroupId".into(), json!(group));
        }
        if let Some(group) = d.get_str("resource_group_id") {
            filters.insert("ResourceGroupId".into(), json!(group));
        }
        let described = AlidnsService::new(client).describe_domains(&filters).await?;

        let matched: Vec<Value> = described
            .iter()
            .map(flatten)
            .filter(|domain| {
                let id = json_path::get_string(domain, "id").unwrap_or_default();
                let name = json_path::get_string(domain, "domain_name").unwrap_or_default();
                (wanted.is_empty() || wanted.contains(&id))
                    && pattern.as_ref().is_none_or(|re| re.is_match(&name))
            })
            .collect();

        let ids: Vec<String> = matched.iter().filter_map(|m| json_path::get_string(m, "id")).collect();
        let names: Vec<String> = matched
            .iter()
            .filter_map(|m| json_path::get_string(m, "domain_name"))
            .collect();

        d.set_id(hash_ids(&ids));
        d.set("ids", ids);
        d.set("names", names);
        d.set("domains", matched);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_domain() {
        let flat = flatten(&json!({
            "DomainId": "d-1",
            "DomainName": "example.com",
            "DnsServers": { "DnsServer": ["dns1.hichina.com", "dns2.hichina.com"] }
        }));
        assert_eq!(flat["id"], "d-1");
        assert_eq!(flat["dns_servers"][1], "dns2.hichina.com");
        assert_eq!(flat["group_id"], "");

        let schema = AlidnsDomains.schema();
        let domains = schema.get("domains").map(|a| a.ty.clone());
        assert_eq!(
            domains.map(|ty| ty.check(&json!([flat]))),
            Some(Ok(()))
        );
    }
}
