//! `alicloud_alidns_domain`: a hosted DNS zone. Id is the domain name.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{clear_if_gone, string_list};
use crate::client::{Product, ProviderClient};
use crate::error::Result;
use crate::retry::{retry, retry_on};
use crate::schema::validation::string_match;
use crate::schema::{Attribute, AttributeType, ResourceData, Schema, TimeoutKind};
use crate::services::AlidnsService;
use crate::traits::Resource;
use crate::utils::json_path;

const RETRY_CODES: &[&str] = &["LastOperationNotFinished", "RecordForbidden.DNSChange"];

pub struct AlidnsDomain;

impl AlidnsDomain {
    async fn call(d: &ResourceData, kind: TimeoutKind, client: &ProviderClient, action: &str, params: Value) -> Result<Value> {
        let api = client.product(Product::Alidns);
        retry(d.timeout(kind), || {
            let params = params.clone();
            async move { api.rpc(action, params).await.map_err(|e| retry_on(e, RETRY_CODES)) }
        })
        .await
        .map_err(|e| e.context(action, d.id()))
    }
}

#[async_trait]
impl Resource for AlidnsDomain {
    fn type_name(&self) -> &'static str {
        "alicloud_alidns_domain"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute(
                "domain_name",
                Attribute::required(AttributeType::String)
                    .validate(string_match(
                        r"^([a-z0-9]([a-z0-9-]*[a-z0-9])?\.)+[a-z0-9-]{2,}$",
                        "must be a lowercase domain name",
                    ))
                    .force_new(),
            )
            .attribute("group_id", Attribute::optional_computed(AttributeType::String))
            .attribute("remark", Attribute::optional(AttributeType::String))
            .attribute(
                "resource_group_id",
                Attribute::optional_computed(AttributeType::String).force_new(),
            )
            .attribute("domain_id", Attribute::computed(AttributeType::String))
            .attribute("group_name", Attribute::computed(AttributeType::String))
            .attribute(
                "dns_servers",
                Attribute::computed(AttributeType::list(AttributeType::String)),
            )
    }

    async fn create(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let name = d.get_string("domain_name");
        let mut params = json!({ "DomainName": name });
        if let Some(group) = d.get_str("group_id") {
            params["GroupId"] = json!(group);
        }
        if let Some(group) = d.get_str("resource_group_id") {
            params["ResourceGroupId"] = json!(group);
        }
        Self::call(d, TimeoutKind::Create, client, "AddDomain", params).await?;
        d.set_id(&name);

        if let Some(remark) = d.get_str("remark") {
            let params = json!({ "DomainName": name, "Remark": remark });
            Self::call(d, TimeoutKind::Create, client, "UpdateDomainRemark", params).await?;
        }

        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let domain = match AlidnsService::new(client).describe_domain(d.id()).await {
            Ok(domain) => domain,
            Err(e) => return clear_if_gone(d, e),
        };
        let field = |path: &str| json_path::get_string(&domain, path);

        d.set_opt("domain_name", field("DomainName"));
        d.set_opt("domain_id", field("DomainId"));
        d.set_opt("group_id", field("GroupId"));
        d.set_opt("group_name", field("GroupName"));
        d.set_opt("remark", field("Remark").filter(|s| !s.is_empty()));
        d.set_opt("resource_group_id", field("ResourceGroupId"));
        d.set(
            "dns_servers",
            string_list(json_path::get(&domain, "DnsServers.DnsServer").unwrap_or(&Value::Null)),
        );
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let name = d.id().to_string();
        if d.has_change("remark") {
            let params = json!({ "DomainName": name, "Remark": d.get_string("remark") });
            Self::call(d, TimeoutKind::Update, client, "UpdateDomainRemark", params).await?;
        }
        if d.has_change("group_id") {
            let params = json!({ "DomainName": name, "GroupId": d.get_string("group_id") });
            Self::call(d, TimeoutKind::Update, client, "ChangeDomainGroup", params).await?;
        }
        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let params = json!({ "DomainName": d.id() });
        match Self::call(d, TimeoutKind::Delete, client, "DeleteDomain", params).await {
            Err(e) if e.code() == Some("InvalidDomainName.NoExist") => Ok(()),
            other => other.map(|_| ()),
        }
    }
}
