//! Alidns describe helpers (domains, records)

use serde_json::{Map, Value, json};

use super::{PAGE_SIZE, call, not_found, not_found_on, paginate};
use crate::client::{Product, ProviderClient};
use crate::error::Result;
use crate::utils::json_path;

const DOMAIN_NOT_FOUND: &[&str] = &["InvalidDomainName.NoExist", "DomainRecordNotBelongToUser"];
const RECORD_NOT_FOUND: &[&str] = &["DomainRecordNotBelongToUser", "InvalidRR.NoExist"];

#[derive(Clone, Copy)]
pub struct AlidnsService<'a> {
    client: &'a ProviderClient,
}

impl<'a> AlidnsService<'a> {
    pub fn new(client: &'a ProviderClient) -> Self {
        Self { client }
    }

    async fn rpc(&self, action: &str, params: Value) -> Result<Value> {
        call(self.client.product(Product::Alidns), action, params).await
    }

    /// `DescribeDomainInfo` for a domain name.
    pub async fn describe_domain(&self, name: &str) -> Result<Value> {
        let response = self
            .rpc("DescribeDomainInfo", json!({ "DomainName": name }))
            .await
            .map_err(|e| {
                not_found_on(e, DOMAIN_NOT_FOUND, "Domain", name).context("DescribeDomainInfo", name)
            })?;

        let returned = json_path::get_string(&response, "DomainName").unwrap_or_default();
        if !returned.eq_ignore_ascii_case(name.trim_end_matches('.')) {
            return Err(not_found("Domain", name));
        }
        Ok(response)
    }

    /// Every domain matching `filters`, all pages.
    pub async fn describe_domains(&self, filters: &Map<String, Value>) -> Result<Vec<Value>> {
        let api = self.client.product(Product::Alidns);
        paginate("Domains.Domain", |page| {
            let mut params = filters.clone();
            params.insert("PageNumber".into(), json!(page));
            params.insert("PageSize".into(), json!(PAGE_SIZE));
            async move { call(api, "DescribeDomains", Value::Object(params)).await }
        })
        .await
        .map_err(|e| e.context("DescribeDomains", ""))
    }

    pub async fn describe_domain_record(&self, record_id: &str) -> Result<Value> {
        let response = self
            .rpc("DescribeDomainRecordInfo", json!({ "RecordId": record_id }))
            .await
            .map_err(|e| {
                not_found_on(e, RECORD_NOT_FOUND, "DomainRecord", record_id)
                    .context("DescribeDomainRecordInfo", record_id)
            })?;

        if json_path::get_string(&response, "RecordId").as_deref() != Some(record_id) {
            return Err(not_found("DomainRecord", record_id));
        }
        Ok(response)
    }
}
