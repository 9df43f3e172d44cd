//! `alicloud_alidns_record`: one record inside a hosted zone. Id is the
//! vendor `RecordId`.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::clear_if_gone;
use crate::client::{Product, ProviderClient};
use crate::error::{ProviderError, Result};
use crate::retry::{retry, retry_on};
use crate::schema::validation::{int_between, string_in_slice};
use crate::schema::{Attribute, AttributeType, ResourceData, Schema, TimeoutKind};
use crate::services::AlidnsService;
use crate::traits::Resource;
use crate::utils::json_path;

const RETRY_CODES: &[&str] = &["LastOperationNotFinished"];
const GONE_CODES: &[&str] = &["DomainRecordNotBelongToUser", "InvalidRR.NoExist"];

const RECORD_TYPES: &[&str] = &[
    "A", "NS", "MX", "TXT", "CNAME", "SRV", "AAAA", "CAA", "REDIRECT_URL", "FORWARD_URL",
];

/// Fields that go through `UpdateDomainRecord`.
const RECORD_FIELDS: &[&str] = &["rr", "type", "value", "ttl", "priority", "line"];

/// `priority` only means something for MX records.
fn suppress_priority_unless_mx(_: &str, _: &Value, _: &Value, planned: &Map<String, Value>) -> bool {
    planned.get("type").and_then(Value::as_str) != Some("MX")
}

/// `RR`/`Type`/`Value`/`TTL`/`Line` (+`Priority` for MX) from the planned attributes.
fn record_params(d: &ResourceData) -> Value {
    let record_type = d.get_string("type");
    let mut params = json!({
        "RR": d.get_string("rr"),
        "Type": record_type,
        "Value": d.get_string("value"),
        "TTL": d.get_i64("ttl").unwrap_or(600),
        "Line": d.get_string("line"),
    });
    if record_type == "MX" {
        params["Priority"] = json!(d.get_i64("priority").unwrap_or(1));
    }
    params
}

/// `SetDomainRecordStatus` spells the status in title case.
fn status_param(status: &str) -> &'static str {
    if status.eq_ignore_ascii_case("DISABLE") { "Disable" } else { "Enable" }
}

pub struct AlidnsRecord;

impl AlidnsRecord {
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
impl Resource for AlidnsRecord {
    fn type_name(&self) -> &'static str {
        "alicloud_alidns_record"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute("domain_name", Attribute::required(AttributeType::String).force_new())
            .attribute(
                "rr",
                Attribute::required(AttributeType::String).description("Host record, e.g. `www` or `@`"),
            )
            .attribute(
                "type",
                Attribute::required(AttributeType::String).validate(string_in_slice(RECORD_TYPES, false)),
            )
            .attribute("value", Attribute::required(AttributeType::String))
            .attribute(
                "ttl",
                Attribute::optional(AttributeType::Int)
                    .default(600)
                    .validate(int_between(1, 86_400)),
            )
            .attribute(
                "priority",
                Attribute::optional(AttributeType::Int)
                    .validate(int_between(1, 50))
                    .diff_suppress(suppress_priority_unless_mx),
            )
            .attribute("line", Attribute::optional(AttributeType::String).default("default"))
            .attribute("remark", Attribute::optional(AttributeType::String))
            .attribute(
                "status",
                Attribute::optional(AttributeType::String)
                    .default("ENABLE")
                    .validate(string_in_slice(&["ENABLE", "DISABLE"], false)),
            )
    }

    async fn create(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        if d.get_str("type") == Some("MX") && d.get_i64("priority").is_none() {
            return Err(ProviderError::InvalidParameter {
                param: "priority".to_string(),
                detail: "required for MX records".to_string(),
            });
        }

        let mut params = record_params(d);
        params["DomainName"] = json!(d.get_string("domain_name"));
        let response = Self::call(d, TimeoutKind::Create, client, "AddDomainRecord", params).await?;
        let Some(id) = json_path::get_string(&response, "RecordId") else {
            return Err(ProviderError::ParseError {
                product: Product::Alidns.to_string(),
                detail: "AddDomainRecord returned no RecordId".to_string(),
            });
        };
        d.set_id(&id);

        if let Some(remark) = d.get_str("remark") {
            let params = json!({ "RecordId": id, "Remark": remark });
            Self::call(d, TimeoutKind::Create, client, "UpdateDomainRecordRemark", params).await?;
        }
        if d.get_str("status") == Some("DISABLE") {
            let params = json!({ "RecordId": id, "Status": "Disable" });
            Self::call(d, TimeoutKind::Create, client, "SetDomainRecordStatus", params).await?;
        }

        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let record = match AlidnsService::new(client).describe_domain_record(d.id()).await {
            Ok(record) => record,
            Err(e) => return clear_if_gone(d, e),
        };
        let field = |path: &str| json_path::get_string(&record, path);

        d.set_opt("domain_name", field("DomainName"));
        d.set_opt("rr", field("RR"));
        d.set_opt("type", field("Type"));
        d.set_opt("value", field("Value"));
        d.set_opt("ttl", json_path::get_i64(&record, "TTL"));
        d.set_opt("line", field("Line"));
        d.set_opt("remark", field("Remark").filter(|s| !s.is_empty()));
        d.set_opt("status", field("Status").map(|s| s.to_uppercase()));
        if field("Type").as_deref() == Some("MX") {
            d.set_opt("priority", json_path::get_i64(&record, "Priority"));
        }
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let id = d.id().to_string();

        if d.has_changes(RECORD_FIELDS) {
            let mut params = record_params(d);
            params["RecordId"] = json!(id);
            Self::call(d, TimeoutKind::Update, client, "UpdateDomainRecord", params).await?;
        }
        if d.has_change("remark") {
            let params = json!({ "RecordId": id, "Remark": d.get_string("remark") });
            Self::call(d, TimeoutKind::Update, client, "UpdateDomainRecordRemark", params).await?;
        }
        if d.has_change("status") {
            let params = json!({ "RecordId": id, "Status": status_param(&d.get_string("status")) });
            Self::call(d, TimeoutKind::Update, client, "SetDomainRecordStatus", params).await?;
        }

        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let params = json!({ "RecordId": d.id() });
        match Self::call(d, TimeoutKind::Delete, client, "DeleteDomainRecord", params).await {
            Err(e) if e.code().is_some_and(|c| GONE_CODES.contains(&c)) => Ok(()),
            other => other.map(|_| ()),
        }
    }
}
