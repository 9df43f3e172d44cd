//! `alicloud_datahub_project`. Id is the project name.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{clear_if_gone, ignore_not_found};
use crate::client::{Product, ProviderClient, RoaMethod};
use crate::error::Result;
use crate::retry::{retry, retry_on};
use crate::schema::validation::{string_len_between, string_match};
use crate::schema::{Attribute, AttributeType, ResourceData, Schema, TimeoutKind};
use crate::services::{DatahubService, not_found_on, project_path};
use crate::traits::Resource;
use crate::utils::datetime::format_timestamp;
use crate::utils::json_path;

const DEFAULT_COMMENT: &str = "project added by alicloud-provider";

pub struct DatahubProject;

impl DatahubProject {
    async fn send(
        d: &ResourceData,
        kind: TimeoutKind,
        client: &ProviderClient,
        action: &str,
        method: RoaMethod,
        body: Value,
    ) -> Result<Value> {
        let api = client.product(Product::Datahub);
        let name = d.id().to_string();
        let path = project_path(&name);
        retry(d.timeout(kind), || {
            let body = body.clone();
            let path = path.as_str();
            async move { api.roa(action, method, path, body).await.map_err(|e| retry_on(e, &[])) }
        })
        .await
        .map_err(|e| not_found_on(e, &["NoSuchProject"], "DatahubProject", &name).context(action, &name))
    }
}

#[async_trait]
impl Resource for DatahubProject {
    fn type_name(&self) -> &'static str {
        "alicloud_datahub_project"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attribute(
                "name",
                Attribute::required(AttributeType::String)
                    .validate(string_match(
                        r"^[a-zA-Z][a-zA-Z0-9_]{2,31}$",
                        "must start with a letter, contain only letters, digits and '_', and be 3 to 32 characters",
                    ))
                    .force_new(),
            )
            .attribute(
                "comment",
                Attribute::optional(AttributeType::String)
                    .default(DEFAULT_COMMENT)
                    .validate(string_len_between(0, 255)),
            )
            .attribute("create_time", Attribute::computed(AttributeType::String))
            .attribute("last_modify_time", Attribute::computed(AttributeType::String))
    }

    async fn create(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let name = d.get_string("name");
        d.set_id(name);
        let body = json!({ "Comment": d.get_string("comment") });
        Self::send(d, TimeoutKind::Create, client, "CreateProject", RoaMethod::Post, body).await?;
        self.read(d, client).await
    }

    async fn read(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        let project = match DatahubService::new(client).describe_project(d.id()).await {
            Ok(project) => project,
            Err(e) => return clear_if_gone(d, e),
        };

        let name = d.id().to_string();
        d.set("name", name);
        d.set_opt("comment", json_path::get_string(&project, "Comment"));
        d.set_opt("create_time", project.get("CreateTime").and_then(format_timestamp));
        d.set_opt(
            "last_modify_time",
            project.get("LastModifyTime").and_then(format_timestamp),
        );
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        if d.has_change("comment") {
            let body = json!({ "Comment": d.get_string("comment") });
            Self::send(d, TimeoutKind::Update, client, "UpdateProject", RoaMethod::Put, body).await?;
        }
        self.read(d, client).await
    }

    async fn delete(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()> {
        ignore_not_found(
            Self::send(d, TimeoutKind::Delete, client, "DeleteProject", RoaMethod::Delete, Value::Null).await,
        )
    }
}
