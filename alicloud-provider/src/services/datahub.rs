//! DataHub describe helpers (ROA)

use serde_json::Value;

use super::not_found_on;
use crate::client::{Product, ProviderClient, RoaMethod};
use crate::error::Result;

/// Path of a project resource.
pub fn project_path(name: &str) -> String {
    format!("/projects/{}", urlencoding::encode(name))
}

#[derive(Clone, Copy)]
pub struct DatahubService<'a> {
    client: &'a ProviderClient,
}

impl<'a> DatahubService<'a> {
    pub fn new(client: &'a ProviderClient) -> Self {
        Self { client }
    }

    /// `GET /projects/{name}`.
    pub async fn describe_project(&self, name: &str) -> Result<Value> {
        self.client
            .product(Product::Datahub)
            .roa("GetProject", RoaMethod::Get, &project_path(name), Value::Null)
            .await
            .map_err(|e| not_found_on(e, &["NoSuchProject"], "DatahubProject", name).context("GetProject", name))
    }
}
