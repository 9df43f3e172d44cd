//! Vendor client
//!
//! [`ProviderClient`] is the explicit client registry handed to every handler:
//! the region plus a shared [`ApiTransport`]. Per-product access goes through
//! [`ProductClient`], which fills in the API version and request style.

mod error;
mod query;
mod sign;
mod transport;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::traits::ApiTransport;

pub use query::{flatten_value, serialize_to_query_string};
pub use transport::HttpTransport;

/// Alibaba Cloud products used by the resources in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Product {
    Ecs,
    Vpc,
    Alidns,
    ResourceManager,
    Datahub,
}

impl Product {
    pub const ALL: [Self; 5] = [
        Self::Ecs,
        Self::Vpc,
        Self::Alidns,
        Self::ResourceManager,
        Self::Datahub,
    ];

    /// Lowercase product code, used as the `endpoints` key and in logs.
    pub fn code(self) -> &'static str {
        match self {
            Self::Ecs => "ecs",
            Self::Vpc => "vpc",
            Self::Alidns => "alidns",
            Self::ResourceManager => "resourcemanager",
            Self::Datahub => "datahub",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }

    /// API version sent as `x-acs-version`.
    pub fn version(self) -> &'static str {
        match self {
            Self::Ecs => "2014-05-26",
            Self::Vpc => "2016-04-28",
            Self::Alidns => "2015-01-09",
            Self::ResourceManager => "2020-03-31",
            Self::Datahub => "2019-11-20",
        }
    }

    /// Endpoint host when no override is configured.
    pub fn default_endpoint(self, region: &str) -> String {
        match self {
            Self::Ecs => format!("ecs.{region}.aliyuncs.com"),
            Self::Vpc => format!("vpc.{region}.aliyuncs.com"),
            Self::Datahub => format!("dh-{region}.aliyuncs.com"),
            // central endpoints
            Self::Alidns => "alidns.aliyuncs.com".to_string(),
            Self::ResourceManager => "resourcemanager.aliyuncs.com".to_string(),
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// HTTP method of a ROA request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoaMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RoaMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// RPC requests carry their parameters in the query string; ROA requests
/// address a path and carry a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStyle {
    Rpc,
    Roa { method: RoaMethod, pathname: String },
}

/// One vendor API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub product: Product,
    pub action: String,
    pub version: &'static str,
    pub style: RequestStyle,
    /// RPC: query parameters (nested values are flattened). ROA: JSON body,
    /// `Value::Null` for none.
    pub params: Value,
}

impl ApiRequest {
    /// Top-level parameter lookup, handy for assertions and logging.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

/// Region-scoped access to every product.
#[derive(Clone)]
pub struct ProviderClient {
    region_id: String,
    transport: Arc<dyn ApiTransport>,
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("region_id", &self.region_id)
            .finish_non_exhaustive()
    }
}

impl ProviderClient {
    pub fn new(region_id: impl Into<String>, transport: Arc<dyn ApiTransport>) -> Self {
        Self {
            region_id: region_id.into(),
            transport,
        }
    }

    /// Validates `config` and builds an HTTP-backed client.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(config.region(), Arc::new(transport)))
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn product(&self, product: Product) -> ProductClient<'_> {
        ProductClient {
            product,
            transport: self.transport.as_ref(),
        }
    }
}

/// Borrowed per-product handle. `Copy`, so retry closures can capture it.
#[derive(Clone, Copy)]
pub struct ProductClient<'a> {
    product: Product,
    transport: &'a dyn ApiTransport,
}

impl ProductClient<'_> {
    pub fn product(&self) -> Product {
        self.product
    }

    /// Sends an RPC-style action.
    pub async fn rpc(&self, action: &str, params: Value) -> Result<Value> {
        let request = ApiRequest {
            product: self.product,
            action: action.to_string(),
            version: self.product.version(),
            style: RequestStyle::Rpc,
            params,
        };
        self.transport.invoke(&request).await
    }

    /// Sends a ROA-style request. `action` names the call in logs and errors.
    pub async fn roa(
        &self,
        action: &str,
        method: RoaMethod,
        pathname: &str,
        body: Value,
    ) -> Result<Value> {
        let request = ApiRequest {
            product: self.product,
            action: action.to_string(),
            version: self.product.version(),
            style: RequestStyle::Roa {
                method,
                pathname: pathname.to_string(),
            },
            params: body,
        };
        self.transport.invoke(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_codes_round_trip() {
        for product in Product::ALL {
            assert_eq!(Product::from_code(product.code()), Some(product));
        }
        assert_eq!(Product::from_code("oss"), None);
    }

    #[test]
    fn regional_endpoints() {
        assert_eq!(
            Product::Ecs.default_endpoint("eu-central-1"),
            "ecs.eu-central-1.aliyuncs.com"
        );
        assert_eq!(
            Product::Datahub.default_endpoint("cn-beijing"),
            "dh-cn-beijing.aliyuncs.com"
        );
    }
}
