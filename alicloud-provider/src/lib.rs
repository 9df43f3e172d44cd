//! # alicloud-provider
//!
//! CRUD resource adapters for Alibaba Cloud, shaped for an
//! infrastructure-as-code host: the host hands over a type name plus
//! desired/prior attributes, the adapter validates them, calls the vendor API,
//! waits for eventual consistency and returns the new state.
//!
//! ## Supported types
//!
//! | Type | Product | Identifier |
//! |------|---------|------------|
//! | `alicloud_instance` | ECS | `InstanceId` |
//! | `alicloud_security_group_rule` | ECS | `group:direction:protocol:ports:nic:peer:policy:priority` |
//! | `alicloud_vpc` | VPC | `VpcId` |
//! | `alicloud_network_acl_entries` | VPC | `network_acl_id:direction` |
//! | `alicloud_alidns_domain` | Alidns | domain name |
//! | `alicloud_alidns_record` | Alidns | `RecordId` |
//! | `alicloud_datahub_project` | DataHub (ROA) | project name |
//! | `alicloud_resource_manager_service_linked_role` | Resource Manager | `service_name:role_name` |
//!
//! Data sources: `alicloud_instances`, `alicloud_alidns_domains`.
//!
//! ## Feature Flags
//!
//! - **`native-tls`** *(default)*: use the platform's native TLS implementation.
//! - **`rustls`**: use rustls. Recommended for cross-compilation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use alicloud_provider::{AlicloudProvider, ProviderConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials and region from ALICLOUD_* environment variables
//!     let provider = AlicloudProvider::from_config(&ProviderConfig::from_env())?;
//!
//!     let Some(config) = json!({ "cidr_block": "10.0.0.0/16", "vpc_name": "demo" })
//!         .as_object()
//!         .cloned()
//!     else {
//!         return Ok(());
//!     };
//!     let state = provider.create("alicloud_vpc", config).await?;
//!     println!("created {}", state.id);
//!
//!     provider.delete("alicloud_vpc", state).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`Result<T, ProviderError>`](ProviderError).
//! Errors raised inside a handler are wrapped with the failing action and
//! resource id ([`ProviderError::Context`]); the classification helpers
//! (`is_not_found`, `is_retryable`, `is_expected`, `code`) look through the
//! wrappers.
//!
//! - [`ProviderError::NotFound`]: the object is gone. Read handlers drop it
//!   from state instead of failing.
//! - [`ProviderError::RateLimited`] / [`ProviderError::NetworkError`]: retried
//!   until the operation deadline.
//! - [`ProviderError::FailedToReachTarget`]: a wait observed a failure status.
//! - [`ProviderError::WaitTimeout`]: a wait ran out of time.

pub mod client;
mod config;
pub mod data_sources;
mod error;
mod http_client;
pub mod identifier;
mod provider;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod services;
mod traits;
mod utils;
pub mod wait;

// Re-export error types
pub use error::{ProviderError, Result};

pub use config::{Protocol, ProviderConfig};

pub use client::{
    ApiRequest, HttpTransport, Product, ProductClient, ProviderClient, RequestStyle, RoaMethod,
};

// Re-export core traits
pub use traits::{ApiTransport, DataSource, Resource};

pub use provider::AlicloudProvider;

pub use schema::{Attribute, AttributeType, ResourceData, ResourceState, Schema, TimeoutKind, Timeouts};

// Re-export utils module
pub use utils::{datetime, json_path};
