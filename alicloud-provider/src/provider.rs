//! Resource and data source registry
//!
//! [`AlicloudProvider`] is what the hosting tool talks to. It looks up the
//! handler for a type name, checks the configuration against the schema,
//! runs the handler and hands back the resulting [`ResourceState`].

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value};

use crate::client::ProviderClient;
use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::schema::{ResourceData, ResourceState, Schema};
use crate::traits::{DataSource, Resource};
use crate::{data_sources, resources};

/// Lifecycle entry points for every registered type.
pub struct AlicloudProvider {
    client: ProviderClient,
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
}

impl AlicloudProvider {
    /// Registers every built-in type against `client`.
    pub fn new(client: ProviderClient) -> Self {
        Self {
            client,
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: data_sources::all()
                .into_iter()
                .map(|ds| (ds.type_name(), ds))
                .collect(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Ok(Self::new(ProviderClient::from_config(config)?))
    }

    pub fn client(&self) -> &ProviderClient {
        &self.client
    }

    /// Schemas of all resource types, keyed by type name.
    pub fn schemas(&self) -> BTreeMap<&'static str, Schema> {
        self.resources
            .iter()
            .map(|(name, r)| (*name, r.schema()))
            .collect()
    }

    /// Schemas of all data sources, keyed by type name.
    pub fn data_source_schemas(&self) -> BTreeMap<&'static str, Schema> {
        self.data_sources
            .iter()
            .map(|(name, ds)| (*name, ds.schema()))
            .collect()
    }

    fn resource(&self, type_name: &str) -> Result<&Arc<dyn Resource>> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnsupportedType {
                type_name: type_name.to_string(),
            })
    }

    /// Creates a new resource from `config`.
    pub async fn create(&self, type_name: &str, config: Map<String, Value>) -> Result<ResourceState> {
        let resource = self.resource(type_name)?;
        let schema = resource.schema();
        let mut config = config;
        check(type_name, "create", "", schema.validate_config(&config))?;
        schema.apply_defaults(&mut config);
        schema.normalize(&mut config);

        log::debug!("Creating {type_name}");
        let mut d = ResourceData::new(config, schema.default_timeouts());
        let result = resource.create(&mut d, &self.client).await;
        check(type_name, "create", d.id(), result)?;
        log::info!("Created {type_name} '{}'", d.id());
        Ok(d.into_state())
    }

    /// Refreshes `state`. `None` means the object no longer exists.
    pub async fn read(&self, type_name: &str, state: ResourceState) -> Result<Option<ResourceState>> {
        let resource = self.resource(type_name)?;
        if state.id.is_empty() {
            return Ok(None);
        }

        let mut d = ResourceData::from_state(state, resource.schema().default_timeouts());
        let id = d.id().to_string();
        let result = resource.read(&mut d, &self.client).await;
        check(type_name, "read", &id, result)?;
        Ok((!d.id().is_empty()).then(|| d.into_state()))
    }

    /// Applies `config` to an existing resource in place.
    ///
    /// Fails with [`ProviderError::RequiresReplacement`] when a force-new
    /// attribute would change.
    pub async fn update(
        &self,
        type_name: &str,
        prior: ResourceState,
        config: Map<String, Value>,
    ) -> Result<ResourceState> {
        let resource = self.resource(type_name)?;
        let schema = resource.schema();
        let id = prior.id.clone();
        let mut planned = config;
        check(type_name, "update", &id, schema.validate_config(&planned))?;
        schema.apply_defaults(&mut planned);
        schema.carry_computed(&prior.attributes, &mut planned);
        schema.normalize(&mut planned);
        schema.suppress_diffs(&prior.attributes, &mut planned);

        if let Some(attribute) = schema
            .replacement_attributes(&prior.attributes, &planned)
            .into_iter()
            .next()
        {
            return check(
                type_name,
                "update",
                &id,
                Err(ProviderError::RequiresReplacement { attribute }),
            );
        }

        log::debug!("Updating {type_name} '{id}'");
        let mut d = ResourceData::for_update(prior, planned, schema.default_timeouts());
        let result = resource.update(&mut d, &self.client).await;
        check(type_name, "update", &id, result)?;
        Ok(d.into_state())
    }

    pub async fn delete(&self, type_name: &str, state: ResourceState) -> Result<()> {
        let resource = self.resource(type_name)?;
        let mut d = ResourceData::from_state(state, resource.schema().default_timeouts());
        let id = d.id().to_string();

        log::debug!("Deleting {type_name} '{id}'");
        let result = resource.delete(&mut d, &self.client).await;
        check(type_name, "delete", &id, result)?;
        log::info!("Deleted {type_name} '{id}'");
        Ok(())
    }

    /// Adopts an existing object by id.
    pub async fn import(&self, type_name: &str, id: &str) -> Result<ResourceState> {
        let state = ResourceState::new(id, Map::new());
        match self.read(type_name, state).await? {
            Some(state) => Ok(state),
            None => check(
                type_name,
                "import",
                id,
                Err(ProviderError::NotFound {
                    resource: type_name.to_string(),
                    id: id.to_string(),
                    raw_code: None,
                    raw_message: None,
                }),
            ),
        }
    }

    /// Refreshes several resources concurrently. Results keep input order.
    pub async fn refresh(&self, items: Vec<(String, ResourceState)>) -> Vec<Result<Option<ResourceState>>> {
        join_all(
            items
                .into_iter()
                .map(|(type_name, state)| async move { self.read(&type_name, state).await }),
        )
        .await
    }

    pub async fn read_data_source(&self, type_name: &str, config: Map<String, Value>) -> Result<ResourceState> {
        let data_source = self
            .data_sources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnsupportedType {
                type_name: type_name.to_string(),
            })?;
        let schema = data_source.schema();
        let mut config = config;
        check(type_name, "read", "", schema.validate_config(&config))?;
        schema.apply_defaults(&mut config);

        let mut d = ResourceData::new(config, schema.default_timeouts());
        let result = data_source.read(&mut d, &self.client).await;
        check(type_name, "read", d.id(), result)?;
        Ok(d.into_state())
    }
}

/// Adds `(<type>.<op>, id)` context to a failure and logs it.
fn check<T>(type_name: &str, op: &str, id: &str, result: Result<T>) -> Result<T> {
    result.map_err(|e| {
        let e = e.context(format!("{type_name}.{op}"), id);
        if e.is_expected() {
            log::warn!("{e}");
        } else {
            log::error!("{e}");
        }
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiRequest;
    use crate::traits::ApiTransport;
    use async_trait::async_trait;
    use serde_json::json;

    struct Unreachable;

    #[async_trait]
    impl ApiTransport for Unreachable {
        async fn invoke(&self, request: &ApiRequest) -> Result<Value> {
            Err(ProviderError::NetworkError {
                product: request.product.to_string(),
                detail: format!("unexpected call to {}", request.action),
            })
        }
    }

    fn provider() -> AlicloudProvider {
        AlicloudProvider::new(ProviderClient::new("cn-hangzhou", Arc::new(Unreachable)))
    }

    fn as_map(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else { unreachable!() };
        map
    }

    #[test]
    fn registry_lists_every_type() {
        let p = provider();
        assert_eq!(p.schemas().len(), 8);
        assert!(p.schemas().contains_key("alicloud_vpc"));
        assert!(p.data_source_schemas().contains_key("alicloud_instances"));
    }

    #[tokio::test]
    async fn unknown_type_is_rejected() {
        let err = provider().create("alicloud_nope", Map::new()).await;
        assert!(matches!(err, Err(ProviderError::UnsupportedType { .. })));
    }

    #[tokio::test]
    async fn invalid_config_never_reaches_the_api() {
        let err = provider()
            .create("alicloud_vpc", as_map(json!({ "cidr_block": "10.0.0.0/33" })))
            .await
            .map(|_| ());
        let Err(err) = err else { unreachable!() };
        assert!(matches!(err.root(), ProviderError::InvalidParameter { .. }));
        assert!(err.to_string().contains("alicloud_vpc.create"));
    }

    #[tokio::test]
    async fn force_new_change_requires_replacement() {
        let prior = ResourceState::new(
            "vpc-1",
            as_map(json!({ "cidr_block": "10.0.0.0/16", "vpc_name": "a", "status": "Available" })),
        );
        let err = provider()
            .update("alicloud_vpc", prior, as_map(json!({ "cidr_block": "172.16.0.0/12" })))
            .await
            .map(|_| ());
        let Err(err) = err else { unreachable!() };
        assert!(matches!(
            err.root(),
            ProviderError::RequiresReplacement { attribute } if attribute == "cidr_block"
        ));
    }

    #[tokio::test]
    async fn read_without_id_is_gone() {
        let state = provider()
            .read("alicloud_vpc", ResourceState::default())
            .await;
        assert!(matches!(state, Ok(None)));
    }
}
