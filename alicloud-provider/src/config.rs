//! Provider configuration
//!
//! Explicit values from the provider block win; anything left unset falls back
//! to the `ALICLOUD_*` environment variables.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::Product;
use crate::error::{ProviderError, Result};
use crate::utils::log_sanitizer::redact_secret;

pub const ENV_ACCESS_KEY: &str = "ALICLOUD_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "ALICLOUD_SECRET_KEY";
pub const ENV_SECURITY_TOKEN: &str = "ALICLOUD_SECURITY_TOKEN";
pub const ENV_REGION: &str = "ALICLOUD_REGION";

/// 默认连接超时（秒）
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// 默认请求超时（秒）
const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;
/// 传输层默认重试次数
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Wire protocol for API endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    #[default]
    #[serde(rename = "HTTPS")]
    Https,
    #[serde(rename = "HTTP")]
    Http,
}

impl Protocol {
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Http => "http",
        }
    }
}

/// Credentials, region and client tuning shared by every resource.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub security_token: Option<String>,
    pub region: Option<String>,
    /// Product code (`ecs`, `vpc`, ...) to endpoint host overrides.
    pub endpoints: BTreeMap<String, String>,
    pub protocol: Protocol,
    /// Seconds.
    pub client_connect_timeout: u64,
    /// Seconds.
    pub client_read_timeout: u64,
    /// Transport-level retries for network errors and HTTP 429/5xx.
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            secret_key: None,
            security_token: None,
            region: None,
            endpoints: BTreeMap::new(),
            protocol: Protocol::Https,
            client_connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            client_read_timeout: DEFAULT_READ_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("access_key", &self.access_key.as_deref().map(redact_secret))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "******"))
            .field(
                "security_token",
                &self.security_token.as_ref().map(|_| "******"),
            )
            .field("region", &self.region)
            .field("endpoints", &self.endpoints)
            .field("protocol", &self.protocol)
            .field("client_connect_timeout", &self.client_connect_timeout)
            .field("client_read_timeout", &self.client_read_timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl ProviderConfig {
    /// Configuration taken entirely from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.fill_from(|key| std::env::var(key).ok());
        config
    }

    /// Parses a provider block. Unset credentials and region fall back to the
    /// environment.
    pub fn from_value(value: &Value) -> Result<Self> {
        Self::from_value_with(value, |key| std::env::var(key).ok())
    }

    /// Like [`from_value`](Self::from_value) with an explicit variable lookup.
    pub fn from_value_with(value: &Value, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config: Self =
            serde_json::from_value(value.clone()).map_err(|e| ProviderError::Config {
                detail: e.to_string(),
            })?;
        config.fill_from(lookup);
        Ok(config)
    }

    fn fill_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let pick = |current: &mut Option<String>, key: &str| {
            if current.as_deref().is_none_or(str::is_empty) {
                *current = lookup(key).filter(|v| !v.is_empty());
            }
        };
        pick(&mut self.access_key, ENV_ACCESS_KEY);
        pick(&mut self.secret_key, ENV_SECRET_KEY);
        pick(&mut self.security_token, ENV_SECURITY_TOKEN);
        pick(&mut self.region, ENV_REGION);
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    #[must_use]
    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Overrides the endpoint host of one product.
    #[must_use]
    pub fn with_endpoint(mut self, product: Product, host: impl Into<String>) -> Self {
        self.endpoints.insert(product.code().to_string(), host.into());
        self
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the maximum number of automatic retries for transient errors (default: 2).
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let missing = |field: &str, env: &str| ProviderError::Config {
            detail: format!("'{field}' is required (or set {env})"),
        };
        if self.access_key.as_deref().is_none_or(str::is_empty) {
            return Err(missing("access_key", ENV_ACCESS_KEY));
        }
        if self.secret_key.as_deref().is_none_or(str::is_empty) {
            return Err(missing("secret_key", ENV_SECRET_KEY));
        }
        if self.region.as_deref().is_none_or(str::is_empty) {
            return Err(missing("region", ENV_REGION));
        }
        if self.client_read_timeout == 0 || self.client_connect_timeout == 0 {
            return Err(ProviderError::Config {
                detail: "client timeouts must be greater than zero".to_string(),
            });
        }
        for product in self.endpoints.keys() {
            if Product::from_code(product).is_none() {
                return Err(ProviderError::Config {
                    detail: format!("unknown product '{product}' in endpoints"),
                });
            }
        }
        Ok(())
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or_default()
    }

    /// Endpoint host for `product`: explicit override, else the product default.
    pub fn endpoint(&self, product: Product) -> String {
        self.endpoints
            .get(product.code())
            .filter(|host| !host.is_empty())
            .cloned()
            .unwrap_or_else(|| product.default_endpoint(self.region()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn explicit_values_win_over_env() {
        let config = ProviderConfig::from_value_with(
            &json!({ "access_key": "explicit-ak", "region": "cn-shanghai" }),
            env(&[
                (ENV_ACCESS_KEY, "env-ak"),
                (ENV_SECRET_KEY, "env-sk"),
                (ENV_REGION, "cn-beijing"),
            ]),
        );
        let config = config.ok();
        assert_eq!(
            config.as_ref().and_then(|c| c.access_key.as_deref()),
            Some("explicit-ak")
        );
        assert_eq!(
            config.as_ref().and_then(|c| c.secret_key.as_deref()),
            Some("env-sk")
        );
        assert_eq!(config.as_ref().map(ProviderConfig::region), Some("cn-shanghai"));
    }

    #[test]
    fn defaults_applied() {
        let config = ProviderConfig::from_value_with(&json!({}), env(&[])).ok();
        let config = config.unwrap_or_default();
        assert_eq!(config.protocol, Protocol::Https);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.client_read_timeout, 30);
    }

    #[test]
    fn validate_reports_missing_region() {
        let config = ProviderConfig::default().with_credentials("ak", "sk");
        let err = config.validate();
        assert!(
            matches!(&err, Err(ProviderError::Config { detail }) if detail.contains("region")),
            "unexpected: {err:?}"
        );
    }

    #[test]
    fn validate_rejects_unknown_endpoint_product() {
        let mut config = ProviderConfig::default()
            .with_credentials("ak", "sk")
            .with_region("cn-hangzhou");
        config.endpoints.insert("oss".into(), "oss.example.com".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn endpoint_resolution() {
        let config = ProviderConfig::default()
            .with_region("cn-hangzhou")
            .with_endpoint(Product::Ecs, "ecs.internal.example.com");
        assert_eq!(config.endpoint(Product::Ecs), "ecs.internal.example.com");
        assert_eq!(config.endpoint(Product::Vpc), "vpc.cn-hangzhou.aliyuncs.com");
        assert_eq!(config.endpoint(Product::Alidns), "alidns.aliyuncs.com");
        assert_eq!(
            config.endpoint(Product::ResourceManager),
            "resourcemanager.aliyuncs.com"
        );
        assert_eq!(config.endpoint(Product::Datahub), "dh-cn-hangzhou.aliyuncs.com");
    }

    #[test]
    fn debug_hides_secrets() {
        let config = ProviderConfig::default()
            .with_credentials("LTAI5tTestKeyId", "TestSecretKey123456")
            .with_security_token("sts-token");
        let out = format!("{config:?}");
        assert!(!out.contains("TestSecretKey123456"));
        assert!(!out.contains("sts-token"));
        assert!(!out.contains("LTAI5tTestKeyId"));
    }
}
