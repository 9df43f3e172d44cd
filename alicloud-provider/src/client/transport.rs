//! HTTP transport (ACS3-HMAC-SHA256 signed RPC and ROA requests)

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method};
use serde_json::Value;

use super::error::AlicloudErrorMapper;
use super::query::serialize_to_query_string;
use super::sign::{SignRequest, content_sha256, sign};
use super::{ApiRequest, RequestStyle, RoaMethod};
use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::http_client::Exchange;
use crate::traits::{ApiTransport, ProviderErrorMapper};

/// 创建带超时配置的 HTTP Client
fn create_http_client(connect_timeout: u64, read_timeout: u64) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout))
        .timeout(Duration::from_secs(read_timeout))
        .build()
        .map_err(|e| ProviderError::Config {
            detail: format!("failed to create HTTP client: {e}"),
        })
}

/// [`ApiTransport`] over HTTPS with request signing.
///
/// ```rust,no_run
/// use alicloud_provider::{HttpTransport, ProviderConfig};
///
/// let config = ProviderConfig::default()
///     .with_credentials("your-access-key", "your-secret-key")
///     .with_region("cn-hangzhou");
/// let transport = HttpTransport::new(&config)?;
/// # Ok::<(), alicloud_provider::ProviderError>(())
/// ```
pub struct HttpTransport {
    client: Client,
    config: ProviderConfig,
    access_key_id: String,
    access_key_secret: String,
}

impl HttpTransport {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: create_http_client(config.client_connect_timeout, config.client_read_timeout)?,
            access_key_id: config.access_key.clone().unwrap_or_default(),
            access_key_secret: config.secret_key.clone().unwrap_or_default(),
            config: config.clone(),
        })
    }

    fn scheme(&self) -> &'static str {
        self.config.protocol.scheme()
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn invoke(&self, request: &ApiRequest) -> Result<Value> {
        let mapper = AlicloudErrorMapper {
            product: request.product,
        };
        let product = mapper.product_name();
        let host = self.config.endpoint(request.product);

        // RPC: 参数进 query string，body 为空；ROA: JSON body
        let (method, pathname, query, body) = match &request.style {
            RequestStyle::Rpc => (
                RoaMethod::Post,
                "/".to_string(),
                serialize_to_query_string(&request.params)?,
                Vec::new(),
            ),
            RequestStyle::Roa { method, pathname } => {
                let body = if request.params.is_null() {
                    Vec::new()
                } else {
                    serde_json::to_vec(&request.params).map_err(|e| {
                        ProviderError::SerializationError {
                            product: product.to_string(),
                            detail: e.to_string(),
                        }
                    })?
                };
                (*method, pathname.clone(), String::new(), body)
            }
        };

        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let nonce = uuid::Uuid::new_v4().to_string();
        let body_hash = content_sha256(&body);

        let authorization = sign(
            &self.access_key_id,
            &self.access_key_secret,
            &SignRequest {
                method: method.as_str(),
                pathname: &pathname,
                query: &query,
                host: &host,
                action: &request.action,
                version: request.version,
                timestamp: &timestamp,
                nonce: &nonce,
                content_sha256: &body_hash,
                security_token: self.config.security_token.as_deref(),
            },
        );

        let mut url = format!("{}://{host}{pathname}", self.scheme());
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        let http_method = match method {
            RoaMethod::Get => Method::GET,
            RoaMethod::Post => Method::POST,
            RoaMethod::Put => Method::PUT,
            RoaMethod::Delete => Method::DELETE,
        };

        let mut builder = self
            .client
            .request(http_method, &url)
            .header("Host", &host)
            .header("x-acs-action", &request.action)
            .header("x-acs-version", request.version)
            .header("x-acs-date", &timestamp)
            .header("x-acs-signature-nonce", &nonce)
            .header("x-acs-content-sha256", &body_hash)
            .header("Authorization", authorization);
        if let Some(token) = &self.config.security_token {
            builder = builder.header("x-acs-security-token", token);
        }
        if !body.is_empty() {
            builder = builder.header("Content-Type", "application/json").body(body);
        }

        Exchange {
            mapper: &mapper,
            action: &request.action,
            max_retries: self.config.max_retries,
        }
        .send(builder)
        .await
    }
}
