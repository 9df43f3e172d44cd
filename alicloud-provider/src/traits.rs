use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ApiRequest, ProviderClient};
use crate::error::{ProviderError, Result};
use crate::schema::{ResourceData, Schema};

/// 原始 API 错误（内部使用）
#[derive(Debug, Clone)]
pub(crate) struct RawApiError {
    /// 错误码（`Code` 或 ROA 风格的 `ErrorCode`）
    pub code: Option<String>,
    /// 原始错误消息
    pub message: String,
}

impl RawApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// 从错误响应体中提取错误码和消息，兼容 RPC 与 ROA 两种格式
    pub fn from_body(body: &Value) -> Option<Self> {
        let code = body
            .get("Code")
            .or_else(|| body.get("ErrorCode"))
            .and_then(Value::as_str)?;
        let message = body
            .get("Message")
            .or_else(|| body.get("ErrorMessage"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        Some(Self::with_code(code, message))
    }
}

/// 错误上下文信息（内部使用）
/// 用于在映射错误时提供额外信息
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorContext {
    /// 调用的 Action 名称
    pub action: String,
    /// 请求 ID（便于工单排查）
    pub request_id: Option<String>,
}

/// Provider 错误映射 Trait（内部使用）
/// 将原始 API 错误映射到统一错误类型
pub(crate) trait ProviderErrorMapper {
    /// 返回产品标识符
    fn product_name(&self) -> &'static str;

    /// 将原始 API 错误映射到统一错误类型
    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError;

    /// 快捷方法：解析错误
    fn parse_error(&self, detail: impl ToString) -> ProviderError {
        ProviderError::ParseError {
            product: self.product_name().to_string(),
            detail: detail.to_string(),
        }
    }

    /// 快捷方法：未归类的接口错误（fallback）
    fn unknown_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError {
        ProviderError::Api {
            product: self.product_name().to_string(),
            action: context.action,
            raw_code: raw.code,
            raw_message: raw.message,
            request_id: context.request_id,
        }
    }
}

/// Sends one vendor API request and returns the decoded response body.
///
/// [`HttpTransport`](crate::HttpTransport) is the real implementation; tests
/// inject scripted ones.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn invoke(&self, request: &ApiRequest) -> Result<Value>;
}

/// A managed resource type.
///
/// Handlers receive the working [`ResourceData`] and the shared client. Read
/// must call [`ResourceData::clear_id`] instead of failing when the vendor
/// object is gone; Delete must treat "already gone" as success.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name used by configurations, e.g. `alicloud_vpc`.
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn create(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()>;

    async fn read(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()>;

    async fn update(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()>;

    async fn delete(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()>;
}

/// A read-only lookup.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, d: &mut ResourceData, client: &ProviderClient) -> Result<()>;
}
