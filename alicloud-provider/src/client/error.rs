//! 阿里云错误映射
//!
//! 只有跨产品通用的错误码被归入专门的变体；其余保留为
//! `ProviderError::Api { raw_code, .. }`，由调用方按各自的错误码白名单判断
//! 是否重试、是否视为资源不存在。

use crate::client::Product;
use crate::error::ProviderError;
use crate::traits::{ErrorContext, ProviderErrorMapper, RawApiError};

pub(crate) struct AlicloudErrorMapper {
    pub product: Product,
}

impl ProviderErrorMapper for AlicloudErrorMapper {
    fn product_name(&self) -> &'static str {
        self.product.code()
    }

    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError {
        match raw.code.as_deref() {
            // ============ 认证错误 ============
            Some(
                "InvalidAccessKeyId.NotFound"
                | "InvalidAccessKeyId.Inactive"
                | "SignatureDoesNotMatch"
                | "IncompleteSignature"
                | "InvalidSecurityToken.Expired"
                | "InvalidSecurityToken.Malformed"
                | "InvalidSecurityToken.MismatchWithAccessKey",
            ) => ProviderError::InvalidCredentials {
                product: self.product_name().to_string(),
                raw_message: Some(raw.message),
            },

            // ============ 频率限流（可重试） ============
            Some(code) if code == "Throttling" || code.starts_with("Throttling.") => {
                ProviderError::RateLimited {
                    product: self.product_name().to_string(),
                    raw_code: raw.code.clone(),
                    retry_after: None,
                    raw_message: Some(raw.message),
                }
            }

            // ============ 权限/操作被拒绝 ============
            Some(
                "Forbidden"
                | "Forbidden.RAM"
                | "Forbidden.NoPermission"
                | "Forbidden.RiskControl"
                | "NoPermission"
                | "NoPermission.Role"
                | "Forbidden.AccessDenied",
            ) => ProviderError::PermissionDenied {
                product: self.product_name().to_string(),
                raw_code: raw.code,
                raw_message: Some(raw.message),
            },

            // ============ 其他错误 fallback ============
            _ => self.unknown_error(raw, context),
        }
    }
}
