use serde::{Deserialize, Serialize};

/// Unified error type for every resource, data source and client operation.
///
/// Variants fall into four classes that drive handler behaviour:
///
/// - **Not found**: [`NotFound`](Self::NotFound). Read handlers turn it into
///   state removal instead of a user-visible failure.
/// - **Retryable**: [`NetworkError`](Self::NetworkError),
///   [`Timeout`](Self::Timeout), [`RateLimited`](Self::RateLimited) and vendor
///   codes listed by a call site. Retried until the operation deadline, then
///   surfaced.
/// - **Fatal**: validation, permission and logic errors. Surfaced immediately.
/// - **Wait timeout**: [`WaitTimeout`](Self::WaitTimeout). A state-refresh loop
///   exceeded its deadline.
///
/// [`Context`](Self::Context) wraps any of the above with the action name and
/// resource identifier of the failing call; the classification helpers look
/// through it.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "code")]
pub enum ProviderError {
    /// A network-level error occurred (DNS resolution failure, connection refused, 5xx gateway).
    #[error("[{product}] Network error: {detail}")]
    NetworkError {
        /// Product whose endpoint produced the error.
        product: String,
        /// Error details.
        detail: String,
    },

    /// The HTTP request itself timed out.
    #[error("[{product}] Request timeout: {detail}")]
    Timeout {
        /// Product whose endpoint produced the error.
        product: String,
        /// Error details.
        detail: String,
    },

    /// API rate limit exceeded.
    #[error("[{product}] Rate limited{}", retry_after.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited {
        /// Product whose endpoint produced the error.
        product: String,
        /// Vendor error code, if the limit was reported in the response body.
        raw_code: Option<String>,
        /// Seconds to wait, from the `Retry-After` header.
        retry_after: Option<u64>,
        /// Original error message, if available.
        raw_message: Option<String>,
    },

    /// The access key is unknown or the signature was rejected.
    #[error("[{product}] Invalid credentials{}", raw_message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    InvalidCredentials {
        /// Product whose endpoint produced the error.
        product: String,
        /// Original error message, if available.
        raw_message: Option<String>,
    },

    /// The caller is not allowed to perform the action.
    #[error("[{product}] Permission denied{}", raw_message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    PermissionDenied {
        /// Product whose endpoint produced the error.
        product: String,
        /// Vendor error code.
        raw_code: Option<String>,
        /// Original error message, if available.
        raw_message: Option<String>,
    },

    /// The vendor object does not exist (or no longer exists).
    #[error("{resource} '{id}' not found{}", raw_message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    NotFound {
        /// Vendor object kind, e.g. `Instance`.
        resource: String,
        /// Identifier that was looked up.
        id: String,
        /// Vendor error code, when the lookup failed with one.
        raw_code: Option<String>,
        /// Original error message, if available.
        raw_message: Option<String>,
    },

    /// Any other error returned by the vendor API. The code is kept so that
    /// call sites can classify it against their own allowlists.
    #[error("[{product}] {action} failed: {}{raw_message}", raw_code.as_ref().map(|c| format!("{c}: ")).unwrap_or_default())]
    Api {
        /// Product that returned the error.
        product: String,
        /// Vendor action name.
        action: String,
        /// Vendor error code.
        raw_code: Option<String>,
        /// Vendor error message.
        raw_message: String,
        /// Request id for support tickets.
        request_id: Option<String>,
    },

    /// An attribute value was rejected before any request was sent.
    #[error("Invalid parameter '{param}': {detail}")]
    InvalidParameter {
        /// Attribute or parameter name.
        param: String,
        /// Why it was rejected.
        detail: String,
    },

    /// A stored identifier could not be split into its parts.
    #[error("Invalid resource id '{id}': {detail}")]
    InvalidResourceId {
        /// The offending identifier.
        id: String,
        /// Why it could not be parsed.
        detail: String,
    },

    /// An update tried to change an attribute that forces a new resource.
    #[error("Attribute '{attribute}' cannot be changed in place, the resource must be replaced")]
    RequiresReplacement {
        /// Attribute name.
        attribute: String,
    },

    /// A polled object reported one of its failure statuses.
    #[error("'{id}' failed to reach target status, current status is {status}{}", reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    FailedToReachTarget {
        /// Identifier of the polled object.
        id: String,
        /// Failure status that was observed.
        status: String,
        /// Vendor-supplied reason, if any.
        reason: Option<String>,
    },

    /// A polled object reported a status that is neither pending nor target.
    #[error("'{id}' entered unexpected status {status}, wanted one of [{}]", expected.join(", "))]
    UnexpectedState {
        /// Identifier of the polled object.
        id: String,
        /// Observed status.
        status: String,
        /// Target statuses.
        expected: Vec<String>,
    },

    /// A state-refresh loop exceeded its deadline.
    #[error("Timeout after {timeout_secs}s waiting for '{id}' to become [{}] (last status: {})", target.join(", "), last_status.as_deref().unwrap_or("none"))]
    WaitTimeout {
        /// Identifier of the polled object.
        id: String,
        /// Target statuses.
        target: Vec<String>,
        /// Last status observed, if the object was ever found.
        last_status: Option<String>,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },

    /// Provider configuration is incomplete or invalid.
    #[error("Invalid provider configuration: {detail}")]
    Config {
        /// What is wrong.
        detail: String,
    },

    /// No resource or data source is registered under the requested type name.
    #[error("Unsupported type '{type_name}'")]
    UnsupportedType {
        /// Requested type name.
        type_name: String,
    },

    /// Failed to parse an API response.
    #[error("[{product}] Parse error: {detail}")]
    ParseError {
        /// Product whose response could not be parsed.
        product: String,
        /// Error details.
        detail: String,
    },

    /// Failed to serialize a request.
    #[error("[{product}] Serialization error: {detail}")]
    SerializationError {
        /// Product the request was meant for.
        product: String,
        /// Error details.
        detail: String,
    },

    /// An error annotated with the action and resource id it happened in.
    #[error("{action} ({id}): {source}")]
    Context {
        /// Vendor action or handler name.
        action: String,
        /// Resource identifier (may be empty before creation).
        id: String,
        /// Wrapped error.
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Wraps `self` with the action name and resource id of the failing call.
    #[must_use]
    pub fn context(self, action: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Context {
            action: action.into(),
            id: id.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all [`Context`](Self::Context) layers removed.
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Raw vendor error code, if the error came from a vendor response.
    pub fn code(&self) -> Option<&str> {
        match self.root() {
            Self::Api { raw_code, .. }
            | Self::RateLimited { raw_code, .. }
            | Self::PermissionDenied { raw_code, .. }
            | Self::NotFound { raw_code, .. } => raw_code.as_deref(),
            _ => None,
        }
    }

    /// Whether the object in question does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound { .. })
    }

    /// Transport-level transient failures. Call sites may widen this with
    /// their own code allowlists (see [`crate::retry`]).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            Self::NetworkError { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }

    /// 是否为预期行为（用户输入、资源不存在等），用于日志分级。
    ///
    /// 返回 `true` 时应使用 `warn` 级别，`false` 时使用 `error` 级别。
    /// **新增变体时请同步更新此方法。**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self.root(),
            Self::InvalidCredentials { .. }
                | Self::PermissionDenied { .. }
                | Self::NotFound { .. }
                | Self::InvalidParameter { .. }
                | Self::InvalidResourceId { .. }
                | Self::RequiresReplacement { .. }
                | Self::Config { .. }
                | Self::UnsupportedType { .. }
        )
    }
}

/// Convenience type alias for `Result<T, ProviderError>`.
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(code: &str) -> ProviderError {
        ProviderError::Api {
            product: "ecs".to_string(),
            action: "DeleteInstance".to_string(),
            raw_code: Some(code.to_string()),
            raw_message: "boom".to_string(),
            request_id: None,
        }
    }

    #[test]
    fn display_network_error() {
        let e = ProviderError::NetworkError {
            product: "ecs".to_string(),
            detail: "connection refused".to_string(),
        };
        assert_eq!(e.to_string(), "[ecs] Network error: connection refused");
    }

    #[test]
    fn display_rate_limited_with_retry() {
        let e = ProviderError::RateLimited {
            product: "vpc".to_string(),
            raw_code: None,
            retry_after: Some(30),
            raw_message: None,
        };
        assert_eq!(e.to_string(), "[vpc] Rate limited (retry after 30s)");
    }

    #[test]
    fn display_rate_limited_without_retry() {
        let e = ProviderError::RateLimited {
            product: "alidns".to_string(),
            raw_code: Some("Throttling.User".to_string()),
            retry_after: None,
            raw_message: None,
        };
        assert_eq!(e.to_string(), "[alidns] Rate limited");
    }

    #[test]
    fn display_invalid_credentials() {
        let e = ProviderError::InvalidCredentials {
            product: "ecs".to_string(),
            raw_message: Some("bad key".to_string()),
        };
        assert_eq!(e.to_string(), "[ecs] Invalid credentials: bad key");
    }

    #[test]
    fn display_not_found() {
        let e = ProviderError::NotFound {
            resource: "Instance".to_string(),
            id: "i-123".to_string(),
            raw_code: None,
            raw_message: None,
        };
        assert_eq!(e.to_string(), "Instance 'i-123' not found");
    }

    #[test]
    fn display_api_error() {
        assert_eq!(
            api("IncorrectInstanceStatus").to_string(),
            "[ecs] DeleteInstance failed: IncorrectInstanceStatus: boom"
        );
    }

    #[test]
    fn display_wait_timeout() {
        let e = ProviderError::WaitTimeout {
            id: "vpc-1".to_string(),
            target: vec!["Available".to_string()],
            last_status: Some("Pending".to_string()),
            timeout_secs: 600,
        };
        assert_eq!(
            e.to_string(),
            "Timeout after 600s waiting for 'vpc-1' to become [Available] (last status: Pending)"
        );
    }

    #[test]
    fn display_context_chain() {
        let e = api("Forbidden").context("alicloud_instance.delete", "i-1");
        assert_eq!(
            e.to_string(),
            "alicloud_instance.delete (i-1): [ecs] DeleteInstance failed: Forbidden: boom"
        );
    }

    #[test]
    fn classification_looks_through_context() {
        let e = ProviderError::NotFound {
            resource: "Vpc".to_string(),
            id: "vpc-1".to_string(),
            raw_code: Some("InvalidVpcID.NotFound".to_string()),
            raw_message: None,
        }
        .context("DescribeVpcs", "vpc-1")
        .context("alicloud_vpc.read", "vpc-1");

        assert!(e.is_not_found());
        assert!(e.is_expected());
        assert_eq!(e.code(), Some("InvalidVpcID.NotFound"));
    }

    #[test]
    fn retryable_variants() {
        assert!(
            ProviderError::Timeout {
                product: "t".into(),
                detail: "x".into(),
            }
            .is_retryable()
        );
        assert!(!api("Throttling").is_retryable());
        assert!(
            !ProviderError::InvalidParameter {
                param: "ttl".into(),
                detail: "bad".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn serialize_json_tagged_by_code() {
        let e = ProviderError::RateLimited {
            product: "ecs".to_string(),
            raw_code: None,
            retry_after: Some(60),
            raw_message: Some("too many requests".to_string()),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"code\":\"RateLimited\""));
        assert!(json.contains("\"retry_after\":60"));
    }

    #[test]
    fn deserialize_context_keeps_message() {
        let original = api("DependencyViolation").context("alicloud_vpc.delete", "vpc-9");
        let json = serde_json::to_string(&original).unwrap();
        let back: ProviderError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), original.to_string());
        assert_eq!(back.code(), Some("DependencyViolation"));
    }
}
