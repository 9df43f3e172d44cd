//! One signed request/response exchange with a vendor endpoint
//!
//! [`Exchange::send`] puts a signed `RequestBuilder` on the wire, resends it
//! while the failure is a transport one, then decodes the Alibaba Cloud
//! response envelope into a JSON body or a mapped [`ProviderError`].
//!
//! # Transport retry
//! Connection errors, request timeouts, HTTP 429 and 502-504 are resent with
//! exponential backoff. Vendor error codes in the body are decoded only after
//! the last attempt; whether to retry those is decided by [`crate::retry`] at
//! the call site.

use std::time::Duration;

use reqwest::RequestBuilder;
use serde_json::{Map, Value};

use crate::error::{ProviderError, Result};
use crate::traits::{ErrorContext, ProviderErrorMapper, RawApiError};
use crate::utils::log_sanitizer::truncate_for_log;

/// `Retry-After` values above this are clamped.
const MAX_RETRY_AFTER_SECS: u64 = 30;
const MAX_BACKOFF_MS: u64 = 10_000;

/// HTTP status and raw body of one attempt.
struct RawResponse {
    status: u16,
    body: String,
}

/// Sends one vendor action for a product.
pub(crate) struct Exchange<'a, M: ProviderErrorMapper> {
    pub mapper: &'a M,
    pub action: &'a str,
    /// Resends after the first attempt; 0 sends exactly once.
    pub max_retries: u32,
}

impl<M: ProviderErrorMapper> Exchange<'_, M> {
    fn product(&self) -> &'static str {
        self.mapper.product_name()
    }

    pub async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = self.send_with_retry(request).await?;
        self.decode(&response)
    }

    async fn send_with_retry(&self, request: RequestBuilder) -> Result<RawResponse> {
        let product = self.product();
        let mut attempt = 0;
        loop {
            // a streamed body cannot be cloned, so it gets a single attempt
            let Some(this_try) = request.try_clone() else {
                log::warn!("[{product}] {} body is not replayable, sending once", self.action);
                return self.send_once(request).await;
            };

            match self.send_once(this_try).await {
                Err(e) if attempt < self.max_retries && is_transport_retryable(&e) => {
                    let delay = retry_delay(&e, attempt);
                    attempt += 1;
                    log::warn!(
                        "[{product}] {} attempt {attempt}/{} failed, resending in {:.1}s: {e}",
                        self.action,
                        self.max_retries,
                        delay.as_secs_f32(),
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn send_once(&self, request: RequestBuilder) -> Result<RawResponse> {
        let product = self.product();
        log::debug!("[{product}] -> {}", self.action);

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(product, &e))?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let body = response.text().await.map_err(|e| ProviderError::NetworkError {
            product: product.to_string(),
            detail: format!("failed to read response body: {e}"),
        })?;
        log::debug!(
            "[{product}] <- {} HTTP {status}: {}",
            self.action,
            truncate_for_log(&body)
        );

        match status {
            429 => Err(ProviderError::RateLimited {
                product: product.to_string(),
                raw_code: None,
                retry_after,
                raw_message: Some(body),
            }),
            502..=504 => Err(ProviderError::NetworkError {
                product: product.to_string(),
                detail: format!("HTTP {status}: {}", truncate_for_log(&body)),
            }),
            _ => Ok(RawResponse { status, body }),
        }
    }

    /// Vendor envelope to body or error. RPC errors carry `Code`/`Message`,
    /// ROA errors `ErrorCode`/`ErrorMessage`; some actions answer an empty body.
    fn decode(&self, response: &RawResponse) -> Result<Value> {
        let product = self.product();
        let parsed = serde_json::from_str::<Value>(&response.body);

        if response.status >= 400 {
            let body = parsed.ok();
            let raw = body
                .as_ref()
                .and_then(RawApiError::from_body)
                .unwrap_or_else(|| {
                    RawApiError::new(format!(
                        "HTTP {}: {}",
                        response.status,
                        truncate_for_log(&response.body)
                    ))
                });
            log::error!("[{product}] {} failed: {:?} - {}", self.action, raw.code, raw.message);
            return Err(self.mapper.map_error(raw, self.context(body.as_ref())));
        }

        if response.body.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        let value = parsed.map_err(|e| {
            log::error!(
                "[{product}] {} returned malformed JSON: {}",
                self.action,
                truncate_for_log(&response.body)
            );
            self.mapper.parse_error(e)
        })?;

        // a few gateways answer 200 with an error envelope
        if let Some(raw) = RawApiError::from_body(&value)
            && value.get("Message").or_else(|| value.get("ErrorMessage")).is_some()
        {
            log::error!("[{product}] {} failed: {:?} - {}", self.action, raw.code, raw.message);
            return Err(self.mapper.map_error(raw, self.context(Some(&value))));
        }
        Ok(value)
    }

    fn context(&self, body: Option<&Value>) -> ErrorContext {
        ErrorContext {
            action: self.action.to_string(),
            request_id: body
                .and_then(|v| v.get("RequestId"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

fn transport_error(product: &str, e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            product: product.to_string(),
            detail: e.to_string(),
        }
    } else {
        ProviderError::NetworkError {
            product: product.to_string(),
            detail: e.to_string(),
        }
    }
}

fn is_transport_retryable(error: &ProviderError) -> bool {
    matches!(
        error,
        ProviderError::NetworkError { .. }
            | ProviderError::Timeout { .. }
            | ProviderError::RateLimited { .. }
    )
}

/// `Retry-After` when the server sent one, exponential backoff otherwise.
fn retry_delay(error: &ProviderError, attempt: u32) -> Duration {
    match error {
        ProviderError::RateLimited {
            retry_after: Some(secs),
            ..
        } => Duration::from_secs((*secs).min(MAX_RETRY_AFTER_SECS)),
        _ => backoff_delay(attempt),
    }
}

/// 100ms, 200ms, 400ms, ... capped at 10s.
fn backoff_delay(attempt: u32) -> Duration {
    let ms = 100_u64.saturating_mul(1_u64 << attempt.min(20));
    Duration::from_millis(ms.min(MAX_BACKOFF_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestMapper;

    impl ProviderErrorMapper for TestMapper {
        fn product_name(&self) -> &'static str {
            "vpc"
        }

        fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError {
            self.unknown_error(raw, context)
        }
    }

    fn decode(status: u16, body: &str) -> Result<Value> {
        Exchange {
            mapper: &TestMapper,
            action: "DescribeVpcs",
            max_retries: 0,
        }
        .decode(&RawResponse {
            status,
            body: body.to_string(),
        })
    }

    #[test]
    fn transport_failures_are_resent() {
        for e in [
            ProviderError::NetworkError {
                product: "ecs".into(),
                detail: "reset".into(),
            },
            ProviderError::Timeout {
                product: "ecs".into(),
                detail: "read".into(),
            },
            ProviderError::RateLimited {
                product: "ecs".into(),
                raw_code: None,
                retry_after: None,
                raw_message: None,
            },
        ] {
            assert!(is_transport_retryable(&e), "{e}");
        }
    }

    #[test]
    fn vendor_codes_are_left_to_the_call_site() {
        let e = ProviderError::Api {
            product: "vpc".into(),
            action: "CreateVpc".into(),
            raw_code: Some("TaskConflict".into()),
            raw_message: "conflict".into(),
            request_id: None,
        };
        assert!(!is_transport_retryable(&e));
        assert!(!is_transport_retryable(&ProviderError::InvalidCredentials {
            product: "ecs".into(),
            raw_message: None,
        }));
    }

    #[test]
    fn retry_after_is_clamped() {
        let e = ProviderError::RateLimited {
            product: "ecs".into(),
            raw_code: None,
            retry_after: Some(120),
            raw_message: None,
        };
        assert_eq!(retry_delay(&e, 0), Duration::from_secs(30));
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        assert_eq!(backoff_delay(0), Duration::from_millis(100));
        assert_eq!(backoff_delay(3), Duration::from_millis(800));
        assert_eq!(backoff_delay(7), Duration::from_millis(10_000));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn decode_rpc_error_envelope() {
        let err = decode(
            404,
            r#"{"RequestId":"req-9","Code":"InvalidVpcID.NotFound","Message":"gone"}"#,
        )
        .unwrap_err();
        assert!(
            matches!(
                &err,
                ProviderError::Api { action, request_id: Some(rid), .. }
                    if action == "DescribeVpcs" && rid == "req-9"
            ),
            "{err:?}"
        );
        assert_eq!(err.code(), Some("InvalidVpcID.NotFound"));
    }

    #[test]
    fn decode_error_without_envelope_keeps_status() {
        let err = decode(500, "upstream exploded").unwrap_err();
        assert!(err.to_string().contains("HTTP 500"), "{err}");
        assert_eq!(err.code(), None);
    }

    #[test]
    fn decode_roa_error_on_success_status() {
        let err = decode(200, r#"{"ErrorCode":"NoSuchProject","ErrorMessage":"missing"}"#).unwrap_err();
        assert_eq!(err.code(), Some("NoSuchProject"));
    }

    #[test]
    fn decode_empty_body_is_empty_object() {
        assert_eq!(decode(200, "  ").unwrap(), Value::Object(Map::new()));
    }

    #[test]
    fn decode_malformed_json_is_parse_error() {
        let err = decode(200, "not json").unwrap_err();
        assert!(
            matches!(&err, ProviderError::ParseError { product, .. } if product == "vpc"),
            "{err:?}"
        );
    }

    #[test]
    fn decode_plain_body() {
        let value = decode(200, r#"{"VpcId":"vpc-1","RequestId":"r"}"#).unwrap();
        assert_eq!(value["VpcId"], "vpc-1");
    }
}
