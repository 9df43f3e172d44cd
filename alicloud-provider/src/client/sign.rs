//! 阿里云 ACS3-HMAC-SHA256 签名
//! 参考: <https://www.alibabacloud.com/help/zh/sdk/product-overview/v3-request-structure-and-signature>

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::utils::log_sanitizer::redact_query;

type HmacSha256 = Hmac<Sha256>;

pub(crate) const SIGNATURE_ALGORITHM: &str = "ACS3-HMAC-SHA256";

/// 空 body 的 SHA256 hash (固定值)
pub(crate) const EMPTY_BODY_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// 签名所需的请求要素
pub(crate) struct SignRequest<'a> {
    pub method: &'a str,
    /// 规范化 URI（RPC 固定为 `/`）
    pub pathname: &'a str,
    /// 已编码、已排序的 query string
    pub query: &'a str,
    pub host: &'a str,
    pub action: &'a str,
    pub version: &'a str,
    pub timestamp: &'a str,
    pub nonce: &'a str,
    pub content_sha256: &'a str,
    /// STS 临时凭证
    pub security_token: Option<&'a str>,
}

impl SignRequest<'_> {
    /// 按字母序排列的待签名请求头
    pub fn signed_headers(&self) -> Vec<(&'static str, &str)> {
        let mut headers = vec![
            ("host", self.host),
            ("x-acs-action", self.action),
            ("x-acs-content-sha256", self.content_sha256),
            ("x-acs-date", self.timestamp),
        ];
        if let Some(token) = self.security_token {
            headers.push(("x-acs-security-token", token));
        }
        headers.push(("x-acs-signature-nonce", self.nonce));
        headers.push(("x-acs-version", self.version));
        headers
    }
}

/// HMAC-SHA256 计算
pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this never takes the error branch
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return Vec::new();
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// 请求体 SHA256（hex）
pub(crate) fn content_sha256(body: &[u8]) -> String {
    if body.is_empty() {
        EMPTY_BODY_SHA256.to_string()
    } else {
        hex::encode(Sha256::digest(body))
    }
}

/// 生成 Authorization 头
pub(crate) fn sign(access_key_id: &str, access_key_secret: &str, req: &SignRequest<'_>) -> String {
    let headers = req.signed_headers();

    // 1. 规范化请求头
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    // 2. 规范化请求
    let canonical_request = format!(
        "{}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{}",
        req.method, req.pathname, req.query, req.content_sha256
    );

    log::debug!(
        "CanonicalRequest: {} {} {}",
        req.method,
        req.pathname,
        redact_query(req.query)
    );

    // 3. 待签名字符串
    let hashed_canonical_request = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    let string_to_sign = format!("{SIGNATURE_ALGORITHM}\n{hashed_canonical_request}");

    log::debug!("StringToSign:\n{string_to_sign}");

    // 4. 计算签名
    let signature = hex::encode(hmac_sha256(
        access_key_secret.as_bytes(),
        string_to_sign.as_bytes(),
    ));

    format!(
        "{SIGNATURE_ALGORITHM} Credential={access_key_id},SignedHeaders={signed_headers},Signature={signature}"
    )
}
