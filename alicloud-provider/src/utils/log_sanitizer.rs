//! Log sanitization utilities
//!
//! Keeps secrets out of debug/error logs: instance passwords travel in the RPC
//! query string, STS tokens in headers, and some responses are large.

/// Maximum number of characters to include in truncated log output.
const TRUNCATE_LIMIT: usize = 256;

/// Query parameters whose values are masked before logging.
const SENSITIVE_PARAMS: &[&str] = &["Password", "SecurityToken", "KeyPairName", "UserData"];

const MASK: &str = "******";

/// MSRV-compatible replacement for `str::floor_char_boundary` (stable since 1.91.0).
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        s.len()
    } else {
        let mut i = index;
        while i > 0 && !s.is_char_boundary(i) {
            i -= 1;
        }
        i
    }
}

/// Truncate a string for safe logging.
///
/// Returns the original string if it's within the limit,
/// otherwise returns the first `TRUNCATE_LIMIT` characters with a suffix
/// indicating the total length.
pub fn truncate_for_log(s: &str) -> String {
    if s.len() <= TRUNCATE_LIMIT {
        s.to_string()
    } else {
        format!(
            "{}... [truncated, total {} bytes]",
            &s[..floor_char_boundary(s, TRUNCATE_LIMIT)],
            s.len()
        )
    }
}

/// Masks the values of sensitive parameters in an encoded query string.
pub fn redact_query(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if SENSITIVE_PARAMS.contains(&key) => format!("{key}={MASK}"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Masks a secret for `Debug` output, keeping only its first few characters.
pub fn redact_secret(secret: &str) -> String {
    let keep = floor_char_boundary(secret, 4.min(secret.len() / 4));
    format!("{}{MASK}", &secret[..keep])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_string_unchanged() {
        let s = "hello world";
        assert_eq!(truncate_for_log(s), s);
    }

    #[test]
    fn exactly_at_limit() {
        let s = "a".repeat(TRUNCATE_LIMIT);
        assert_eq!(truncate_for_log(&s), s);
    }

    #[test]
    fn over_limit_truncated() {
        let s = "a".repeat(TRUNCATE_LIMIT + 100);
        let result = truncate_for_log(&s);
        assert!(result.contains("... [truncated, total"));
        assert!(result.contains(&format!("{} bytes]", TRUNCATE_LIMIT + 100)));
        assert!(result.len() < s.len());
    }

    #[test]
    fn multibyte_chars_safe() {
        let s = "你".repeat(200);
        let result = truncate_for_log(&s);
        assert!(result.contains("... [truncated, total"));
    }

    #[test]
    fn query_password_masked() {
        let q = "ImageId=ubuntu&Password=Secr3t%21&RegionId=cn-hangzhou";
        assert_eq!(
            redact_query(q),
            "ImageId=ubuntu&Password=******&RegionId=cn-hangzhou"
        );
    }

    #[test]
    fn query_without_secrets_unchanged() {
        let q = "DomainName=example.com&PageSize=100";
        assert_eq!(redact_query(q), q);
    }

    #[test]
    fn secret_keeps_short_prefix() {
        assert_eq!(redact_secret("LTAI5tTestKeyId"), "LTA******");
        assert_eq!(redact_secret("ab"), "******");
    }
}
