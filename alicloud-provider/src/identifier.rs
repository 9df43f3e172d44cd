//! 复合资源 ID
//!
//! Many vendor objects have no single identifier of their own (a firewall rule,
//! the entries of one ACL direction, a role inside a service). Their resource id
//! joins the parts needed to find them again, e.g. `acl-xxx:ingress`.

use crate::error::{ProviderError, Result};

/// Default separator between id parts.
pub const COLON_SEPARATED: &str = ":";
/// Separator used by resources whose parts may themselves contain `:`.
pub const SLASH_SEPARATED: &str = "/";

/// Joins `parts` with `:`.
pub fn build_id<S: AsRef<str>>(parts: &[S]) -> String {
    build_id_with(parts, COLON_SEPARATED)
}

/// Joins `parts` with `sep`.
pub fn build_id_with<S: AsRef<str>>(parts: &[S], sep: &str) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(sep)
}

/// Splits a `:`-joined id into exactly `n` parts.
pub fn parse_id(id: &str, n: usize) -> Result<Vec<String>> {
    parse_id_with(id, n, COLON_SEPARATED)
}

/// Splits a `sep`-joined id into exactly `n` parts.
pub fn parse_id_with(id: &str, n: usize, sep: &str) -> Result<Vec<String>> {
    let parts: Vec<String> = id.split(sep).map(str::to_string).collect();
    if parts.len() != n {
        return Err(ProviderError::InvalidResourceId {
            id: id.to_string(),
            detail: format!(
                "expected {n} parts separated by '{sep}', got {}",
                parts.len()
            ),
        });
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_two_parts() {
        assert_eq!(build_id(&["acl-1", "ingress"]), "acl-1:ingress");
    }

    #[test]
    fn build_with_slash() {
        assert_eq!(build_id_with(&["a", "b", "c"], "/"), "a/b/c");
    }

    #[test]
    fn parse_exact_parts() {
        let parts = parse_id("AliyunServiceRoleForECS:acs:role", 3);
        assert_eq!(
            parts.ok(),
            Some(vec![
                "AliyunServiceRoleForECS".to_string(),
                "acs".to_string(),
                "role".to_string()
            ])
        );
    }

    #[test]
    fn parse_wrong_count_is_invalid_id() {
        let err = parse_id("sg-1:ingress:tcp", 8);
        assert!(matches!(
            err,
            Err(ProviderError::InvalidResourceId { ref id, .. }) if id == "sg-1:ingress:tcp"
        ));
    }

    #[test]
    fn parse_keeps_empty_parts() {
        let parts = parse_id("sg-1::tcp", 3);
        assert_eq!(parts.ok().map(|p| p[1].clone()), Some(String::new()));
    }
}
