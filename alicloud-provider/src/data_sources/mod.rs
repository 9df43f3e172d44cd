//! Read-only lookups
//!
//! A data source lists vendor objects, filters them and publishes the matches
//! as computed attributes. Its id is a digest of the matched ids, so the same
//! result set always yields the same id.

mod alidns_domains;
mod instances;

use std::sync::Arc;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{ProviderError, Result};
use crate::schema::ResourceData;
use crate::traits::DataSource;

pub use alidns_domains::AlidnsDomains;
pub use instances::Instances;

/// Every data source this crate implements.
pub fn all() -> Vec<Arc<dyn DataSource>> {
    vec![Arc::new(Instances), Arc::new(AlidnsDomains)]
}

/// Stable id for a result set: hex SHA-256 of the ids joined by `,`.
pub fn hash_ids(ids: &[String]) -> String {
    hex::encode(Sha256::digest(ids.join(",").as_bytes()))
}

/// The compiled `name_regex` argument, if set.
pub(crate) fn name_regex(d: &ResourceData) -> Result<Option<Regex>> {
    d.get_str("name_regex")
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| ProviderError::InvalidParameter {
                param: "name_regex".to_string(),
                detail: e.to_string(),
            })
        })
        .transpose()
}
