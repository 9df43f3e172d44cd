//! Describe helpers shared by resources and data sources
//!
//! Every helper returns [`ProviderError::NotFound`] when the vendor object does
//! not exist, whichever way the vendor reports it (an error code, an empty
//! list, or a returned object with a different id).

mod alidns;
mod datahub;
mod ecs;
mod resourcemanager;
mod vpc;

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::client::ProductClient;
use crate::error::{ProviderError, Result};
use crate::retry::{retry, retry_on};
use crate::utils::json_path;

pub use alidns::AlidnsService;
pub use datahub::{DatahubService, project_path};
pub use ecs::{EcsService, diff_tags, tags_to_map};
pub use resourcemanager::ResourceManagerService;
pub use vpc::{AclDirection, VpcService, parse_acl_entries_id};

/// Page size for paginated list calls.
pub(crate) const PAGE_SIZE: usize = 50;

/// Upper bound for retrying throttled describe calls.
pub(crate) const DESCRIBE_TIMEOUT: Duration = Duration::from_secs(300);

/// Builds a [`ProviderError::NotFound`] for `resource` / `id`.
pub(crate) fn not_found(resource: &str, id: &str) -> ProviderError {
    ProviderError::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
        raw_code: None,
        raw_message: None,
    }
}

/// Turns a vendor error whose code is in `codes` into [`ProviderError::NotFound`].
pub(crate) fn not_found_on(err: ProviderError, codes: &[&str], resource: &str, id: &str) -> ProviderError {
    let Some(code) = err.code().filter(|c| codes.contains(c)) else {
        return err;
    };
    let raw_message = match err.root() {
        ProviderError::Api { raw_message, .. } => Some(raw_message.clone()),
        _ => None,
    };
    ProviderError::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
        raw_code: Some(code.to_string()),
        raw_message,
    }
}

/// RPC call retried on throttling and busy backends.
pub(crate) async fn call(api: ProductClient<'_>, action: &str, params: Value) -> Result<Value> {
    retry(DESCRIBE_TIMEOUT, || {
        let params = params.clone();
        async move { api.rpc(action, params).await.map_err(|e| retry_on(e, &[])) }
    })
    .await
}

/// Collects `items_path` from every page returned by `fetch(page_number)`.
///
/// Stops on a short page or once `TotalCount` items have been read.
pub(crate) async fn paginate<F, Fut>(items_path: &str, mut fetch: F) -> Result<Vec<Value>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let response = fetch(page).await?;
        let batch = json_path::get_array(&response, items_path);
        items.extend_from_slice(batch);

        let total = json_path::get_i64(&response, "TotalCount")
            .and_then(|t| usize::try_from(t).ok());
        if batch.len() < PAGE_SIZE || total.is_some_and(|t| items.len() >= t) {
            break;
        }
        page += 1;
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn not_found_on_listed_code() {
        let err = ProviderError::Api {
            product: "vpc".into(),
            action: "DescribeNetworkAclAttributes".into(),
            raw_code: Some("InvalidNetworkAcl.NotFound".into()),
            raw_message: "gone".into(),
            request_id: None,
        };
        let mapped = not_found_on(err.clone(), &["InvalidNetworkAcl.NotFound"], "NetworkAcl", "nacl-1");
        assert!(mapped.is_not_found());
        assert_eq!(mapped.code(), Some("InvalidNetworkAcl.NotFound"));
        assert_eq!(mapped.to_string(), "NetworkAcl 'nacl-1' not found: gone");

        let untouched = not_found_on(err, &["Other"], "NetworkAcl", "nacl-1");
        assert!(!untouched.is_not_found());
    }

    #[tokio::test]
    async fn paginate_follows_total_count() {
        let pages = Mutex::new(Vec::new());
        let result = paginate("Items.Item", |page| {
            pages.lock().unwrap().push(page);
            let count = if page < 3 { PAGE_SIZE } else { 7 };
            let items: Vec<Value> = (0..count).map(|i| json!({ "Id": i })).collect();
            async move {
                Ok(json!({
                    "TotalCount": 2 * PAGE_SIZE + 7,
                    "Items": { "Item": items }
                }))
            }
        })
        .await
        .unwrap();
        assert_eq!(result.len(), 2 * PAGE_SIZE + 7);
        assert_eq!(*pages.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn paginate_stops_at_total_on_full_page() {
        let calls = Mutex::new(0);
        let result = paginate("Items.Item", |_| {
            *calls.lock().unwrap() += 1;
            let items: Vec<Value> = (0..PAGE_SIZE).map(|i| json!(i)).collect();
            async move { Ok(json!({ "TotalCount": PAGE_SIZE, "Items": { "Item": items } })) }
        })
        .await
        .unwrap();
        assert_eq!(result.len(), PAGE_SIZE);
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
