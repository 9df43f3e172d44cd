//! 真实环境测试（需要凭证，默认忽略）
//!
//! ```bash
//! ALICLOUD_ACCESS_KEY=... ALICLOUD_SECRET_KEY=... ALICLOUD_REGION=cn-hangzhou \
//!     cargo test --test live_test -- --ignored
//! ```

mod common;

use alicloud_provider::{AlicloudProvider, ProviderConfig};
use common::attrs;
use serde_json::json;

fn live_provider() -> Option<AlicloudProvider> {
    AlicloudProvider::from_config(&ProviderConfig::from_env()).ok()
}

#[tokio::test]
#[ignore = "requires Alibaba Cloud credentials"]
async fn vpc_lifecycle() {
    skip_if_no_credentials!("ALICLOUD_ACCESS_KEY", "ALICLOUD_SECRET_KEY", "ALICLOUD_REGION");
    let provider = require_some!(live_provider());

    let name = format!("it-{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let state = require_ok!(
        provider
            .create(
                "alicloud_vpc",
                attrs(json!({ "cidr_block": "172.16.0.0/16", "vpc_name": name })),
            )
            .await
    );
    assert_eq!(state.attributes["status"], "Available");

    let mut config = attrs(json!({ "cidr_block": "172.16.0.0/16", "vpc_name": name }));
    config.insert("description".into(), json!("integration test"));
    let updated = provider.update("alicloud_vpc", state.clone(), config).await;

    // 无论更新是否成功都要清理
    let deleted = provider.delete("alicloud_vpc", state.clone()).await;
    let updated = require_ok!(updated);
    assert_eq!(updated.attributes["description"], "integration test");
    require_ok!(deleted);

    let gone = require_ok!(provider.read("alicloud_vpc", state).await);
    assert!(gone.is_none());
}

#[tokio::test]
#[ignore = "requires Alibaba Cloud credentials"]
async fn list_instances() {
    skip_if_no_credentials!("ALICLOUD_ACCESS_KEY", "ALICLOUD_SECRET_KEY", "ALICLOUD_REGION");
    let provider = require_some!(live_provider());

    let state = require_ok!(
        provider
            .read_data_source("alicloud_instances", attrs(json!({ "status": "Running" })))
            .await
    );
    assert_eq!(state.id.len(), 64);
    println!("running instances: {}", state.attributes["ids"]);
}
