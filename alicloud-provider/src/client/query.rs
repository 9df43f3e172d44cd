//! RPC 参数编码
//!
//! 嵌套参数按阿里云 RPC 约定展平：对象用 `.` 连接，数组下标从 1 开始，
//! 如 `Tag.1.Key=env`、`SystemDisk.Category=cloud_essd`。

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{ProviderError, Result};

/// 将 `serde_json::Value` 展平为 key-value 对 (处理嵌套对象)
pub fn flatten_value(prefix: &str, value: &Value, result: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let new_key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten_value(&new_key, v, result);
            }
        }
        Value::Array(arr) => {
            for (i, v) in arr.iter().enumerate() {
                flatten_value(&format!("{prefix}.{}", i + 1), v, result);
            }
        }
        Value::String(s) => {
            result.insert(prefix.to_string(), s.clone());
        }
        Value::Number(n) => {
            result.insert(prefix.to_string(), n.to_string());
        }
        Value::Bool(b) => {
            result.insert(prefix.to_string(), b.to_string());
        }
        Value::Null => {}
    }
}

/// 将参数序列化为排序后的 query string（RFC3986 编码）
pub fn serialize_to_query_string<T: Serialize>(params: &T) -> Result<String> {
    let value = serde_json::to_value(params).map_err(|e| ProviderError::SerializationError {
        product: "rpc".to_string(),
        detail: e.to_string(),
    })?;

    let mut flat_map = BTreeMap::new();
    flatten_value("", &value, &mut flat_map);

    Ok(flat_map
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&"))
}
