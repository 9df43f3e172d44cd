//! 时间戳格式化
//!
//! 部分接口（如 DataHub）以 Unix 时间戳返回时间，写入状态前统一转换为
//! `YYYY-MM-DD HH:MM:SS`（UTC）。

use chrono::{DateTime, Utc};
use serde_json::Value;

const STATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 解析 Unix 时间戳（自动判断秒/毫秒）
fn parse_unix_timestamp(ts: i64) -> Option<DateTime<Utc>> {
    // 大于 10^11 视为毫秒
    if ts > 100_000_000_000 {
        DateTime::from_timestamp_millis(ts)
    } else {
        DateTime::from_timestamp(ts, 0)
    }
}

/// Formats a timestamp value (number, numeric string or RFC3339 string).
///
/// Returns `None` for anything that is not a recognisable time.
pub fn format_timestamp(value: &Value) -> Option<String> {
    let dt = match value {
        Value::Number(n) => parse_unix_timestamp(n.as_i64()?)?,
        Value::String(s) => match s.parse::<i64>() {
            Ok(ts) => parse_unix_timestamp(ts)?,
            Err(_) => DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc),
        },
        _ => return None,
    };
    Some(dt.format(STATE_TIME_FORMAT).to_string())
}
