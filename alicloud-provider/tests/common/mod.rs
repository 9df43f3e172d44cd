//! 共享测试工具和辅助函数

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use alicloud_provider::{
    AlicloudProvider, ApiRequest, ApiTransport, ProviderClient, ProviderError, Result,
};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// 跳过测试的宏（当环境变量缺失时）
#[macro_export]
macro_rules! skip_if_no_credentials {
    ($($var:expr),+) => {
        $(
            if std::env::var($var).is_err() {
                eprintln!("跳过测试: 缺少环境变量 {}", $var);
                return;
            }
        )+
    };
}

/// 断言 `Option` 为 `Some`，并解包返回内部值（失败则直接让测试失败）。
#[macro_export]
macro_rules! require_some {
    ($expr:expr $(,)?) => {{
        let opt = $expr;
        assert!(opt.is_some(), "expected Some(..), got None");
        let Some(val) = opt else {
            return;
        };
        val
    }};
}

/// 断言 `Result` 为 `Ok`，并解包返回内部值（失败则直接让测试失败）。
#[macro_export]
macro_rules! require_ok {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_ok(), "expected Ok(..), got {res:?}");
        let Ok(val) = res else {
            return;
        };
        val
    }};
    ($expr:expr, $($msg:tt)+) => {{
        let res = $expr;
        assert!(
            res.is_ok(),
            "{}: {res:?}",
            format_args!($($msg)+)
        );
        let Ok(val) = res else {
            return;
        };
        val
    }};
}

/// 断言 `Result` 为 `Err`，并解包返回错误（失败则直接让测试失败）。
#[macro_export]
macro_rules! require_err {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_err(), "expected Err(..), got Ok");
        let Err(err) = res else {
            return;
        };
        err
    }};
}

/// 按 Action 预置响应的传输层替身
///
/// 每个 Action 的响应按队列依次返回，最后一条会一直重复。所有请求都会被记录，
/// 便于断言调用次数与参数。
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<Value>>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 追加一条成功响应
    pub fn ok(&self, action: &str, body: Value) -> &Self {
        self.push(action, Ok(body))
    }

    /// 追加一条带错误码的接口错误
    pub fn fail(&self, action: &str, code: &str) -> &Self {
        self.push(action, Err(api_error(action, code)))
    }

    fn push(&self, action: &str, response: Result<Value>) -> &Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(action.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Action 名称序列
    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.action).collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.calls().iter().filter(|c| c.action == action).count()
    }

    /// 最后一次 `action` 调用
    pub fn last(&self, action: &str) -> Option<ApiRequest> {
        self.calls().into_iter().rev().find(|c| c.action == action)
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn invoke(&self, request: &ApiRequest) -> Result<Value> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(queue) = scripts.get_mut(&request.action) else {
            return Err(api_error(&request.action, "MockNotScripted"));
        };
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        response.unwrap_or_else(|| Err(api_error(&request.action, "MockNotScripted")))
    }
}

pub fn api_error(action: &str, code: &str) -> ProviderError {
    ProviderError::Api {
        product: "mock".to_string(),
        action: action.to_string(),
        raw_code: Some(code.to_string()),
        raw_message: format!("{code} (scripted)"),
        request_id: Some("req-mock".to_string()),
    }
}

pub fn client(mock: &Arc<MockTransport>) -> ProviderClient {
    ProviderClient::new("cn-hangzhou", mock.clone())
}

pub fn provider(mock: &Arc<MockTransport>) -> AlicloudProvider {
    AlicloudProvider::new(client(mock))
}

/// `json!({..})` 转为属性表
pub fn attrs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
