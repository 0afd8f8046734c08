//! 上游 openapi 的认证 HTTP 客户端
//!
//! 负责构造、签名、发送请求并分类响应。瞬时错误按指数退避做有界重试,
//! 确定性的上游拒绝(认证失败、业务错误)立即上报,绝不重试。

use crate::config::{ApiConfig, HttpConfig};
use crate::signer::{SignError, Signer};
use crate::types::ApiResponse;
use reqwest::{Client, header};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// API 客户端错误分类
#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("签名失败: {0}")]
    Sign(#[from] SignError),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("请求超时")]
    Timeout,

    #[error("认证失败 (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("触发上游限流 (HTTP 429)")]
    RateLimited,

    #[error("上游服务不可用 (HTTP {status})")]
    Server { status: u16 },

    #[error("HTTP 错误 (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    #[error("上游业务错误 [{code}]: {message}")]
    Upstream { code: String, message: String },

    #[error("响应解析失败: {0}")]
    InvalidResponse(String),

    #[error("创建 HTTP 客户端失败: {0}")]
    Build(String),
}

impl ApiClientError {
    /// 是否为可重试的瞬时错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiClientError::Network(_)
                | ApiClientError::Timeout
                | ApiClientError::RateLimited
                | ApiClientError::Server { .. }
        )
    }

    /// 错误类别名,用于对调用方的结构化上报
    pub fn kind(&self) -> &'static str {
        match self {
            ApiClientError::Sign(_) => "AuthError",
            ApiClientError::Network(_) | ApiClientError::Timeout | ApiClientError::Build(_) => {
                "NetworkError"
            }
            ApiClientError::Auth { .. } => "AuthError",
            ApiClientError::RateLimited => "RateLimitError",
            ApiClientError::Server { .. } => "ServerError",
            ApiClientError::Http { .. }
            | ApiClientError::Upstream { .. }
            | ApiClientError::InvalidResponse(_) => "UpstreamError",
        }
    }
}

/// 认证 API 客户端
///
/// 除网络调用外无副作用;跨调用共享的状态只有 nonce 计数器,
/// 原子自增,宿主并发派发工具调用时也不会重复。
pub struct ApiClient {
    http: Client,
    base_url: String,
    partner_code: String,
    signer: Signer,
    retry: HttpConfig,
    nonce: AtomicU64,
}

impl ApiClient {
    pub fn new(api: &ApiConfig, http_cfg: &HttpConfig) -> Result<Self, ApiClientError> {
        let http = Client::builder()
            .timeout(http_cfg.timeout())
            .build()
            .map_err(|e| ApiClientError::Build(e.to_string()))?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            partner_code: api.partner_code.clone(),
            signer: Signer::new(api.api_key.clone(), api.api_secret.clone()),
            retry: http_cfg.clone(),
            nonce: AtomicU64::new(unix_millis()),
        })
    }

    /// 发起一次已签名的上游调用
    ///
    /// `idempotent` 为 false 时(如生成 swap 交易数据)只尝试一次,
    /// 避免对非幂等操作做重放。成功时返回信封里的 `data` 字段。
    pub async fn call(
        &self,
        path: &str,
        body: Option<&Value>,
        idempotent: bool,
    ) -> Result<Value, ApiClientError> {
        // serde_json 的 Map 基于 BTreeMap,序列化结果键序稳定且紧凑,
        // 与签名载荷里的 body 字符串逐字节一致
        let body_str = match body {
            Some(value) => serde_json::to_string(value)
                .map_err(|e| ApiClientError::InvalidResponse(e.to_string()))?,
            None => String::new(),
        };

        let mut attempt = 0u32;
        loop {
            match self.execute(path, &body_str).await {
                Ok(data) => return Ok(data),
                Err(e) if idempotent && e.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.calculate_retry_delay(attempt);
                    warn!(
                        path,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "请求失败,准备重试"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 单次请求:签名、发送、分类
    async fn execute(&self, path: &str, body_str: &str) -> Result<Value, ApiClientError> {
        // 每次尝试都用新的时间戳与 nonce;签名材料用后即弃,不缓存不落日志
        let timestamp = unix_millis().to_string();
        let nonce = self.next_nonce().to_string();
        let signature = self.signer.sign(path, body_str, &timestamp, &nonce)?;

        let url = format!("{}{}", self.base_url, path);
        debug!(path, "发送已签名请求");

        let mut request = self
            .http
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", self.signer.api_key())
            .header("x-api-timestamp", &timestamp)
            .header("x-api-nonce", &nonce)
            .header("x-api-signature", &signature);

        // swap 端点需要带合作方代码
        if path.contains("/swapx/") {
            request = request.header("Partner-Code", &self.partner_code);
        }

        if !body_str.is_empty() {
            request = request.body(body_str.to_string());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiClientError::Timeout
            } else {
                ApiClientError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {}
            401 | 403 => {
                // 同一签名重发必然再失败,立即上报
                let message = response.text().await.unwrap_or_default();
                return Err(ApiClientError::Auth {
                    status: status.as_u16(),
                    message: clip_message(&message),
                });
            }
            429 => return Err(ApiClientError::RateLimited),
            500..=599 => {
                return Err(ApiClientError::Server {
                    status: status.as_u16(),
                });
            }
            _ => {
                let message = response.text().await.unwrap_or_default();
                return Err(ApiClientError::Http {
                    status: status.as_u16(),
                    message: clip_message(&message),
                });
            }
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ApiClientError::InvalidResponse(e.to_string()))?;

        let envelope: ApiResponse = serde_json::from_value(payload.clone())
            .map_err(|e| ApiClientError::InvalidResponse(e.to_string()))?;

        if !envelope.is_success() {
            return Err(ApiClientError::Upstream {
                code: envelope.code_str().unwrap_or_default(),
                message: envelope.msg.unwrap_or_default(),
            });
        }

        Ok(envelope.data.unwrap_or(payload))
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::Relaxed)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// 错误文本最多保留 500 个字符
fn clip_message(message: &str) -> String {
    message.chars().take(500).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_client(base_url: &str) -> ApiClient {
        let api = ApiConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            api_secret: "test-secret".to_string(),
            partner_code: "test-partner".to_string(),
        };
        // 毫秒级退避,测试不用等真实延迟
        let http = HttpConfig {
            timeout_secs: 5,
            max_retries: 2,
            retry_delay_ms: 1,
            max_retry_delay_ms: 4,
        };
        ApiClient::new(&api, &http).unwrap()
    }

    #[tokio::test]
    async fn test_success_unwraps_data() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bgw-pro/market/v3/coin/getTxInfo")
            .match_header("x-api-key", "test-key")
            .match_header("x-api-signature", mockito::Matcher::Regex(".+".to_string()))
            .with_status(200)
            .with_body(r#"{"code":"200","msg":"success","data":{"volume":"123"}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let data = client
            .call(
                "/bgw-pro/market/v3/coin/getTxInfo",
                Some(&json!({"chain": "eth", "contract": "0xabc"})),
                true,
            )
            .await
            .unwrap();

        assert_eq!(data, json!({"volume": "123"}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_retried_until_cap() {
        let mut server = mockito::Server::new_async().await;
        // 首次请求 + 2 次重试 = 3 次
        let mock = server
            .mock("POST", "/bgw-pro/market/v3/poolList")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client
            .call("/bgw-pro/market/v3/poolList", Some(&json!({"chain": "eth"})), true)
            .await;

        assert!(matches!(result, Err(ApiClientError::Server { status: 500 })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_auth_error_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bgw-pro/market/v3/poolList")
            .with_status(401)
            .with_body("invalid signature")
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client
            .call("/bgw-pro/market/v3/poolList", Some(&json!({"chain": "eth"})), true)
            .await;

        match result {
            Err(ApiClientError::Auth { status: 401, message }) => {
                assert_eq!(message, "invalid signature");
            }
            other => panic!("期望 AuthError,实际 {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bgw-pro/market/v3/topRank/detail")
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client
            .call(
                "/bgw-pro/market/v3/topRank/detail",
                Some(&json!({"name": "topGainers"})),
                true,
            )
            .await;

        assert!(matches!(result, Err(ApiClientError::RateLimited)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_business_error_not_retried() {
        let mut server = mockito::Server::new_async().await;
        // HTTP 200 但业务码表示失败:调用方可修复的错误,重试没有意义
        let mock = server
            .mock("POST", "/bgw-pro/swapx/pro/quote")
            .with_status(200)
            .with_body(r#"{"code":"40001","msg":"invalid token address"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client
            .call("/bgw-pro/swapx/pro/quote", Some(&json!({"fromChain": "eth"})), true)
            .await;

        match result {
            Err(ApiClientError::Upstream { code, message }) => {
                assert_eq!(code, "40001");
                assert_eq!(message, "invalid token address");
            }
            other => panic!("期望 UpstreamError,实际 {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_idempotent_call_single_attempt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bgw-pro/swapx/pro/swap")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client
            .call(
                "/bgw-pro/swapx/pro/swap",
                Some(&json!({"fromChain": "eth"})),
                false,
            )
            .await;

        assert!(matches!(result, Err(ApiClientError::Server { status: 500 })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_partner_code_attached_for_swap_paths() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bgw-pro/swapx/pro/quote")
            .match_header("Partner-Code", "test-partner")
            .with_status(200)
            .with_body(r#"{"code":"200","data":{}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url());
        client
            .call("/bgw-pro/swapx/pro/quote", Some(&json!({"fromChain": "eth"})), true)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_market_paths_have_no_partner_code() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bgw-pro/market/v3/poolList")
            .match_header("Partner-Code", mockito::Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"code":"200","data":{}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(&server.url());
        client
            .call("/bgw-pro/market/v3/poolList", Some(&json!({"chain": "eth"})), true)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_response_without_data_returns_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/bgw-pro/market/v3/poolList")
            .with_status(200)
            .with_body(r#"{"code":"200","msg":"ok"}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let data = client
            .call("/bgw-pro/market/v3/poolList", Some(&json!({"chain": "eth"})), true)
            .await
            .unwrap();

        // 没有 data 字段时返回完整载荷
        assert_eq!(data.get("msg").and_then(Value::as_str), Some("ok"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/bgw-pro/market/v3/poolList")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client
            .call("/bgw-pro/market/v3/poolList", Some(&json!({"chain": "eth"})), true)
            .await;

        assert!(matches!(result, Err(ApiClientError::InvalidResponse(_))));
    }

    #[test]
    fn test_nonce_strictly_increasing() {
        let client = test_client("http://127.0.0.1:1");
        let a = client.next_nonce();
        let b = client.next_nonce();
        let c = client.next_nonce();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ApiClientError::Timeout.kind(), "NetworkError");
        assert_eq!(ApiClientError::RateLimited.kind(), "RateLimitError");
        assert_eq!(ApiClientError::Server { status: 502 }.kind(), "ServerError");
        assert_eq!(
            ApiClientError::Auth {
                status: 401,
                message: String::new()
            }
            .kind(),
            "AuthError"
        );
        assert_eq!(
            ApiClientError::Upstream {
                code: "1".to_string(),
                message: String::new()
            }
            .kind(),
            "UpstreamError"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiClientError::Timeout.is_retryable());
        assert!(ApiClientError::Network("dns".to_string()).is_retryable());
        assert!(ApiClientError::RateLimited.is_retryable());
        assert!(ApiClientError::Server { status: 503 }.is_retryable());

        assert!(
            !ApiClientError::Auth {
                status: 401,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ApiClientError::Upstream {
                code: "40001".to_string(),
                message: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_clip_message() {
        let long = "x".repeat(600);
        assert_eq!(clip_message(&long).len(), 500);
        assert_eq!(clip_message("short"), "short");
    }
}
