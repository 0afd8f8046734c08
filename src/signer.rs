//! 上游 API 的 HMAC-SHA256 请求签名

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// 签名错误
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("HMAC 密钥无效: {0}")]
    InvalidKey(String),

    #[error("签名载荷序列化失败: {0}")]
    Canonicalize(#[from] serde_json::Error),
}

/// 请求签名器
///
/// `sign` 是纯函数:不读时钟、不产生随机数,相同输入永远得到相同签名,
/// 因此可以在无网络环境下做确定性测试。时间戳与 nonce 由调用方提供。
#[derive(Clone)]
pub struct Signer {
    api_key: String,
    secret: String,
}

impl Signer {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// 构造规范化签名载荷
    ///
    /// serde_json 的 Map 默认基于 BTreeMap,键序稳定;紧凑序列化无空白,
    /// 保证逻辑相同的请求总是哈希出相同的字节序列。
    fn canonical_payload(
        &self,
        path: &str,
        body: &str,
        timestamp: &str,
        nonce: &str,
    ) -> Result<String, serde_json::Error> {
        let content = serde_json::json!({
            "apiPath": path,
            "body": body,
            "x-api-key": self.api_key,
            "x-api-nonce": nonce,
            "x-api-timestamp": timestamp,
        });
        serde_json::to_string(&content)
    }

    /// 对请求内容签名,返回 base64 编码的 HMAC-SHA256 摘要
    pub fn sign(
        &self,
        path: &str,
        body: &str,
        timestamp: &str,
        nonce: &str,
    ) -> Result<String, SignError> {
        let payload = self.canonical_payload(path, body, timestamp, nonce)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| SignError::InvalidKey(e.to_string()))?;
        mac.update(payload.as_bytes());

        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }
}

// 手写 Debug,避免密钥出现在日志里
impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("api_key", &self.api_key)
            .field("secret", &"***")
            .finish()
    }
}
