use std::env;
use std::time::Duration;

// 公开的演示凭据,仅供测试。可能随时间失效,失效时请更新为最新密钥。
pub const DEMO_API_KEY: &str = "4843D8C3F1E20772C0E634EDACC5C5F9A0E2DC92";
pub const DEMO_API_SECRET: &str = "F2ABFDC684BDC6775FD6286B8D06A3AAD30FD587";
pub const DEMO_PARTNER_CODE: &str = "bgw_swap_public";
pub const DEFAULT_BASE_URL: &str = "https://bopenapi.bgwapi.io";

/// 服务器配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 服务器名称
    pub name: String,
    /// 服务器版本
    pub version: String,
    /// 日志级别
    pub log_level: String,
    /// 是否启用 JSON 格式日志
    pub log_json_format: bool,
}

/// 上游 API 配置
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// API 基础地址
    pub base_url: String,
    /// API Key(即 appId)
    pub api_key: String,
    /// API Secret(HMAC 签名密钥)
    pub api_secret: String,
    /// 合作方代码,swap 端点必需
    pub partner_code: String,
}

/// HTTP 与重试配置
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// 单次请求超时时间(秒),需小于宿主协议自身的超时
    pub timeout_secs: u64,
    /// 瞬时错误的最大重试次数
    pub max_retries: u32,
    /// 首次重试延迟(毫秒)
    pub retry_delay_ms: u64,
    /// 重试延迟上限(毫秒)
    pub max_retry_delay_ms: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 指数退避:delay = base * 2^attempt,封顶于 max_retry_delay_ms
    pub fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay = self.retry_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_retry_delay_ms))
    }

    /// 第 attempt 次失败后是否还允许重试
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// 完整配置
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub http: HttpConfig,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 三项凭据(API Key、Secret、合作方代码)都有内置演示默认值,
    /// 环境变量全部缺失时仍能正常启动。
    pub fn from_env() -> anyhow::Result<Self> {
        // 尝试加载 .env 文件(如果存在)
        dotenv::dotenv().ok();

        let server = ServerConfig {
            name: env::var("SERVER_NAME").unwrap_or_else(|_| "bgw-wallet-server".to_string()),
            version: env::var("SERVER_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json_format: env::var("LOG_JSON_FORMAT")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        };

        let api = ApiConfig {
            base_url: env::var("BGW_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: env::var("BGW_API_KEY")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEMO_API_KEY.to_string()),
            api_secret: env::var("BGW_API_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEMO_API_SECRET.to_string()),
            partner_code: env::var("BGW_PARTNER_CODE")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEMO_PARTNER_CODE.to_string()),
        };

        let http = HttpConfig {
            timeout_secs: env::var("HTTP_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            max_retries: env::var("HTTP_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            retry_delay_ms: env::var("HTTP_RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
            max_retry_delay_ms: env::var("HTTP_MAX_RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8_000),
        };

        Ok(Config { server, api, http })
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            anyhow::bail!("BGW_BASE_URL 必须以 http:// 或 https:// 开头");
        }

        if self.api.api_key.is_empty() || self.api.api_secret.is_empty() {
            anyhow::bail!("API Key 和 Secret 不能为空");
        }

        if self.http.timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT 必须大于 0");
        }

        // 重试不设上界会把瞬时故障放大成无限退避循环
        if self.http.max_retries > 10 {
            anyhow::bail!("HTTP_MAX_RETRIES 不能超过 10");
        }

        if self.http.retry_delay_ms > self.http.max_retry_delay_ms {
            anyhow::bail!("HTTP_RETRY_DELAY_MS 不能超过 HTTP_MAX_RETRY_DELAY_MS");
        }

        Ok(())
    }

    /// 掩码后的 API Key,用于日志输出
    pub fn masked_api_key(&self) -> String {
        mask_credential(&self.api.api_key)
    }
}

/// 只保留前 6 个字符,其余用 * 替代
fn mask_credential(value: &str) -> String {
    let total = value.chars().count();
    if total <= 6 {
        "*".repeat(total)
    } else {
        let prefix: String = value.chars().take(6).collect();
        format!("{prefix}{}", "*".repeat(total - 6))
    }
}
