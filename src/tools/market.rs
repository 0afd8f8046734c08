//! 行情与代币数据工具
//!
//! 这些工具是对上游行情端点的轻量封装:本地只做链标识与参数校验,
//! 其余交给 [`ApiClient`] 统一签名、重试、分类错误。

use crate::api_client::ApiClient;
use crate::tools::{json_result, map_api_error};
use crate::types::ChainId;
use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

pub(crate) const BATCH_BASE_INFO_PATH: &str = "/bgw-pro/market/v3/coin/batchGetBaseInfo";
const KLINE_PATH: &str = "/bgw-pro/market/v3/coin/getKline";
const TX_INFO_PATH: &str = "/bgw-pro/market/v3/coin/getTxInfo";
const TOP_RANK_PATH: &str = "/bgw-pro/market/v3/topRank/detail";
const POOL_LIST_PATH: &str = "/bgw-pro/market/v3/poolList";
const SECURITY_AUDITS_PATH: &str = "/bgw-pro/market/v3/coin/security/audits";

/// K 线支持的时间周期
const KLINE_PERIODS: [&str; 9] = ["1s", "1m", "5m", "15m", "30m", "1h", "4h", "1d", "1w"];
/// 单次 K 线查询的最大条数
const KLINE_MAX_SIZE: u32 = 1440;

/// 解析链标识,失败时返回结构化的参数错误
pub(crate) fn parse_chain(chain: &str) -> Result<ChainId, McpError> {
    chain
        .parse::<ChainId>()
        .map_err(|e| McpError::invalid_params(format!("UnknownChainError: {e}"), None))
}

/// 查询代币信息请求参数
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TokenInfoRequest {
    /// 链标识 (eth, sol, bnb, base, arbitrum, trx, ton, suinet, optimism)
    pub chain: String,
    /// 代币合约地址,原生代币 (ETH/SOL/BNB 等) 传空字符串
    #[serde(default)]
    pub contract: String,
}

/// 查询单个代币的详细信息(价格、市值、供应量、持有人、社交链接等)
pub async fn token_info(
    client: &Arc<ApiClient>,
    request: TokenInfoRequest,
) -> Result<CallToolResult, McpError> {
    let chain = parse_chain(&request.chain)?;
    let entry = fetch_base_info(client, chain, &request.contract).await?;
    json_result(&entry)
}

/// 查询代币价格请求参数
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TokenPriceRequest {
    /// 链标识 (eth, sol, bnb, base, arbitrum, trx, ton, suinet, optimism)
    pub chain: String,
    /// 代币合约地址,原生代币传空字符串
    #[serde(default)]
    pub contract: String,
}

/// 代币价格响应
#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TokenPriceResponse {
    /// 代币符号
    pub symbol: Option<String>,
    /// 代币名称
    pub name: Option<String>,
    /// 当前价格
    pub price: Option<String>,
    /// 链标识
    pub chain: String,
}

/// 查询代币当前价格
pub async fn token_price(
    client: &Arc<ApiClient>,
    request: TokenPriceRequest,
) -> Result<CallToolResult, McpError> {
    let chain = parse_chain(&request.chain)?;
    let entry = fetch_base_info(client, chain, &request.contract).await?;

    let field = |key: &str| {
        entry.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    };
    json_result(&TokenPriceResponse {
        symbol: field("symbol"),
        name: field("name"),
        price: field("price"),
        chain: chain.as_str().to_string(),
    })
}

/// 批量查询的单个代币
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BatchTokenEntry {
    /// 链标识
    pub chain: String,
    /// 代币合约地址,原生代币传空字符串
    #[serde(default)]
    pub contract: String,
}

/// 批量查询代币信息请求参数
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BatchTokenInfoRequest {
    /// 代币列表
    pub tokens: Vec<BatchTokenEntry>,
}

/// 一次调用查询多个代币的信息
pub async fn batch_token_info(
    client: &Arc<ApiClient>,
    request: BatchTokenInfoRequest,
) -> Result<CallToolResult, McpError> {
    if request.tokens.is_empty() {
        return Err(McpError::invalid_params(
            "代币列表不能为空".to_string(),
            None,
        ));
    }

    // 先整体校验,避免部分合法的查询打到上游
    let mut list = Vec::with_capacity(request.tokens.len());
    for token in &request.tokens {
        let chain = parse_chain(&token.chain)?;
        list.push(json!({"chain": chain.as_str(), "contract": token.contract}));
    }

    let data = client
        .call(BATCH_BASE_INFO_PATH, Some(&json!({"list": list})), true)
        .await
        .map_err(map_api_error)?;
    json_result(&data)
}

/// K 线查询请求参数
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct KlineRequest {
    /// 链标识
    pub chain: String,
    /// 代币合约地址
    pub contract: String,
    /// 时间周期 (1s, 1m, 5m, 15m, 30m, 1h, 4h, 1d, 1w),默认 1h
    #[serde(default = "default_kline_period")]
    pub period: String,
    /// 返回的 K 线条数,最大 1440,默认 24
    #[serde(default = "default_kline_size")]
    pub size: u32,
}

fn default_kline_period() -> String {
    "1h".to_string()
}

fn default_kline_size() -> u32 {
    24
}

/// 查询代币的 K 线(蜡烛图)数据
pub async fn kline(
    client: &Arc<ApiClient>,
    request: KlineRequest,
) -> Result<CallToolResult, McpError> {
    let chain = parse_chain(&request.chain)?;

    if !KLINE_PERIODS.contains(&request.period.as_str()) {
        return Err(McpError::invalid_params(
            format!(
                "无效的时间周期 '{}',可选: {}",
                request.period,
                KLINE_PERIODS.join(", ")
            ),
            None,
        ));
    }

    if request.size == 0 || request.size > KLINE_MAX_SIZE {
        return Err(McpError::invalid_params(
            format!("size 必须在 1 到 {KLINE_MAX_SIZE} 之间"),
            None,
        ));
    }

    let body = json!({
        "chain": chain.as_str(),
        "contract": request.contract,
        "period": request.period,
        "size": request.size,
    });
    let data = client
        .call(KLINE_PATH, Some(&body), true)
        .await
        .map_err(map_api_error)?;
    json_result(&data)
}

/// 交易统计请求参数
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TxInfoRequest {
    /// 链标识
    pub chain: String,
    /// 代币合约地址
    pub contract: String,
}

/// 查询代币的交易统计(5m/1h/4h/24h 交易量与买卖人数)
pub async fn tx_info(
    client: &Arc<ApiClient>,
    request: TxInfoRequest,
) -> Result<CallToolResult, McpError> {
    let chain = parse_chain(&request.chain)?;
    let body = json!({"chain": chain.as_str(), "contract": request.contract});
    let data = client
        .call(TX_INFO_PATH, Some(&body), true)
        .await
        .map_err(map_api_error)?;
    json_result(&data)
}

/// 榜单请求参数
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RankingsRequest {
    /// 榜单类型,"topGainers" 或 "topLosers",默认 topGainers
    #[serde(default = "default_ranking_name")]
    pub name: String,
}

fn default_ranking_name() -> String {
    "topGainers".to_string()
}

/// 查询代币涨跌幅榜单
pub async fn rankings(
    client: &Arc<ApiClient>,
    request: RankingsRequest,
) -> Result<CallToolResult, McpError> {
    if request.name != "topGainers" && request.name != "topLosers" {
        return Err(McpError::invalid_params(
            format!(
                "无效的榜单类型 '{}',可选: topGainers, topLosers",
                request.name
            ),
            None,
        ));
    }

    let data = client
        .call(TOP_RANK_PATH, Some(&json!({"name": request.name})), true)
        .await
        .map_err(map_api_error)?;
    json_result(&data)
}

/// 流动性查询请求参数
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LiquidityRequest {
    /// 链标识
    pub chain: String,
    /// 代币合约地址
    pub contract: String,
}

/// 查询代币的流动性池信息
pub async fn liquidity(
    client: &Arc<ApiClient>,
    request: LiquidityRequest,
) -> Result<CallToolResult, McpError> {
    let chain = parse_chain(&request.chain)?;
    let body = json!({"chain": chain.as_str(), "contract": request.contract});
    let data = client
        .call(POOL_LIST_PATH, Some(&body), true)
        .await
        .map_err(map_api_error)?;
    json_result(&data)
}

/// 安全审计请求参数
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SecurityAuditRequest {
    /// 链标识
    pub chain: String,
    /// 代币合约地址
    pub contract: String,
}

/// 对代币合约做安全审计(蜜罐检测、权限检查、黑名单)
pub async fn security_audit(
    client: &Arc<ApiClient>,
    request: SecurityAuditRequest,
) -> Result<CallToolResult, McpError> {
    let chain = parse_chain(&request.chain)?;
    let body = json!({
        "list": [{"chain": chain.as_str(), "contract": request.contract}],
        "source": "bg",
    });
    let data = client
        .call(SECURITY_AUDITS_PATH, Some(&body), true)
        .await
        .map_err(map_api_error)?;
    json_result(&data)
}

/// 调用 batchGetBaseInfo 并取出第一条结果
async fn fetch_base_info(
    client: &Arc<ApiClient>,
    chain: ChainId,
    contract: &str,
) -> Result<Value, McpError> {
    let body = json!({"list": [{"chain": chain.as_str(), "contract": contract}]});
    let data = client
        .call(BATCH_BASE_INFO_PATH, Some(&body), true)
        .await
        .map_err(map_api_error)?;

    // 有列表就返回第一条,否则原样返回载荷
    match data.get("list").and_then(|l| l.get(0)) {
        Some(entry) => Ok(entry.clone()),
        None => Ok(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, HttpConfig};

    fn test_client(base_url: &str) -> Arc<ApiClient> {
        let api = ApiConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            api_secret: "test-secret".to_string(),
            partner_code: "test-partner".to_string(),
        };
        let http = HttpConfig {
            timeout_secs: 5,
            max_retries: 0,
            retry_delay_ms: 1,
            max_retry_delay_ms: 1,
        };
        Arc::new(ApiClient::new(&api, &http).unwrap())
    }

    #[test]
    fn test_token_info_request_defaults() {
        let request: TokenInfoRequest = serde_json::from_str(r#"{"chain": "eth"}"#).unwrap();
        assert_eq!(request.chain, "eth");
        // 原生代币的合约地址默认为空字符串
        assert_eq!(request.contract, "");
    }

    #[test]
    fn test_kline_request_defaults() {
        let request: KlineRequest =
            serde_json::from_str(r#"{"chain": "sol", "contract": "abc"}"#).unwrap();
        assert_eq!(request.period, "1h");
        assert_eq!(request.size, 24);
    }

    #[tokio::test]
    async fn test_unknown_chain_rejected_without_network() {
        // 端口 1 上没有服务,链校验失败时也不应该发起连接
        let client = test_client("http://127.0.0.1:1");
        let result = token_info(
            &client,
            TokenInfoRequest {
                chain: "polygon".to_string(),
                contract: String::new(),
            },
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.message.contains("UnknownChainError"));
    }

    #[tokio::test]
    async fn test_kline_rejects_invalid_period() {
        let client = test_client("http://127.0.0.1:1");
        let result = kline(
            &client,
            KlineRequest {
                chain: "eth".to_string(),
                contract: "0xabc".to_string(),
                period: "2h".to_string(),
                size: 24,
            },
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_kline_rejects_oversized_request() {
        let client = test_client("http://127.0.0.1:1");
        let result = kline(
            &client,
            KlineRequest {
                chain: "eth".to_string(),
                contract: "0xabc".to_string(),
                period: "1h".to_string(),
                size: 1441,
            },
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rankings_rejects_unknown_name() {
        let client = test_client("http://127.0.0.1:1");
        let result = rankings(
            &client,
            RankingsRequest {
                name: "topVolume".to_string(),
            },
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_batch_rejects_empty_list() {
        let client = test_client("http://127.0.0.1:1");
        let result = batch_token_info(&client, BatchTokenInfoRequest { tokens: vec![] }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_token_price_projection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", BATCH_BASE_INFO_PATH)
            .with_status(200)
            .with_body(
                r#"{"code":"200","data":{"list":[{"symbol":"ETH","name":"Ethereum","price":"3000.5","marketCap":"1"}]}}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = token_price(
            &client,
            TokenPriceRequest {
                chain: "eth".to_string(),
                contract: String::new(),
            },
        )
        .await
        .unwrap();
        assert_eq!(result.is_error, Some(false));
    }

    #[tokio::test]
    async fn test_fetch_base_info_takes_first_entry() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", BATCH_BASE_INFO_PATH)
            .with_status(200)
            .with_body(r#"{"code":"200","data":{"list":[{"symbol":"USDT"},{"symbol":"USDC"}]}}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let entry = fetch_base_info(&client, ChainId::Eth, "0xabc").await.unwrap();
        assert_eq!(entry.get("symbol").and_then(Value::as_str), Some("USDT"));
    }
}
