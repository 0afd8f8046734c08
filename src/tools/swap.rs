//! 兑换工具:报价与交易数据生成
//!
//! 本层的对外契约是"人类可读进、人类可读出":调用方提交十进制金额字符串,
//! 这里换算成链上基础单位后请求上游,再把响应里的基础单位换算回来,
//! 基础单位整数永远不跨越工具边界。

use crate::api_client::ApiClient;
use crate::token_registry::TokenRegistry;
use crate::tools::market::BATCH_BASE_INFO_PATH;
use crate::tools::{json_result, map_api_error, market::parse_chain};
use crate::types::ChainId;
use crate::units;
use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

const QUOTE_PATH: &str = "/bgw-pro/swapx/pro/quote";
const SWAP_PATH: &str = "/bgw-pro/swapx/pro/swap";

/// 兑换报价请求参数
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SwapQuoteRequest {
    /// 源链标识 (eth, sol, bnb, base, arbitrum, trx, ton, suinet, optimism)
    pub from_chain: String,
    /// 源代币合约地址,原生代币传空字符串
    #[serde(default)]
    pub from_contract: String,
    /// 目标代币合约地址,原生代币传空字符串
    #[serde(default)]
    pub to_contract: String,
    /// 人类可读的兑换数量,如 "0.1" 表示 0.1 个代币
    pub amount: String,
    /// 目标链标识,缺省表示与源链相同(同链兑换)
    #[serde(default)]
    pub to_chain: String,
    /// 发起钱包地址,可选,提供后报价更精确
    #[serde(default)]
    pub from_address: String,
}

/// 兑换报价响应,金额均为人类可读的十进制字符串
#[derive(Debug, Serialize, Deserialize)]
pub struct SwapQuoteResponse {
    pub from_chain: String,
    pub to_chain: String,
    pub from_contract: String,
    pub to_contract: String,
    /// 实际报价使用的输入数量(超出代币精度的小数位已被截断)
    pub from_amount: String,
    /// 预计可得数量
    pub to_amount: String,
    /// 报价来源的市场/聚合器,生成交易数据时需要回传
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    /// 上游返回的完整报价明细(toAmount 已归一化为人类可读)
    pub detail: Value,
}

/// 生成交易数据请求参数
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SwapCalldataRequest {
    /// 源链标识
    pub from_chain: String,
    /// 源代币合约地址,原生代币传空字符串
    #[serde(default)]
    pub from_contract: String,
    /// 目标代币合约地址,原生代币传空字符串
    #[serde(default)]
    pub to_contract: String,
    /// 人类可读的兑换数量
    pub amount: String,
    /// 发起钱包地址
    pub from_address: String,
    /// 接收钱包地址
    pub to_address: String,
    /// 报价结果里的市场/聚合器标识
    pub market: String,
    /// 目标链标识,缺省表示与源链相同
    #[serde(default)]
    pub to_chain: String,
    /// 滑点容差百分比,可选
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage: Option<f64>,
}

/// 交易数据响应
#[derive(Debug, Serialize, Deserialize)]
pub struct SwapCalldataResponse {
    pub from_chain: String,
    pub to_chain: String,
    /// 实际提交的输入数量(人类可读)
    pub from_amount: String,
    /// 待钱包签名的未签名交易数据,原样透传
    pub transaction: Value,
}

/// 本地可判定的路由检查:同链兑换总是可路由,跨链仅在 EVM 链之间受支持
fn route_exists(from: ChainId, to: ChainId) -> bool {
    from == to || (from.is_evm() && to.is_evm())
}

/// 获取兑换报价
pub async fn swap_quote(
    client: &Arc<ApiClient>,
    registry: &Arc<TokenRegistry>,
    request: SwapQuoteRequest,
) -> Result<CallToolResult, McpError> {
    let response = quote(client, registry, request).await?;
    json_result(&response)
}

/// 生成未签名的兑换交易数据
pub async fn swap_calldata(
    client: &Arc<ApiClient>,
    registry: &Arc<TokenRegistry>,
    request: SwapCalldataRequest,
) -> Result<CallToolResult, McpError> {
    let response = calldata(client, registry, request).await?;
    json_result(&response)
}

pub(crate) async fn quote(
    client: &Arc<ApiClient>,
    registry: &Arc<TokenRegistry>,
    request: SwapQuoteRequest,
) -> Result<SwapQuoteResponse, McpError> {
    // 本地校验全部放在网络调用之前:链、路由、金额,任一失败都不浪费往返
    let (from_chain, to_chain) = parse_route(&request.from_chain, &request.to_chain)?;
    validate_amount(&request.amount)?;

    info!(
        from_chain = %from_chain,
        to_chain = %to_chain,
        amount = %request.amount,
        "请求兑换报价"
    );

    let from_decimals =
        resolve_decimals(client, registry, from_chain, &request.from_contract).await?;
    let base_amount = units::to_base_units(&request.amount, from_decimals)
        .map_err(invalid_amount)?;

    let mut body = json!({
        "fromChain": from_chain.as_str(),
        "fromContract": request.from_contract,
        "toChain": to_chain.as_str(),
        "toContract": request.to_contract,
        "fromAmount": base_amount,
        "estimateGas": true,
    });
    if !request.from_address.is_empty() {
        body["fromAddress"] = Value::String(request.from_address.clone());
    }

    let mut detail = client
        .call(QUOTE_PATH, Some(&body), true)
        .await
        .map_err(map_api_error)?;

    let to_decimals = resolve_decimals(client, registry, to_chain, &request.to_contract).await?;
    let to_amount = extract_to_amount(&detail)?;
    let to_amount_human = units::to_human(&to_amount, to_decimals).map_err(|e| {
        McpError::internal_error(format!("UpstreamError: 上游返回的数量无法解析: {e}"), None)
    })?;

    // 明细里的金额字段同样归一化,避免基础单位泄漏给调用方
    let human_amount = units::to_human(&base_amount, from_decimals).map_err(invalid_amount)?;
    if let Some(obj) = detail.as_object_mut() {
        obj.insert("toAmount".to_string(), Value::String(to_amount_human.clone()));
        obj.insert("fromAmount".to_string(), Value::String(human_amount.clone()));
    }

    let market = detail
        .get("market")
        .and_then(Value::as_str)
        .map(String::from);

    debug!(to_amount = %to_amount_human, "报价完成");

    Ok(SwapQuoteResponse {
        from_chain: from_chain.as_str().to_string(),
        to_chain: to_chain.as_str().to_string(),
        from_contract: request.from_contract,
        to_contract: request.to_contract,
        from_amount: human_amount,
        to_amount: to_amount_human,
        market,
        detail,
    })
}

pub(crate) async fn calldata(
    client: &Arc<ApiClient>,
    registry: &Arc<TokenRegistry>,
    request: SwapCalldataRequest,
) -> Result<SwapCalldataResponse, McpError> {
    let (from_chain, to_chain) = parse_route(&request.from_chain, &request.to_chain)?;
    validate_amount(&request.amount)?;

    if request.from_address.is_empty() || request.to_address.is_empty() {
        return Err(McpError::invalid_params(
            "from_address 和 to_address 不能为空".to_string(),
            None,
        ));
    }
    if request.market.is_empty() {
        return Err(McpError::invalid_params(
            "market 不能为空,请先通过 swap_quote 获取报价".to_string(),
            None,
        ));
    }

    info!(
        from_chain = %from_chain,
        to_chain = %to_chain,
        amount = %request.amount,
        market = %request.market,
        "生成兑换交易数据"
    );

    let from_decimals =
        resolve_decimals(client, registry, from_chain, &request.from_contract).await?;
    let base_amount = units::to_base_units(&request.amount, from_decimals)
        .map_err(invalid_amount)?;

    let mut body = json!({
        "fromChain": from_chain.as_str(),
        "fromContract": request.from_contract,
        "toChain": to_chain.as_str(),
        "toContract": request.to_contract,
        "fromAmount": base_amount,
        "fromAddress": request.from_address,
        "toAddress": request.to_address,
        "market": request.market,
    });
    if let Some(slippage) = request.slippage {
        body["slippage"] = json!(slippage);
    }

    // 生成交易数据不是幂等操作,单次尝试,失败直接上报
    let transaction = client
        .call(SWAP_PATH, Some(&body), false)
        .await
        .map_err(map_api_error)?;

    let human_amount = units::to_human(&base_amount, from_decimals).map_err(invalid_amount)?;

    Ok(SwapCalldataResponse {
        from_chain: from_chain.as_str().to_string(),
        to_chain: to_chain.as_str().to_string(),
        from_amount: human_amount,
        transaction,
    })
}

/// 解析源链与目标链并做路由检查
fn parse_route(from_chain: &str, to_chain: &str) -> Result<(ChainId, ChainId), McpError> {
    let from = parse_chain(from_chain)?;
    let to = if to_chain.trim().is_empty() {
        from
    } else {
        parse_chain(to_chain)?
    };

    if !route_exists(from, to) {
        return Err(McpError::invalid_params(
            format!("NoRouteError: 不存在从 {from} 到 {to} 的兑换路由(跨链兑换仅支持 EVM 链之间)"),
            None,
        ));
    }

    Ok((from, to))
}

/// 前置金额校验,在任何网络调用之前拒绝非法输入
fn validate_amount(amount: &str) -> Result<(), McpError> {
    units::validate_human_amount(amount).map_err(invalid_amount)
}

fn invalid_amount(e: units::UnitError) -> McpError {
    McpError::invalid_params(format!("InvalidAmountError: {e}"), None)
}

/// 解析代币精度:注册表未命中时向上游查询元数据并缓存
async fn resolve_decimals(
    client: &Arc<ApiClient>,
    registry: &Arc<TokenRegistry>,
    chain: ChainId,
    contract: &str,
) -> Result<u8, McpError> {
    if let Some(decimals) = registry.decimals_for(chain, contract) {
        return Ok(decimals);
    }

    debug!(chain = %chain, contract, "注册表未命中,向上游查询代币精度");

    let body = json!({"list": [{"chain": chain.as_str(), "contract": contract}]});
    let data = client
        .call(BATCH_BASE_INFO_PATH, Some(&body), true)
        .await
        .map_err(map_api_error)?;

    let entry = data.get("list").and_then(|l| l.get(0));
    let decimals = entry
        .and_then(|e| e.get("decimals").or_else(|| e.get("decimal")))
        .and_then(Value::as_u64);

    match decimals {
        Some(d) if d <= u8::MAX as u64 => {
            registry.register(chain, contract, d as u8);
            Ok(d as u8)
        }
        _ => Err(McpError::invalid_params(
            format!("UnknownTokenError: 无法确定代币精度: {contract} ({chain})"),
            None,
        )),
    }
}

/// 从报价明细里取出基础单位的预计可得数量
fn extract_to_amount(detail: &Value) -> Result<String, McpError> {
    let value = detail
        .get("toAmount")
        .or_else(|| detail.get("toTokenAmount"));

    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(McpError::internal_error(
            "UpstreamError: 报价响应缺少 toAmount 字段".to_string(),
            None,
        )),
    }
}
