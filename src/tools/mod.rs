/// Bitget Wallet MCP 工具模块
///
/// - `market`: 链上行情与代币数据查询(代币信息、K 线、交易统计、榜单、流动性、安全审计)
/// - `swap`: 兑换报价与交易数据生成,负责人类可读金额与基础单位之间的归一化
pub mod market;
pub mod swap;

use crate::api_client::ApiClientError;
use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

/// 把客户端错误映射为结构化的 MCP 错误(类别 + 描述)
///
/// 调用方据此区分"换个参数重试"、"稍后再试"与"服务不可用"。
pub(crate) fn map_api_error(e: ApiClientError) -> McpError {
    McpError::internal_error(format!("{}: {}", e.kind(), e), None)
}

/// 把可序列化的结果包装成 MCP 文本内容
pub(crate) fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
