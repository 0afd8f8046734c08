use rmcp::{
    ErrorData as McpError, ServiceExt,
    handler::server::{ServerHandler, router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
};
use std::sync::Arc;

mod api_client;
mod config;
mod logging;
mod signer;
mod token_registry;
mod tools;
mod types;
mod units;

use api_client::ApiClient;
use config::Config;
use token_registry::TokenRegistry;
use tools::market::{
    BatchTokenInfoRequest, KlineRequest, LiquidityRequest, RankingsRequest, SecurityAuditRequest,
    TokenInfoRequest, TokenPriceRequest, TxInfoRequest,
};
use tools::swap::{SwapCalldataRequest, SwapQuoteRequest};
use types::ChainId;

/// Bitget Wallet MCP Server
///
/// 把 Bitget Wallet ToB openapi 暴露为 MCP 工具:链上行情查询、
/// 代币安全审计、兑换报价与交易数据生成。
#[derive(Clone)]
pub struct BgwWalletServer {
    tool_router: ToolRouter<Self>,
    client: Arc<ApiClient>,
    registry: Arc<TokenRegistry>,
}

#[tool_router]
impl BgwWalletServer {
    /// 创建新的服务器实例
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Arc::new(ApiClient::new(&config.api, &config.http)?);
        let registry = Arc::new(TokenRegistry::new());

        Ok(Self {
            tool_router: Self::tool_router(),
            client,
            registry,
        })
    }

    // ==================== 行情与代币数据 ====================

    #[tool(
        description = "查询代币的详细信息,包括价格、市值、供应量、持有人与社交链接。chain 为链标识 (eth, sol, bnb, base, arbitrum, trx, ton, suinet, optimism),原生代币 (ETH/SOL/BNB 等) 的 contract 传空字符串。"
    )]
    async fn token_info(
        &self,
        Parameters(request): Parameters<TokenInfoRequest>,
    ) -> Result<CallToolResult, McpError> {
        tools::market::token_info(&self.client, request).await
    }

    #[tool(description = "查询代币的当前价格。原生代币的 contract 传空字符串。")]
    async fn token_price(
        &self,
        Parameters(request): Parameters<TokenPriceRequest>,
    ) -> Result<CallToolResult, McpError> {
        tools::market::token_price(&self.client, request).await
    }

    #[tool(description = "一次调用批量查询多个代币的信息。")]
    async fn batch_token_info(
        &self,
        Parameters(request): Parameters<BatchTokenInfoRequest>,
    ) -> Result<CallToolResult, McpError> {
        tools::market::batch_token_info(&self.client, request).await
    }

    #[tool(
        description = "查询代币的 K 线(蜡烛图)数据。period 可选 1s/1m/5m/15m/30m/1h/4h/1d/1w,size 最大 1440。"
    )]
    async fn kline(
        &self,
        Parameters(request): Parameters<KlineRequest>,
    ) -> Result<CallToolResult, McpError> {
        tools::market::kline(&self.client, request).await
    }

    #[tool(description = "查询代币的交易统计(5m/1h/4h/24h 交易量与买卖人数)。")]
    async fn tx_info(
        &self,
        Parameters(request): Parameters<TxInfoRequest>,
    ) -> Result<CallToolResult, McpError> {
        tools::market::tx_info(&self.client, request).await
    }

    #[tool(description = "查询代币涨跌幅榜单,name 可选 topGainers 或 topLosers。")]
    async fn rankings(
        &self,
        Parameters(request): Parameters<RankingsRequest>,
    ) -> Result<CallToolResult, McpError> {
        tools::market::rankings(&self.client, request).await
    }

    #[tool(description = "查询代币的流动性池信息。")]
    async fn liquidity(
        &self,
        Parameters(request): Parameters<LiquidityRequest>,
    ) -> Result<CallToolResult, McpError> {
        tools::market::liquidity(&self.client, request).await
    }

    #[tool(description = "对代币合约做安全审计:蜜罐检测、权限检查、黑名单。")]
    async fn security_audit(
        &self,
        Parameters(request): Parameters<SecurityAuditRequest>,
    ) -> Result<CallToolResult, McpError> {
        tools::market::security_audit(&self.client, request).await
    }

    // ==================== 兑换 ====================

    #[tool(
        description = "获取兑换报价,返回最优路由与预计可得数量。amount 为人类可读数量,如 \"1\" 表示 1 个 SOL 而非 lamport;同链兑换 to_chain 留空。"
    )]
    async fn swap_quote(
        &self,
        Parameters(request): Parameters<SwapQuoteRequest>,
    ) -> Result<CallToolResult, McpError> {
        tools::swap::swap_quote(&self.client, &self.registry, request).await
    }

    #[tool(
        description = "生成兑换的未签名交易数据(需钱包签名后才能执行)。market 取自 swap_quote 的结果。"
    )]
    async fn swap_calldata(
        &self,
        Parameters(request): Parameters<SwapCalldataRequest>,
    ) -> Result<CallToolResult, McpError> {
        tools::swap::swap_calldata(&self.client, &self.registry, request).await
    }

    // ==================== 辅助工具 ====================

    /// 获取服务器信息
    #[tool(description = "获取 MCP 服务器的基本信息:版本、支持的链与工具列表。")]
    async fn server_info(&self) -> Result<CallToolResult, McpError> {
        let chains: Vec<String> = ChainId::ALL
            .iter()
            .map(|c| format!("{} (chainIndex {})", c.as_str(), c.chain_index()))
            .collect();

        let info = serde_json::json!({
            "name": "Bitget Wallet MCP Server",
            "version": env!("CARGO_PKG_VERSION"),
            "chains": chains,
            "tools": [
                "token_info", "token_price", "batch_token_info", "kline", "tx_info",
                "rankings", "liquidity", "security_audit", "swap_quote", "swap_calldata",
            ],
            "amount_convention": "所有金额均为人类可读的十进制字符串,基础单位不跨越工具边界",
        });

        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&info)
                .map_err(|e| McpError::internal_error(e.to_string(), None))?,
        )]))
    }
}

#[tool_handler]
impl ServerHandler for BgwWalletServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "通过 Bitget Wallet ToB API 做链上数据查询、代币安全审计与兑换报价。\
                 支持 Ethereum、Solana、BNB Chain、Base、Arbitrum、Tron、TON、Sui、Optimism。"
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    config.validate()?;

    logging::init_logging(&config.server.log_level, config.server.log_json_format)?;

    tracing::info!(
        name = %config.server.name,
        version = %config.server.version,
        base_url = %config.api.base_url,
        api_key = %config.masked_api_key(),
        "🚀 启动 Bitget Wallet MCP Server..."
    );

    let server = BgwWalletServer::new(&config)?;

    let transport = stdio();
    let service = server.serve(transport).await?;
    tracing::info!("✅ MCP Server 已就绪,等待客户端连接...");

    let quit_reason = service.waiting().await?;
    tracing::info!("👋 MCP Server 关闭,原因: {:?}", quit_reason);

    Ok(())
}
