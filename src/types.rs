use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 不支持的链标识错误
#[derive(Debug, Clone, thiserror::Error)]
#[error("不支持的链标识: {0}")]
pub struct UnknownChainError(pub String);

/// 支持的区块链网络
///
/// 每条链对应上游 API 的一个链编号,以及原生代币的小数位数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    Eth,
    Sol,
    Bnb,
    Base,
    Arbitrum,
    Trx,
    Ton,
    Suinet,
    Optimism,
}

impl ChainId {
    /// 全部受支持的链
    pub const ALL: [ChainId; 9] = [
        ChainId::Eth,
        ChainId::Sol,
        ChainId::Bnb,
        ChainId::Base,
        ChainId::Arbitrum,
        ChainId::Trx,
        ChainId::Ton,
        ChainId::Suinet,
        ChainId::Optimism,
    ];

    /// 链的标准标识符(与上游 API 的 chain 参数一致)
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::Eth => "eth",
            ChainId::Sol => "sol",
            ChainId::Bnb => "bnb",
            ChainId::Base => "base",
            ChainId::Arbitrum => "arbitrum",
            ChainId::Trx => "trx",
            ChainId::Ton => "ton",
            ChainId::Suinet => "suinet",
            ChainId::Optimism => "optimism",
        }
    }

    /// 上游的数字链编号
    pub fn chain_index(&self) -> &'static str {
        match self {
            ChainId::Eth => "1",
            ChainId::Sol => "100278",
            ChainId::Bnb => "56",
            ChainId::Base => "8453",
            ChainId::Arbitrum => "42161",
            ChainId::Trx => "6",
            ChainId::Ton => "100280",
            ChainId::Suinet => "100281",
            ChainId::Optimism => "10",
        }
    }

    /// 原生代币的小数位数(wei/lamport 等最小单位对应的精度)
    pub fn native_decimals(&self) -> u8 {
        match self {
            ChainId::Eth
            | ChainId::Bnb
            | ChainId::Base
            | ChainId::Arbitrum
            | ChainId::Optimism => 18,
            ChainId::Sol | ChainId::Ton | ChainId::Suinet => 9,
            ChainId::Trx => 6,
        }
    }

    /// 是否为 EVM 链(跨链路由仅在 EVM 链之间可用)
    pub fn is_evm(&self) -> bool {
        matches!(
            self,
            ChainId::Eth
                | ChainId::Bnb
                | ChainId::Base
                | ChainId::Arbitrum
                | ChainId::Optimism
        )
    }
}

impl FromStr for ChainId {
    type Err = UnknownChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eth" => Ok(ChainId::Eth),
            "sol" => Ok(ChainId::Sol),
            "bnb" => Ok(ChainId::Bnb),
            "base" => Ok(ChainId::Base),
            "arbitrum" => Ok(ChainId::Arbitrum),
            "trx" => Ok(ChainId::Trx),
            "ton" => Ok(ChainId::Ton),
            "suinet" => Ok(ChainId::Suinet),
            "optimism" => Ok(ChainId::Optimism),
            other => Err(UnknownChainError(other.to_string())),
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 上游响应的统一信封格式
///
/// 成功响应形如 `{"code": "200", "msg": "success", "data": {...}}`;
/// 某些端点省略信封字段,此时视为成功并返回完整载荷。
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    /// 业务码的字符串形式(数字码或字符串码都归一化处理)
    pub fn code_str(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// 业务层面是否成功
    pub fn is_success(&self) -> bool {
        match self.code_str() {
            None => true,
            Some(code) => matches!(code.as_str(), "0" | "200" | "00000"),
        }
    }
}
