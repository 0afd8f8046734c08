use crate::types::ChainId;
use std::collections::HashMap;
use std::sync::RwLock;

/// 代币精度注册表
///
/// 维护每条链原生代币及常用代币的小数位数,进程启动时加载一次。
/// 动态查到的代币精度通过 `register` 缓存,之后无需再次请求上游。
pub struct TokenRegistry {
    decimals: RwLock<HashMap<(ChainId, String), u8>>,
}

impl TokenRegistry {
    /// 创建新的注册表,预加载各链常用代币
    pub fn new() -> Self {
        let mut decimals = HashMap::new();

        for (chain, contract, value) in default_token_decimals() {
            decimals.insert(cache_key(chain, contract), value);
        }

        Self {
            decimals: RwLock::new(decimals),
        }
    }

    /// 查询代币精度
    ///
    /// 空合约地址表示原生代币(ETH/SOL/BNB 等),直接返回链的默认精度;
    /// 否则查静态表与缓存;都没有时返回 None,由调用方向上游查询元数据。
    pub fn decimals_for(&self, chain: ChainId, contract: &str) -> Option<u8> {
        if contract.trim().is_empty() {
            return Some(chain.native_decimals());
        }

        let decimals = self.decimals.read().unwrap();
        decimals.get(&cache_key(chain, contract)).copied()
    }

    /// 缓存动态查到的代币精度
    pub fn register(&self, chain: ChainId, contract: &str, value: u8) {
        let mut decimals = self.decimals.write().unwrap();
        decimals.insert(cache_key(chain, contract), value);
    }

    /// 已登记条目数(不含原生代币)
    #[cfg(test)]
    fn len(&self) -> usize {
        self.decimals.read().unwrap().len()
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// EVM 地址不区分大小写,统一小写做键;Solana/TON/Sui 地址区分大小写,原样保留
fn cache_key(chain: ChainId, contract: &str) -> (ChainId, String) {
    let contract = contract.trim();
    let normalized = if chain.is_evm() {
        contract.to_lowercase()
    } else {
        contract.to_string()
    };
    (chain, normalized)
}

/// 各链常用代币的静态精度表
fn default_token_decimals() -> Vec<(ChainId, &'static str, u8)> {
    vec![
        // Ethereum 主网
        (ChainId::Eth, "0xdAC17F958D2ee523a2206206994597C13D831ec7", 6), // USDT
        (ChainId::Eth, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6), // USDC
        (ChainId::Eth, "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", 18), // WETH
        (ChainId::Eth, "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599", 8), // WBTC
        (ChainId::Eth, "0x6B175474E89094C44Da98b954EedeAC495271d0F", 18), // DAI
        // BNB Chain
        (ChainId::Bnb, "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c", 18), // WBNB
        (ChainId::Bnb, "0x55d398326f99059fF775485246999027B3197955", 18), // USDT (BEP-20)
        // Base
        (ChainId::Base, "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", 6), // USDC
        // Arbitrum
        (ChainId::Arbitrum, "0xaf88d065e77c8cC2239327C5EDb3A432268e5831", 6), // USDC
        (ChainId::Arbitrum, "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9", 6), // USDT
        // Optimism
        (ChainId::Optimism, "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85", 6), // USDC
        // Solana
        (ChainId::Sol, "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", 6), // USDC
        (ChainId::Sol, "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", 6), // USDT
        // Tron
        (ChainId::Trx, "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", 6), // USDT (TRC-20)
    ]
}
