use crate::config::EthereumConfig;
use crate::errors::error::AppError;
use crate::log_info;
use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{BlockNumber, U256};
use ethers_providers::{Http, Middleware, Provider};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

/// 最新区块的利用率数据（拥堵度计算的输入）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockUtilization {
    pub gas_used: U256,
    pub gas_limit: U256,
}

#[async_trait]
pub trait ProviderTrait: Send + Sync {
    /// 链上当前建议的 gas 价格（wei）
    async fn get_gas_price(&self) -> Result<U256, AppError>;

    /// 模拟执行并估算 gas 用量；交易会 revert 时返回错误
    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, AppError>;

    /// 最新区块的 gasUsed / gasLimit
    async fn get_latest_block(&self) -> Result<BlockUtilization, AppError>;
}

pub struct EthereumProvider {
    providers: Vec<Arc<Provider<Http>>>,
    index: AtomicUsize,
}

impl EthereumProvider {
    pub fn new(config: &EthereumConfig) -> Self {
        let providers = config
            .api_keys
            .split(',')
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(|key| {
                let mut url = Url::parse(&config.rpc_url).expect("Invalid base RPC URL");
                if !config.rpc_url.ends_with('/') {
                    url.set_path(&format!("/{}", key));
                } else {
                    url =
                        Url::parse(&format!("{}{}", config.rpc_url, key)).expect("Invalid RPC URL");
                }
                Arc::new(Provider::<Http>::try_from(url.as_str()).expect("Invalid RPC URL"))
            })
            .collect::<Vec<_>>();

        log_info!("成功初始化 {} 个RPC Provider", providers.len());
        assert!(!providers.is_empty(), "No valid api keys provided");

        Self {
            providers,
            index: AtomicUsize::new(0),
        }
    }

    pub fn get_provider(&self) -> Arc<Provider<Http>> {
        let i = self.index.fetch_add(1, Ordering::Relaxed);
        self.providers[i % self.providers.len()].clone()
    }
}

#[async_trait]
impl ProviderTrait for EthereumProvider {
    async fn get_gas_price(&self) -> Result<U256, AppError> {
        self.get_provider()
            .get_gas_price()
            .await
            .map_err(AppError::from)
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, AppError> {
        self.get_provider()
            .estimate_gas(tx, None)
            .await
            .map_err(|e| AppError::ProviderError(format!("estimate_gas failed: {}", e)))
    }

    async fn get_latest_block(&self) -> Result<BlockUtilization, AppError> {
        let block = self
            .get_provider()
            .get_block(BlockNumber::Latest)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| {
                AppError::ProviderError("最新区块不存在（节点尚未同步？）".to_string())
            })?;

        Ok(BlockUtilization {
            gas_used: block.gas_used,
            gas_limit: block.gas_limit,
        })
    }
}
