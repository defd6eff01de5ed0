use super::ethereum_provider::{BlockUtilization, EthereumProvider, ProviderTrait};
use crate::errors::error::AppError;
use crate::log_warn;
use async_trait::async_trait;
use ethers::providers::ProviderError;
use ethers_providers::Middleware;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{BlockNumber, U256};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// 包裹瞬时失败重试的 Provider 适配器
/// 只重试读类调用（价格/区块）；estimate_gas 不经过重试，见下
pub struct RetryAdapter {
    provider: Arc<EthereumProvider>,
    max_retries: usize,
    base_delay_secs: Duration,
}

impl RetryAdapter {
    pub fn new(
        provider: Arc<EthereumProvider>,
        max_retries: usize,
        base_delay_secs: Duration,
    ) -> Self {
        Self {
            provider,
            max_retries,
            base_delay_secs,
        }
    }

    async fn retry_call<T, Fut, F>(&self, mut f: F) -> Result<T, AppError>
    where
        F: FnMut(Arc<ethers_providers::Provider<ethers_providers::Http>>) -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, ProviderError>> + Send,
    {
        let mut last_error: Option<ProviderError> = None;
        for attempt in 0..self.max_retries {
            // 延迟逻辑：从第二次尝试 (attempt = 1) 开始执行
            if attempt > 0 {
                // 计算指数倍数，最高限制在 2^10 = 1024
                let exponent = (attempt - 1).min(10);
                let base_ms = self.base_delay_secs.as_millis() as u64;

                // 基础延迟：base * 2^n
                let delay_ms = base_ms * (1u64 << exponent);

                // 0~10% 的随机抖动 (Jitter)，防止多个重试任务同时“齐射” RPC 节点
                let jitter = rand::thread_rng().gen_range(0..=(delay_ms / 10 + 1));

                let final_delay = Duration::from_millis(delay_ms + jitter);

                log_warn!(
                    "RPC 尝试失败，正在进行第 {} 次重试，等待 {:?}...",
                    attempt + 1,
                    final_delay
                );

                sleep(final_delay).await;
            }
            let p = self.provider.get_provider();
            match f(p).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    log_warn!("RPC 调用失败 (第 {} 次): {:?}", attempt + 1, last_error);
                }
            }
        }
        Err(AppError::ProviderError(format!(
            "重试 {} 次失败，最后错误: {:?}",
            self.max_retries, last_error
        )))
    }
}

#[async_trait]
impl ProviderTrait for RetryAdapter {
    async fn get_gas_price(&self) -> Result<U256, AppError> {
        self.retry_call(|p| async move { p.get_gas_price().await })
            .await
    }

    /// 估算失败意味着交易本身无效（如会 revert）：不重试，原样上抛
    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, AppError> {
        self.provider.estimate_gas(tx).await
    }

    async fn get_latest_block(&self) -> Result<BlockUtilization, AppError> {
        let block = self
            .retry_call(|p| async move { p.get_block(BlockNumber::Latest).await })
            .await?
            .ok_or_else(|| {
                AppError::ProviderError("最新区块不存在（节点尚未同步？）".to_string())
            })?;

        Ok(BlockUtilization {
            gas_used: block.gas_used,
            gas_limit: block.gas_limit,
        })
    }
}
