use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::errors::error::AppError;
use crate::infrastructure::provider::{EthereumProvider, ProviderTrait, RetryAdapter};
use crate::log_info;
use crate::services::gas::gas_engine::GasEngine;
use crate::services::gas::gas_monitor::GasMonitor;
use crate::utils::format::format_gwei;

/// 应用程序启动与管理结构体（定价引擎 + 采样监控，无HTTP API）
pub struct Application {
    pub engine: Arc<GasEngine>,
    pub monitor: Arc<GasMonitor>,
}
pub type Result<T> = std::result::Result<T, AppError>;
impl Application {
    /// 构建应用实例（初始化 Provider 栈并装配引擎，不启动服务）
    pub async fn build(config: Config) -> Result<Self> {
        // 1. 先初始化 Provider 池（支持多个 api_key）
        let eth_provider = Arc::new(EthereumProvider::new(&config.ethereum));

        // 2. 包裹重试适配器（estimate_gas 不经过重试）
        let provider = Arc::new(RetryAdapter::new(
            eth_provider,
            config.ethereum.max_retries,
            Duration::from_secs(config.ethereum.base_delay_secs),
        )) as Arc<dyn ProviderTrait>;

        info!("RPC provider stack initialized");

        // 3. 实例化引擎与监控（配置在 GasEngine::new 内再次校验）
        let engine = Arc::new(GasEngine::new(config.optimizer.clone(), provider.clone())?);
        let monitor = Arc::new(GasMonitor::new(provider, config.monitor.clone()));

        Ok(Self { engine, monitor })
    }

    /// 启动核心服务：开机打一条当前建议价，随后进入采样循环
    pub async fn run(self) -> anyhow::Result<()> {
        match self.engine.get_optimal_gas_price().await {
            Ok(quote) => {
                log_info!(
                    "当前建议 gas 价格: {}{}",
                    format_gwei(quote.price),
                    if quote.is_fallback() { "（降级报价）" } else { "" }
                );
            }
            Err(e) => tracing::error!("获取建议 gas 价格失败: {:?}", e),
        }

        let monitor = self.monitor.clone();
        tokio::spawn(async move {
            monitor.run().await;
        });

        log_info!("✔️ Gas monitor started");

        // 等待 Ctrl+C 退出
        tokio::signal::ctrl_c().await?;
        log_info!("⚠️  Received shutdown signal, exiting...");

        // 退出前汇总本次采样情况
        if let Some(summary) = self.monitor.summary() {
            log_info!(
                "采样汇总: {} 个样本 | min {} | max {} | avg {}",
                summary.samples,
                format_gwei(summary.min),
                format_gwei(summary.max),
                format_gwei(summary.avg)
            );
        }
        Ok(())
    }
}
