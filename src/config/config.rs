use crate::errors::error::AppError;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub ethereum: EthereumConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// RPC 节点连接配置
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct EthereumConfig {
    pub rpc_url: String,
    pub api_keys: String,
    pub max_retries: usize,
    pub base_delay_secs: u64,
}

/// Gas 定价引擎配置（构造后不可变）
/// 所有可识别项在此显式枚举，未知键在反序列化阶段即拒绝
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct OptimizerConfig {
    /// 最终建议价的上限（wei）
    pub max_gas_price_wei: u64,
    /// gas 估算缓冲（整数百分比，110 = ×1.10，必须 ≥ 100）
    pub gas_buffer_percent: u64,
    /// 每组并发估算的最大交易数（必须 ≥ 1）
    pub batch_size: usize,
    /// 估算历史环形缓冲容量（必须 ≥ 1）
    pub history_capacity: usize,
    /// EIP-1559 默认小费（wei）
    pub default_priority_fee_wei: u64,
    /// 注入给所有 RPC 调用的截止时间（秒）
    pub rpc_timeout_secs: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_gas_price_wei: 20_000_000_000, // 20 gwei
            gas_buffer_percent: 110,
            batch_size: 10,
            history_capacity: 256,
            default_priority_fee_wei: 1_000_000_000, // 1 gwei
            rpc_timeout_secs: 30,
        }
    }
}

impl OptimizerConfig {
    /// 启动期校验：不合法配置直接拒绝，而不是之后悄悄算错价
    pub fn validate(&self) -> Result<(), AppError> {
        if self.gas_buffer_percent < 100 {
            return Err(AppError::InvalidConfig(format!(
                "gas_buffer_percent = {} 不合法: 缓冲系数 < 1.0 会导致交易资金不足",
                self.gas_buffer_percent
            )));
        }
        if self.batch_size < 1 {
            return Err(AppError::InvalidConfig(
                "batch_size 必须 ≥ 1".to_string(),
            ));
        }
        if self.history_capacity < 1 {
            return Err(AppError::InvalidConfig(
                "history_capacity 必须 ≥ 1".to_string(),
            ));
        }
        if self.rpc_timeout_secs == 0 {
            return Err(AppError::InvalidConfig(
                "rpc_timeout_secs 必须 ≥ 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Gas 价格采样监控配置
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    pub sample_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            sample_capacity: 240, // 15s 间隔下约一小时的样本
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config: Config = config::Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            .build()?
            .try_deserialize()?;

        config.optimizer.validate()?;
        Ok(config)
    }
}
