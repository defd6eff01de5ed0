//! base-gas-rs：面向 Ethereum 兼容 L2 的 gas 定价与批量估算引擎
//!
//! 核心能力：按网络拥堵度分档调价、带缓冲的 gas 估算、
//! 分组并发的批量交易定价，以及有界的估算历史统计。
//! 引擎只定价不提交，签名与广播由调用方负责。

pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod services;
pub mod startup;
pub mod utils;

pub use config::{Config, EthereumConfig, MonitorConfig, OptimizerConfig};
pub use errors::error::AppError;
pub use infrastructure::provider::{BlockUtilization, EthereumProvider, ProviderTrait, RetryAdapter};
pub use services::gas::gas_engine::GasEngine;
pub use services::gas::gas_monitor::{GasMonitor, PriceSample, PriceSummary};
pub use services::gas::gas_strategy::GasPriority;
pub use services::gas::history::{GasEstimateRecord, GasStats};
pub use services::tx::types::{AnnotatedTx, DraftTx, EstimateOptions, PriceQuote, PriceSource};
