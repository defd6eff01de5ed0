// services/gas/gas_monitor.rs

use crate::config::MonitorConfig;
use crate::errors::error::AppError;
use crate::infrastructure::provider::ProviderTrait;
use crate::utils::format::format_gwei;
use crate::{log_info, log_warn};
use chrono::{DateTime, Utc};
use ethers_core::types::U256;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub price: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSummary {
    pub samples: usize,
    pub min: U256,
    pub max: U256,
    pub avg: U256,
}

/// 周期性 gas 价格采样器（有界样本缓冲，超容量淘汰最旧样本）
pub struct GasMonitor {
    provider: Arc<dyn ProviderTrait>,
    config: MonitorConfig,
    samples: Mutex<VecDeque<PriceSample>>,
}

impl GasMonitor {
    pub fn new(provider: Arc<dyn ProviderTrait>, config: MonitorConfig) -> Self {
        let samples = Mutex::new(VecDeque::with_capacity(config.sample_capacity));
        Self {
            provider,
            config,
            samples,
        }
    }

    /// 采一次样并记入缓冲
    pub async fn sample(&self) -> Result<PriceSample, AppError> {
        let price = self.provider.get_gas_price().await?;
        let sample = PriceSample {
            timestamp: Utc::now(),
            price,
        };

        let mut samples = self.samples.lock().unwrap();
        if samples.len() == self.config.sample_capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
        Ok(sample)
    }

    /// 当前缓冲内样本的汇总；无样本时返回 None
    pub fn summary(&self) -> Option<PriceSummary> {
        let samples = self.samples.lock().unwrap();
        if samples.is_empty() {
            return None;
        }

        let mut min = U256::MAX;
        let mut max = U256::zero();
        let mut sum = U256::zero();
        for s in samples.iter() {
            min = min.min(s.price);
            max = max.max(s.price);
            sum = sum.saturating_add(s.price);
        }

        Some(PriceSummary {
            samples: samples.len(),
            min,
            max,
            avg: sum / U256::from(samples.len()),
        })
    }

    /// 采样主循环：单次失败只告警不中断，由宿主任务负责取消
    pub async fn run(&self) {
        loop {
            match self.sample().await {
                Ok(sample) => log_info!("gas 价格采样: {}", format_gwei(sample.price)),
                Err(e) => log_warn!("gas 价格采样失败: {}", e),
            }
            tokio::time::sleep(Duration::from_secs(self.config.interval_secs)).await;
        }
    }
}
