// services/gas/history.rs

use chrono::{DateTime, Utc};
use ethers_core::types::U256;
use std::collections::VecDeque;

/// 统计窗口：报告只取最近 10 条记录
const STATS_WINDOW: usize = 10;

/// 单次估算记录（创建后不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimateRecord {
    pub timestamp: DateTime<Utc>,
    pub raw_gas: U256,
    pub buffered_gas: U256,
}

/// 基于最近窗口的估算统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasStats {
    /// 历史累计估算次数（环形淘汰不回退）
    pub total_estimates: u64,
    /// 本次统计实际采样的记录数（≤ 10）
    pub window_size: usize,
    pub avg_raw_gas: U256,
    pub avg_buffered_gas: U256,
    /// 缓冲开销百分比 = (均值缓冲 − 均值原始) / 均值原始 × 100
    /// 窗口内原始均值为 0 时无定义，返回 None 而非除零
    pub buffer_overhead_percent: Option<f64>,
}

/// 有界估算历史：环形缓冲，写满后淘汰最旧记录
#[derive(Debug)]
pub struct EstimateHistory {
    records: VecDeque<GasEstimateRecord>,
    capacity: usize,
    total_recorded: u64,
}

impl EstimateHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            total_recorded: 0,
        }
    }

    pub fn record(&mut self, raw_gas: U256, buffered_gas: U256) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(GasEstimateRecord {
            timestamp: Utc::now(),
            raw_gas,
            buffered_gas,
        });
        self.total_recorded += 1;
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.total_recorded = 0;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 历史为空时返回 None（「无数据」不是错误）
    pub fn stats(&self) -> Option<GasStats> {
        if self.records.is_empty() {
            return None;
        }

        let window_size = self.records.len().min(STATS_WINDOW);
        let window = self.records.iter().rev().take(STATS_WINDOW);

        let mut sum_raw = U256::zero();
        let mut sum_buffered = U256::zero();
        for r in window {
            sum_raw = sum_raw.saturating_add(r.raw_gas);
            sum_buffered = sum_buffered.saturating_add(r.buffered_gas);
        }

        let avg_raw_gas = sum_raw / U256::from(window_size);
        let avg_buffered_gas = sum_buffered / U256::from(window_size);

        // 整数万分比运算，只在报告边界转 f64
        let buffer_overhead_percent = if avg_raw_gas.is_zero() {
            None
        } else {
            let bps = (avg_buffered_gas - avg_raw_gas).saturating_mul(U256::from(10_000u64))
                / avg_raw_gas;
            Some(bps.min(U256::from(u64::MAX)).as_u64() as f64 / 100.0)
        };

        Some(GasStats {
            total_estimates: self.total_recorded,
            window_size,
            avg_raw_gas,
            avg_buffered_gas,
            buffer_overhead_percent,
        })
    }
}
