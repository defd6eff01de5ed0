// services/tx/types.rs

use crate::services::gas::gas_strategy::GasPriority;
use ethers_core::types::{Bytes, H160, U256};

/// 调用方提交的待定价交易（引擎只读：不修改、不签名、不提交）
#[derive(Debug, Clone)]
pub struct DraftTx {
    pub to: H160,
    pub value: U256,
    pub data: Bytes,
}

/// 定价完成的交易：原始字段 + 独立计算的 gas 参数
#[derive(Debug, Clone)]
pub struct AnnotatedTx {
    pub to: H160,
    pub value: U256,
    pub data: Bytes,
    pub gas_price: U256,
    pub gas_limit: U256,
}

#[derive(Debug, Clone, Copy)]
pub struct EstimateOptions {
    pub priority: GasPriority,
    /// 注入给底层 RPC 调用的截止时间（秒）
    pub timeout_secs: u64,
}

impl Default for EstimateOptions {
    fn default() -> Self {
        Self {
            priority: GasPriority::Standard,
            timeout_secs: 30,
        }
    }
}

/// 报价来源：区分「正常定价」与「降级兜底」
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    /// 已按区块利用率定价；congestion_bps 为 None 表示区块 gasLimit
    /// 为 0、拥堵度未知（此时不做档位调整）
    Quoted { congestion_bps: Option<u64> },
    /// 区块数据获取失败，返回未调整的链上建议价
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    pub price: U256,
    pub source: PriceSource,
}

impl PriceQuote {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, PriceSource::Fallback)
    }
}
