use crate::errors::error::AppError;
use ethers_core::types::U256;

/// 按整数百分比缩放（110 = ×1.10，整数除法即向下取整）
pub fn scale_by_percent(value: U256, percent: u64) -> Result<U256, AppError> {
    // 1. checked_mul 防溢出（价格乘系数理论上可能越界）
    let scaled = value
        .checked_mul(U256::from(percent))
        .ok_or_else(|| AppError::Overflow(format!("{} × {}% 百分比缩放溢出", value, percent)))?;

    // 2. 除以 100 还原（floor 语义由整数除法保证）
    Ok(scaled / U256::from(100u64))
}

/// 区块利用率（万分比，0~10000）
/// gas_limit 为 0 时视为「拥堵度未知」，返回 None 而非除零
pub fn utilization_bps(gas_used: U256, gas_limit: U256) -> Option<u64> {
    if gas_limit.is_zero() {
        return None;
    }

    let bps = gas_used.saturating_mul(U256::from(10_000u64)) / gas_limit;

    // 理论上 gas_used ≤ gas_limit，节点数据异常时截断到 u64 范围
    if bps > U256::from(u64::MAX) {
        return Some(u64::MAX);
    }
    Some(bps.as_u64())
}
