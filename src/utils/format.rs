use bigdecimal::BigDecimal;
use ethers_core::types::U256;
use std::str::FromStr;

/// 将U256 BigDecimal
pub fn u256_to_bigdecimal(value: U256) -> BigDecimal {
    // 先转字符串再转 BigDecimal (最安全，处理大数最稳)
    let s = value.to_string();
    BigDecimal::from_str(&s).unwrap_or_else(|_| BigDecimal::from(0))
}

/// wei → gwei 可读字符串（仅用于日志展示，不参与计价）
pub fn format_gwei(wei: U256) -> String {
    let gwei = u256_to_bigdecimal(wei) / BigDecimal::from(1_000_000_000u64);
    format!("{} gwei", gwei.normalized())
}
