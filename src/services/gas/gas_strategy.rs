// services/gas/gas_strategy.rs

use serde::{Deserialize, Serialize};

/// 交易优先级档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasPriority {
    Slow,
    Standard,
    Fast,
    Instant,
}

impl GasPriority {
    /// 价格调整百分比（100 = 无调整）
    /// 示例：125 表示最终价 = 基准价 × 125%
    pub fn multiplier_percent(&self) -> u64 {
        match self {
            GasPriority::Slow => 90,      // -10%
            GasPriority::Standard => 100, // 无调整
            GasPriority::Fast => 110,     // +10%
            GasPriority::Instant => 125,  // +25%
        }
    }
}

impl Default for GasPriority {
    fn default() -> Self {
        GasPriority::Standard
    }
}
