pub mod gas_engine;
pub mod gas_monitor;
pub mod gas_strategy;
pub mod history;

pub use gas_engine::GasEngine;
pub use gas_monitor::{GasMonitor, PriceSample, PriceSummary};
pub use gas_strategy::GasPriority;
pub use history::{EstimateHistory, GasEstimateRecord, GasStats};
