pub mod config;

pub use config::{Config, EthereumConfig, MonitorConfig, OptimizerConfig};
