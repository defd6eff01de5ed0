use config::ConfigError;
use ethers_providers::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("配置加载失败: {0}")]
    Config(#[from] ConfigError),

    /// 配置校验错误（缓冲系数/批大小等不合法时，启动即拒绝）
    #[error("配置校验失败: {0}")]
    InvalidConfig(String),

    #[error("RPC提供者错误: {0}")]
    ProviderError(String),

    /// RPC 调用超过注入的截止时间
    #[error("RPC调用超时: {0}s")]
    Timeout(u64),

    /// Gas 模拟失败（交易会 revert 等），必须原样上抛，不允许重试
    #[error("Gas估算失败: 目标 {to}, 原因: {reason}")]
    EstimationFailed { to: String, reason: String },

    /// 批量估算失败：定位到组内具体交易
    #[error("批量估算失败: 第 {group} 组第 {index} 笔交易: {reason}")]
    BatchEstimation {
        group: usize,
        index: usize,
        reason: String,
    },

    #[error("类型转换错误: {0}")]
    ConversionError(String),

    #[error("算术溢出: {0}")]
    Overflow(String),

    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    /// 内部不可预期错误（兜底）
    #[error("内部错误: {0}")]
    Internal(String),
}

impl AppError {
    pub fn new(message: &str) -> Self {
        AppError::Internal(message.to_string())
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::ProviderError(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
