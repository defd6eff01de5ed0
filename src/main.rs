use anyhow::Context;
use base_gas_rs::config::Config;
use base_gas_rs::log_info;
use base_gas_rs::startup::startup::Application;
use base_gas_rs::utils::logger::init_logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志（全局只需调用一次）
    init_logger();

    log_info!("Starting application initialization...");

    // 1. 加载配置（含定价引擎参数校验）
    let config = Config::load().context("Failed to load application configuration")?;

    // 2. 构建应用实例 (初始化 RPC Provider 栈与定价引擎)
    let application = Application::build(config)
        .await
        .context("Application building failed (provider initialization)")?;

    log_info!("Application build complete. Starting monitor loop.");

    // 3. 运行核心服务（采样循环 + Ctrl+C 退出）
    application
        .run()
        .await
        .context("Application core service failed during runtime")?;

    Ok(())
}
