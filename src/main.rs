//! # Cast 主程序入口
//!
//! 以服务模式运行代理，直到收到 Ctrl+C。

use cast::app::AppConfig;
use cast::context::AgentContext;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 日志级别要先读取配置才能确定
    let config = AppConfig::load()?;

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();

    tracing::info!("Cast 代理启动: {}", config.agent_name);

    headless::run(config).await?;

    tracing::info!("Cast 代理关闭");
    Ok(())
}

/// 无界面模式（服务模式）
mod headless {
    use super::*;
    use std::time::Duration;

    /// 任务状态清理周期
    const PRUNE_INTERVAL: Duration = Duration::from_secs(600);
    /// 已结束任务状态的保留时长
    const STATUS_RETENTION: Duration = Duration::from_secs(3600);

    pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
        let context = AgentContext::initialize(config).await?;

        let authority = context.authority();
        println!("\n=== Cast CA 信息 ===");
        println!("数据目录: {}", context.config().data_root.display());
        println!("CA 主机名: {}", authority.config().ca_hostname);
        println!("CA 指纹: {}", authority.fingerprint()?);
        println!("资源类型: {:?}", context.resource_types());
        println!("====================\n");

        tracing::info!("按 Ctrl+C 停止代理");
        let mut prune_timer = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    break;
                }
                _ = prune_timer.tick() => {
                    context.prune_finished(STATUS_RETENTION);
                }
            }
        }

        tracing::info!("收到停止信号，等待进行中的任务完成...");
        context.shutdown().await;

        let statistics = context.statistics();
        tracing::info!("任务统计: {:?}", statistics);
        Ok(())
    }
}
