use anyhow::Result;
/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::fs;
use tracing::info;

use crate::config::Config;
use crate::models::summary::{RunStatus, RunSummary};

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
///
/// # 返回
/// 返回是否成功初始化
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n活动作业运行日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 程序配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 营销活动作业提交");
    info!("📋 作业控制台: {}", config.console_base_url);
    info!("📊 仓库项目: {}", config.warehouse_project);
    info!("{}", "=".repeat(60));
}

/// 记录活动分组加载信息
///
/// # 参数
/// - `total`: 活动分组数
/// - `accounts`: 账户总数
pub fn log_partitions_loaded(total: usize, accounts: usize) {
    info!("✓ 找到 {} 个待运行的活动 (共 {} 个账户)", total, accounts);
    info!("💡 活动按顺序逐个运行，共用一条浏览器会话\n");
}

/// 记录单个活动开始信息
///
/// # 参数
/// - `index`: 活动序号（从 1 开始）
/// - `total`: 活动总数
/// - `campaign_id`: 活动 ID
/// - `accounts`: 该活动的账户数
pub fn log_campaign_start(index: usize, total: usize, campaign_id: i64, accounts: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始运行第 {}/{} 个活动: {}", index, total, campaign_id);
    info!("📄 输入账户: {} 个", accounts);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 运行汇总
/// - `log_file_path`: 日志文件路径
pub fn log_final_stats(summary: &RunSummary, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 运行完成统计 (run_id: {})", summary.run_id);
    info!(
        "完成时间: {}",
        summary.timings.finished_at.format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    if summary.status == RunStatus::NoData {
        info!("⚠️ 无数据: 基准日期 {} 没有目标人群", summary.cut_date);
    } else {
        info!("✅ 成功: {}/{}", summary.ok_count(), summary.results.len());
        info!("❌ 失败: {}", summary.ko_count());
    }
    info!(
        "📄 人群 {} 行 / 账户 {} 个 / 已持久化 {} 行",
        summary.row_counts.population_rows,
        summary.row_counts.partitioned_accounts,
        summary.row_counts.persisted_rows
    );
    info!(
        "⏱ 取数 {:.1}s / 控制台 {:.1}s / 持久化 {:.1}s",
        summary.timings.fetch.as_secs_f64(),
        summary.timings.console.as_secs_f64(),
        summary.timings.persist.as_secs_f64()
    );
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
