use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use campaign_job_submit::{logger, App, AppResult, Config, RunOptions};

/// 营销活动作业提交
#[derive(Debug, Parser)]
#[command(
    name = "campaign_job_submit",
    version,
    about = "从数据仓库拉取目标人群并驱动作业控制台逐活动提交"
)]
struct Cli {
    /// 基准日期（YYYY-MM-DD），缺省为今天
    cut_date: Option<String>,

    /// 跳过取数，直接使用已有的输入文件
    #[arg(long)]
    no_download: bool,

    /// TOML 配置文件路径；不指定时从环境变量加载
    #[arg(long)]
    config: Option<PathBuf>,

    /// 有头模式运行浏览器（调试用）
    #[arg(long)]
    headed: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志
    logger::init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ 配置加载失败: {}", e);
            return ExitCode::from(1);
        }
    };

    let cut_date = cli
        .cut_date
        .clone()
        .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
    let options = RunOptions {
        cut_date,
        no_download: cli.no_download,
    };

    // 退出码约定：0 全部成功，1 有失败或致命错误，2 无数据
    match run(config, options).await {
        Ok(code) => code,
        Err(e) => {
            error!("❌ 运行失败: {}", e);
            ExitCode::from(1)
        }
    }
}

fn load_config(cli: &Cli) -> AppResult<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };
    if cli.headed {
        config.browser_headless = false;
    }
    Ok(config)
}

async fn run(config: Config, options: RunOptions) -> AppResult<ExitCode> {
    let app = App::initialize(config).await?;
    let summary = app.run(options).await?;
    Ok(ExitCode::from(summary.exit_code()))
}
