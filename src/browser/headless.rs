use std::path::Path;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// 启动受管浏览器
///
/// 默认无头模式；调试时可以通过配置切到有头模式观察控制台操作。
pub async fn launch_browser(config: &Config) -> AppResult<(Browser, Page)> {
    info!("🚀 启动浏览器 (无头: {})...", config.browser_headless);

    let mut builder = BrowserConfig::builder()
        .window_size(config.window_width, config.window_height)
        .args(vec![
            "--disable-gpu",           // 无头模式下禁用 GPU
            "--no-sandbox",            // 禁用沙盒，防止权限问题导致的崩溃
            "--disable-dev-shm-usage", // 防止共享内存不足
        ]);
    builder = if config.browser_headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(executable) = &config.chrome_executable {
        builder = builder.chrome_executable(Path::new(executable));
    }

    let browser_config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        AppError::Other(format!("配置浏览器失败: {}", e))
    })?;

    // 启动浏览器
    let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        e
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建页面失败: {}", e);
        e
    })?;

    info!("✅ 浏览器会话就绪");

    Ok((browser, page))
}
