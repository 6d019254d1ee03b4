//! 浏览器会话
//!
//! 两条入口：连接到已运行的浏览器（调试端口），或自行启动一个受管实例。
//! 会话（Browser + Page）在一次运行中只打开一次，由作业控制台驱动独占。

pub mod connection;
pub mod headless;

use chromiumoxide::{Browser, Page};
use tracing::debug;

use crate::config::Config;
use crate::error::AppResult;

pub use connection::connect_to_browser_and_page;
pub use headless::launch_browser;

/// 按配置打开本次运行的浏览器会话
pub async fn open_session(config: &Config) -> AppResult<(Browser, Page)> {
    match config.browser_debug_port {
        Some(port) => connection::connect_to_browser_and_page(port).await,
        None => headless::launch_browser(config).await,
    }
}

/// 尽力关闭会话；失败只记录，不影响运行结果
pub async fn close_session(mut browser: Browser) {
    if let Err(e) = browser.close().await {
        debug!("关闭浏览器失败: {}", e);
    }
    let _ = browser.wait().await;
}
