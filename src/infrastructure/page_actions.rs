//! 页面动作 - 基础设施层
//!
//! 持有唯一的 Page 资源，只暴露控制台驱动所需的页面能力。
//! 能力定义在 trait 上，测试用脚本化的假实现替换真实页面。

use std::path::Path;
use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::{Element, Page};
use tokio::time::sleep;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::locator::{LocatorSpec, Query};

/// 控制台驱动依赖的页面能力
#[allow(async_fn_in_trait)]
pub trait PageActions {
    /// 导航到指定地址
    async fn goto(&self, url: &str) -> AppResult<()>;
    /// 当前页面地址
    async fn current_url(&self) -> AppResult<String>;
    /// 元素此刻是否存在于页面上
    async fn is_present(&self, spec: &LocatorSpec) -> AppResult<bool>;
    /// 等待元素出现且可见，直到截止时间
    async fn wait_visible(&self, spec: &LocatorSpec, deadline: Duration) -> AppResult<()>;
    /// 点击元素
    async fn click(&self, spec: &LocatorSpec) -> AppResult<()>;
    /// 清空后输入
    async fn fill(&self, spec: &LocatorSpec, value: &str) -> AppResult<()>;
    /// 在元素上按键
    async fn press_key(&self, spec: &LocatorSpec, key: &str) -> AppResult<()>;
    /// 向文件输入控件挂载本地文件
    async fn attach_file(&self, spec: &LocatorSpec, path: &Path) -> AppResult<()>;
    /// 收集所有匹配元素的文本
    async fn text_contents(&self, spec: &LocatorSpec) -> AppResult<Vec<String>>;
    /// 滚动到页面底部
    async fn scroll_to_bottom(&self) -> AppResult<()>;
}

/// 真实页面上的动作实现
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 把定位器规格解析成元素句柄并执行动作
/// - 不认识活动与作业，不处理业务流程
pub struct LivePage {
    page: Page,
    poll_interval: Duration,
}

impl LivePage {
    /// # 参数
    /// - `page`: 本次运行独占的页面
    /// - `poll_interval`: 等待可见性时的轮询间隔
    pub fn new(page: Page, poll_interval: Duration) -> Self {
        Self {
            page,
            poll_interval,
        }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 把定位器解析为元素句柄；一条规格对应一条查询
    async fn resolve(&self, spec: &LocatorSpec) -> AppResult<Element> {
        match spec.to_query()? {
            Query::Css(selector) => Ok(self.page.find_element(selector).await?),
            Query::XPath(expr) => Ok(self.page.find_xpath(expr).await?),
        }
    }

    async fn resolve_all(&self, spec: &LocatorSpec) -> AppResult<Vec<Element>> {
        match spec.to_query()? {
            Query::Css(selector) => Ok(self.page.find_elements(selector).await?),
            Query::XPath(expr) => Ok(self.page.find_xpaths(expr).await?),
        }
    }

    async fn element_visible(&self, element: &Element) -> bool {
        let ret = element
            .call_js_fn(
                "function() { const r = this.getBoundingClientRect(); return r.width > 0 && r.height > 0; }",
                false,
            )
            .await;
        match ret {
            Ok(call) => call
                .result
                .value
                .as_ref()
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}

impl PageActions for LivePage {
    async fn goto(&self, url: &str) -> AppResult<()> {
        debug!("导航到: {}", url);
        self.page.goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> AppResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn is_present(&self, spec: &LocatorSpec) -> AppResult<bool> {
        match self.resolve(spec).await {
            Ok(_) => Ok(true),
            // 规格本身不合法必须立刻暴露，不能当成"不存在"
            Err(AppError::Locator(e)) => Err(e.into()),
            Err(_) => Ok(false),
        }
    }

    async fn wait_visible(&self, spec: &LocatorSpec, deadline: Duration) -> AppResult<()> {
        let started = Instant::now();
        let mut attempts = 0usize;
        let mut last_error: Option<AppError> = None;
        loop {
            attempts += 1;
            match self.resolve(spec).await {
                Ok(element) => {
                    if self.element_visible(&element).await {
                        return Ok(());
                    }
                    last_error = Some(AppError::Other(format!("元素 {} 存在但不可见", spec)));
                }
                Err(AppError::Locator(e)) => return Err(e.into()),
                Err(e) => last_error = Some(e),
            }
            if started.elapsed() >= deadline {
                let source =
                    last_error.unwrap_or_else(|| AppError::Other("元素始终未出现".to_string()));
                return Err(AppError::action_timeout(
                    format!("等待元素可见 ({})", spec),
                    deadline,
                    attempts,
                    source,
                ));
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn click(&self, spec: &LocatorSpec) -> AppResult<()> {
        let element = self.resolve(spec).await?;
        element.scroll_into_view().await?;
        element.click().await?;
        Ok(())
    }

    async fn fill(&self, spec: &LocatorSpec, value: &str) -> AppResult<()> {
        let element = self.resolve(spec).await?;
        element.click().await?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await?;
        element.type_str(value).await?;
        Ok(())
    }

    async fn press_key(&self, spec: &LocatorSpec, key: &str) -> AppResult<()> {
        let element = self.resolve(spec).await?;
        element.press_key(key).await?;
        Ok(())
    }

    async fn attach_file(&self, spec: &LocatorSpec, path: &Path) -> AppResult<()> {
        // CDP 要求绝对路径
        let absolute = std::fs::canonicalize(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        let element = self.resolve(spec).await?;
        let params = SetFileInputFilesParams::builder()
            .file(absolute.to_string_lossy().to_string())
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(AppError::Other)?;
        self.page.execute(params).await?;
        Ok(())
    }

    async fn text_contents(&self, spec: &LocatorSpec) -> AppResult<Vec<String>> {
        let elements = self.resolve_all(spec).await?;
        let mut texts = Vec::with_capacity(elements.len());
        for element in &elements {
            if let Some(text) = element.inner_text().await? {
                let text = text.trim();
                if !text.is_empty() {
                    texts.push(text.to_string());
                }
            }
        }
        Ok(texts)
    }

    async fn scroll_to_bottom(&self) -> AppResult<()> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await?;
        Ok(())
    }
}
