//! 作业控制台驱动 - 业务能力层
//!
//! ## 职责
//! 独占一条浏览器会话，把"登录 → 打开作业页 → 填参数 → 挂输入文件 →
//! 提交 → 等待终态 → 抓日志"封装成单次作业运行。
//!
//! ## 状态机
//! ```text
//! 未认证 ──登录──→ 已认证 ──打开作业页──→ 表单就绪
//! 表单就绪 ──填参/挂文件/提交──→ 运行中
//! 运行中 ──等到成功标记──→ 成功 ──(尽力抓日志)──→ 返回
//! 运行中 ──等待超时──→ 命中导航错误页? ──是──→ 重开重提（有限次）
//!                                      └─否──→ 本次尝试失败
//! ```
//! 导航错误页是唯一被单独识别的瞬时故障：它不依赖作业语义就能从页面
//! 观察到。其余等待失败一律归入超时，交给外层的活动重试循环处理。

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ConsoleError};
use crate::infrastructure::retry;
use crate::infrastructure::PageActions;
use crate::models::campaign::{JobRunResult, JobStatus};
use crate::services::console_locators::ConsoleLocators;
use crate::services::credentials::ConsoleCredentials;
use crate::utils::logging::truncate_text;

/// 一次作业运行的请求
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub campaign_id: i64,
    /// 作业参数（参数名 → 值）；控制台上不存在的参数会被跳过
    pub parameters: Vec<(String, String)>,
    /// 输入文件路径
    pub attachment: PathBuf,
}

/// 作业控制台驱动
///
/// 整个运行期间共用一个实例，登录状态跨活动保持。
pub struct ConsoleDriver<A: PageActions> {
    actions: A,
    locators: ConsoleLocators,
    credentials: ConsoleCredentials,
    login_url: String,
    login_path: String,
    job_url: String,
    action_deadline: Duration,
    url_poll_interval: Duration,
    run_wait_ceiling: Duration,
    interstitial_max_retries: usize,
    logged_in: bool,
}

impl<A: PageActions> ConsoleDriver<A> {
    pub fn new(actions: A, config: &Config, credentials: ConsoleCredentials) -> Self {
        Self {
            actions,
            locators: ConsoleLocators::default(),
            credentials,
            login_url: config.login_url(),
            login_path: config.console_login_path.clone(),
            job_url: config.job_url(),
            action_deadline: config.action_deadline(),
            url_poll_interval: config.status_poll_interval(),
            run_wait_ceiling: config.run_wait_ceiling(),
            interstitial_max_retries: config.interstitial_max_retries,
            logged_in: false,
        }
    }

    /// 驱动一次作业到终态
    ///
    /// # 返回
    /// - `Ok(结果)` - 作业到达终态（成功或本次失败）
    /// - `Err(_)` - 会话级故障（登录失败、错误页恢复耗尽、定位器非法等）
    pub async fn run_job(&mut self, request: &JobRequest) -> AppResult<JobRunResult> {
        let cid = request.campaign_id;

        if !request.attachment.exists() {
            warn!(
                "[活动 {}] ⚠️ 输入文件不存在: {}",
                cid,
                request.attachment.display()
            );
            return Ok(JobRunResult::failed(cid));
        }

        // ========== 阶段 1: 认证 + 打开表单 ==========
        self.ensure_logged_in(cid).await?;
        self.open_and_fill(request).await?;

        // ========== 阶段 2: 挂输入文件（尽力） + 提交 ==========
        self.attach_input(request).await;
        self.submit(cid).await?;

        // ========== 阶段 3: 等待终态（含导航错误页恢复） ==========
        let status = self.wait_terminal(request).await?;

        // ========== 阶段 4: 抓日志（尽力，仅成功时） ==========
        let log_text = if status.is_succeeded() {
            info!("[活动 {}] ✅ 作业成功", cid);
            self.fetch_logs(cid).await
        } else {
            warn!("[活动 {}] ❌ 本次尝试失败（成功标记始终未出现）", cid);
            None
        };

        Ok(JobRunResult {
            campaign_id: cid,
            status,
            log_text,
        })
    }

    /// 登录控制台
    ///
    /// 凭据填入后优先点登录按钮，按钮不存在就在密码框回车。
    /// URL 离开登录路径才算认证成功。
    pub async fn login(&mut self) -> AppResult<()> {
        info!("🔑 登录控制台: {}", self.login_url);
        self.logged_in = false;

        let url = self.login_url.clone();
        retry::until_deadline(self.action_deadline, "打开登录页", || {
            self.actions.goto(&url)
        })
        .await?;
        self.actions
            .wait_visible(&self.locators.username_input, self.action_deadline)
            .await?;

        self.actions
            .fill(&self.locators.username_input, &self.credentials.username)
            .await?;
        self.actions
            .fill(&self.locators.password_input, &self.credentials.password)
            .await?;

        if self.actions.is_present(&self.locators.login_button).await? {
            retry::until_deadline(self.action_deadline, "点击登录按钮", || {
                self.actions.click(&self.locators.login_button)
            })
            .await?;
        } else {
            self.actions
                .press_key(&self.locators.password_input, "Enter")
                .await?;
        }

        self.wait_left_login_page().await?;
        self.logged_in = true;
        info!("✓ 登录成功");
        Ok(())
    }

    async fn wait_left_login_page(&self) -> AppResult<()> {
        let started = Instant::now();
        loop {
            let url = self.actions.current_url().await?;
            if !url.contains(&self.login_path) {
                return Ok(());
            }
            if started.elapsed() >= self.action_deadline {
                return Err(AppError::Console(ConsoleError::LoginFailed { url }));
            }
            sleep(self.url_poll_interval).await;
        }
    }

    async fn ensure_logged_in(&mut self, cid: i64) -> AppResult<()> {
        if self.logged_in {
            return Ok(());
        }
        debug!("[活动 {}] 尚未认证，先登录", cid);
        self.login().await
    }

    /// 打开作业页并填参数
    ///
    /// 运行按钮迟迟不出现按会话过期处理：重新登录后再试一次。
    async fn open_and_fill(&mut self, request: &JobRequest) -> AppResult<()> {
        let cid = request.campaign_id;
        debug!("[活动 {}] 打开作业页: {}", cid, self.job_url);

        let url = self.job_url.clone();
        retry::until_deadline(self.action_deadline, "打开作业页", || {
            self.actions.goto(&url)
        })
        .await?;

        if let Err(e) = self
            .actions
            .wait_visible(&self.locators.run_button, self.action_deadline)
            .await
        {
            if !e.is_action_timeout() {
                return Err(e);
            }
            warn!("[活动 {}] ⚠️ 运行按钮未出现，可能是会话过期，重新登录再试", cid);
            self.login().await?;
            retry::until_deadline(self.action_deadline, "打开作业页", || {
                self.actions.goto(&url)
            })
            .await?;
            self.actions
                .wait_visible(&self.locators.run_button, self.action_deadline)
                .await?;
        }

        self.fill_parameters(request).await
    }

    /// 只填控制台上认识的参数，不认识的名字跳过
    async fn fill_parameters(&self, request: &JobRequest) -> AppResult<()> {
        for (name, value) in &request.parameters {
            let locator = self.locators.parameter_input(name);
            if !self.actions.is_present(&locator).await? {
                debug!(
                    "[活动 {}] 忽略控制台上不存在的参数: {}",
                    request.campaign_id, name
                );
                continue;
            }
            let action = format!("填写参数 {}", name);
            retry::until_deadline(self.action_deadline, &action, || {
                self.actions.fill(&locator, value)
            })
            .await?;
            debug!("[活动 {}] ✓ 参数 {} = {}", request.campaign_id, name, value);
        }
        Ok(())
    }

    /// 挂载输入文件；失败只记录，作业可能有自己的默认输入
    async fn attach_input(&self, request: &JobRequest) {
        match self
            .actions
            .attach_file(&self.locators.file_input, &request.attachment)
            .await
        {
            Ok(()) => debug!(
                "[活动 {}] ✓ 已挂载输入文件: {}",
                request.campaign_id,
                request.attachment.display()
            ),
            Err(e) => warn!(
                "[活动 {}] ⚠️ 挂载输入文件失败，继续提交: {}",
                request.campaign_id, e
            ),
        }
    }

    async fn submit(&self, cid: i64) -> AppResult<()> {
        info!("[活动 {}] 📤 提交作业", cid);
        retry::until_deadline(self.action_deadline, "点击运行按钮", || {
            self.actions.click(&self.locators.run_button)
        })
        .await
    }

    /// 等待作业终态
    ///
    /// 成功标记出现 → 成功；等待超时后看导航错误页：在 → 重开重提
    /// （次数有限），不在 → 本次尝试失败。
    async fn wait_terminal(&mut self, request: &JobRequest) -> AppResult<JobStatus> {
        let cid = request.campaign_id;
        let mut recoveries = 0usize;
        loop {
            info!(
                "[活动 {}] ⏳ 等待成功标记（上限 {} 秒）...",
                cid,
                self.run_wait_ceiling.as_secs()
            );
            match self
                .actions
                .wait_visible(&self.locators.success_marker, self.run_wait_ceiling)
                .await
            {
                Ok(()) => return Ok(JobStatus::Succeeded),
                Err(e) if e.is_action_timeout() => {
                    if !self
                        .actions
                        .is_present(&self.locators.interstitial_marker)
                        .await?
                    {
                        return Ok(JobStatus::Failed);
                    }
                    recoveries += 1;
                    if recoveries > self.interstitial_max_retries {
                        error!(
                            "[活动 {}] ❌ 导航错误页恢复 {} 次后仍未成功，放弃",
                            cid, self.interstitial_max_retries
                        );
                        return Err(AppError::Console(ConsoleError::InterstitialExhausted {
                            retries: self.interstitial_max_retries,
                        }));
                    }
                    warn!(
                        "[活动 {}] ⚠️ 命中导航错误页，第 {} 次恢复：重开作业页并重新提交",
                        cid, recoveries
                    );
                    self.open_and_fill(request).await?;
                    self.attach_input(request).await;
                    self.submit(cid).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 成功后尽力抓取执行日志；拿不到不降级作业结果
    async fn fetch_logs(&self, cid: i64) -> Option<String> {
        if let Err(e) = self.actions.scroll_to_bottom().await {
            debug!("[活动 {}] 滚动到页面底部失败: {}", cid, e);
        }

        let open_view = retry::until_deadline(self.action_deadline, "打开日志视图", || {
            self.actions.click(&self.locators.view_log_button)
        })
        .await;
        if let Err(e) = open_view {
            warn!("[活动 {}] ⚠️ 打不开日志视图: {}", cid, e);
            return None;
        }
        if let Err(e) = self
            .actions
            .wait_visible(&self.locators.log_lines, self.action_deadline)
            .await
        {
            warn!("[活动 {}] ⚠️ 日志内容未出现: {}", cid, e);
            return None;
        }

        match self.actions.text_contents(&self.locators.log_lines).await {
            Ok(lines) if !lines.is_empty() => {
                let text = lines.join("\n");
                info!(
                    "[活动 {}] ✓ 已抓取执行日志 ({} 行): {}",
                    cid,
                    lines.len(),
                    truncate_text(&text, 120)
                );
                Some(text)
            }
            Ok(_) => {
                debug!("[活动 {}] 执行日志为空", cid);
                None
            }
            Err(e) => {
                warn!("[活动 {}] ⚠️ 抓取执行日志失败: {}", cid, e);
                None
            }
        }
    }
}
