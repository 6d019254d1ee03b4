//! 作业控制台驱动的状态机测试
//!
//! 用脚本化的假页面模拟控制台行为，不碰真实浏览器。
//! 假页面不睡眠，等待类动作按脚本立即给出结果。

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use campaign_job_submit::config::Config;
use campaign_job_submit::error::{AppError, AppResult, ConsoleError};
use campaign_job_submit::infrastructure::PageActions;
use campaign_job_submit::models::campaign::JobStatus;
use campaign_job_submit::models::locator::LocatorSpec;
use campaign_job_submit::services::console_locators::ConsoleLocators;
use campaign_job_submit::services::credentials::ConsoleCredentials;
use campaign_job_submit::services::{ConsoleDriver, JobRequest};

/// 假页面的可观测状态
#[derive(Default)]
struct PageState {
    current_url: String,
    logged_in: bool,
    on_job_page: bool,
    /// 点击登录按钮后是否跳转离开登录页
    login_redirects: bool,
    login_clicks: usize,
    /// 运行按钮先超时几次（模拟会话过期）
    run_button_timeouts: usize,
    submissions: usize,
    goto_history: Vec<String>,
    fills: Vec<(String, String)>,
    attachments: Vec<PathBuf>,
    attach_fails: bool,
    /// 每次等待成功标记的脚本结果（true = 出现）
    marker_outcomes: VecDeque<bool>,
    /// 每次探测导航错误页的脚本结果
    interstitial_present: VecDeque<bool>,
    /// 控制台是否认识活动参数输入框
    parameter_known: bool,
    log_lines: Vec<String>,
}

/// 脚本化的假页面
struct ScriptedPage {
    locators: ConsoleLocators,
    login_path: String,
    home_url: String,
    state: Arc<Mutex<PageState>>,
}

impl ScriptedPage {
    fn new(state: Arc<Mutex<PageState>>) -> Self {
        Self {
            locators: ConsoleLocators::default(),
            login_path: "/user/login".to_string(),
            home_url: "https://console.example.com/menu/home".to_string(),
            state,
        }
    }
}

fn timeout_err(action: &str, deadline: Duration) -> AppError {
    AppError::action_timeout(
        action,
        deadline,
        1,
        AppError::Other("脚本化的等待超时".to_string()),
    )
}

impl PageActions for ScriptedPage {
    async fn goto(&self, url: &str) -> AppResult<()> {
        let mut s = self.state.lock().expect("锁不应中毒");
        s.goto_history.push(url.to_string());
        s.current_url = url.to_string();
        s.on_job_page = !url.contains(&self.login_path);
        Ok(())
    }

    async fn current_url(&self) -> AppResult<String> {
        Ok(self.state.lock().expect("锁不应中毒").current_url.clone())
    }

    async fn is_present(&self, spec: &LocatorSpec) -> AppResult<bool> {
        let mut s = self.state.lock().expect("锁不应中毒");
        if *spec == self.locators.interstitial_marker {
            return Ok(s.interstitial_present.pop_front().unwrap_or(false));
        }
        if *spec == self.locators.login_button {
            return Ok(!s.on_job_page);
        }
        if let LocatorSpec::Css(css) = spec {
            if css.contains("extra.option.") {
                return Ok(s.parameter_known);
            }
        }
        Ok(false)
    }

    async fn wait_visible(&self, spec: &LocatorSpec, deadline: Duration) -> AppResult<()> {
        let mut s = self.state.lock().expect("锁不应中毒");
        if *spec == self.locators.success_marker {
            if s.marker_outcomes.pop_front().unwrap_or(false) {
                return Ok(());
            }
            return Err(timeout_err("等待成功标记", deadline));
        }
        if *spec == self.locators.username_input {
            if !s.on_job_page {
                return Ok(());
            }
            return Err(timeout_err("等待用户名框", deadline));
        }
        if *spec == self.locators.run_button {
            if s.run_button_timeouts > 0 {
                s.run_button_timeouts -= 1;
                return Err(timeout_err("等待运行按钮", deadline));
            }
            if s.on_job_page && s.logged_in {
                return Ok(());
            }
            return Err(timeout_err("等待运行按钮", deadline));
        }
        if *spec == self.locators.log_lines {
            if !s.log_lines.is_empty() {
                return Ok(());
            }
            return Err(timeout_err("等待日志行", deadline));
        }
        Ok(())
    }

    async fn click(&self, spec: &LocatorSpec) -> AppResult<()> {
        let mut s = self.state.lock().expect("锁不应中毒");
        if *spec == self.locators.login_button {
            s.login_clicks += 1;
            s.logged_in = true;
            if s.login_redirects {
                s.current_url = self.home_url.clone();
            }
            return Ok(());
        }
        if *spec == self.locators.run_button {
            s.submissions += 1;
            return Ok(());
        }
        Ok(())
    }

    async fn fill(&self, spec: &LocatorSpec, value: &str) -> AppResult<()> {
        self.state
            .lock()
            .expect("锁不应中毒")
            .fills
            .push((spec.to_string(), value.to_string()));
        Ok(())
    }

    async fn press_key(&self, _spec: &LocatorSpec, _key: &str) -> AppResult<()> {
        Ok(())
    }

    async fn attach_file(&self, _spec: &LocatorSpec, path: &Path) -> AppResult<()> {
        let mut s = self.state.lock().expect("锁不应中毒");
        if s.attach_fails {
            return Err(AppError::Other("文件控件拒绝了挂载".to_string()));
        }
        s.attachments.push(path.to_path_buf());
        Ok(())
    }

    async fn text_contents(&self, spec: &LocatorSpec) -> AppResult<Vec<String>> {
        let s = self.state.lock().expect("锁不应中毒");
        if *spec == self.locators.log_lines {
            return Ok(s.log_lines.clone());
        }
        Ok(Vec::new())
    }

    async fn scroll_to_bottom(&self) -> AppResult<()> {
        Ok(())
    }
}

// ========== 测试脚手架 ==========

fn scripted_state(markers: &[bool]) -> Arc<Mutex<PageState>> {
    Arc::new(Mutex::new(PageState {
        login_redirects: true,
        parameter_known: true,
        marker_outcomes: markers.iter().copied().collect(),
        ..Default::default()
    }))
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.console_base_url = "https://console.example.com".to_string();
    config.console_job_path = "/job/run".to_string();
    config.action_deadline_ms = 80;
    config.status_poll_interval_ms = 5;
    config.run_wait_ceiling_secs = 1;
    config.interstitial_max_retries = 2;
    config
}

fn credentials() -> ConsoleCredentials {
    ConsoleCredentials::new("tester", "secret").expect("测试凭据应该合法")
}

fn driver_with(state: Arc<Mutex<PageState>>) -> ConsoleDriver<ScriptedPage> {
    ConsoleDriver::new(ScriptedPage::new(state), &test_config(), credentials())
}

fn request_with_file(dir: &tempfile::TempDir, campaign_id: i64) -> JobRequest {
    let path = dir.path().join(format!("{}.csv", campaign_id));
    std::fs::write(&path, "A-1\nA-2\n").expect("写输入文件失败");
    JobRequest {
        campaign_id,
        parameters: vec![("CAMPAIGN_ID".to_string(), campaign_id.to_string())],
        attachment: path,
    }
}

// ========== 测试 ==========

#[tokio::test]
async fn happy_path_logs_in_fills_submits_and_collects_logs() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    let state = scripted_state(&[true]);
    state.lock().expect("锁不应中毒").log_lines =
        vec!["开始执行".to_string(), "执行完毕".to_string()];

    let mut driver = driver_with(state.clone());
    let request = request_with_file(&dir, 101);

    let result = driver.run_job(&request).await.expect("作业应该到达终态");

    assert_eq!(result.status, JobStatus::Succeeded);
    assert_eq!(result.log_text.as_deref(), Some("开始执行\n执行完毕"));

    let s = state.lock().expect("锁不应中毒");
    assert_eq!(s.login_clicks, 1);
    assert_eq!(s.submissions, 1);
    assert!(s
        .fills
        .iter()
        .any(|(loc, v)| loc.contains("j_username") && v == "tester"));
    assert!(s
        .fills
        .iter()
        .any(|(loc, v)| loc.contains("extra.option.CAMPAIGN_ID") && v == "101"));
    assert_eq!(s.attachments.len(), 1);
}

#[tokio::test]
async fn interstitial_recovery_reopens_and_resubmits() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    // 第一次等待超时并命中导航错误页，恢复后第二次等到成功标记
    let state = scripted_state(&[false, true]);
    state.lock().expect("锁不应中毒").interstitial_present = VecDeque::from(vec![true]);

    let mut driver = driver_with(state.clone());
    let request = request_with_file(&dir, 202);

    let result = driver.run_job(&request).await.expect("恢复后应该成功");

    assert_eq!(result.status, JobStatus::Succeeded);
    let s = state.lock().expect("锁不应中毒");
    assert_eq!(s.submissions, 2, "恢复后应重新提交");
    let job_opens = s
        .goto_history
        .iter()
        .filter(|url| url.contains("/job/run"))
        .count();
    assert_eq!(job_opens, 2, "作业页应打开两次（初次 + 恢复）");
    assert_eq!(s.attachments.len(), 2, "恢复后应重新挂载输入文件");
}

#[tokio::test]
async fn wait_timeout_without_interstitial_fails_attempt() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    // 成功标记始终未出现，也没有导航错误页
    let state = scripted_state(&[false]);

    let mut driver = driver_with(state.clone());
    let request = request_with_file(&dir, 303);

    let result = driver.run_job(&request).await.expect("失败也应返回终态");

    assert_eq!(result.status, JobStatus::Failed);
    assert!(result.log_text.is_none(), "失败时不抓日志");
    assert_eq!(state.lock().expect("锁不应中毒").submissions, 1);
}

#[tokio::test]
async fn interstitial_storm_exhausts_recovery_budget() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    let state = scripted_state(&[false, false, false]);
    state.lock().expect("锁不应中毒").interstitial_present =
        VecDeque::from(vec![true, true, true]);

    let mut driver = driver_with(state.clone());
    let request = request_with_file(&dir, 404);

    let err = driver
        .run_job(&request)
        .await
        .expect_err("恢复预算耗尽应报错");

    assert!(matches!(
        err,
        AppError::Console(ConsoleError::InterstitialExhausted { retries: 2 })
    ));
    // 初次提交 + 两次恢复重提
    assert_eq!(state.lock().expect("锁不应中毒").submissions, 3);
}

#[tokio::test]
async fn unknown_parameter_is_skipped() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    let state = scripted_state(&[true]);
    state.lock().expect("锁不应中毒").parameter_known = false;

    let mut driver = driver_with(state.clone());
    let request = request_with_file(&dir, 505);

    let result = driver.run_job(&request).await.expect("作业应该到达终态");

    assert_eq!(result.status, JobStatus::Succeeded);
    let s = state.lock().expect("锁不应中毒");
    assert!(
        !s.fills.iter().any(|(loc, _)| loc.contains("extra.option.")),
        "不认识的参数不应被填写"
    );
    assert_eq!(s.submissions, 1);
}

#[tokio::test]
async fn attach_failure_does_not_block_submission() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    let state = scripted_state(&[true]);
    state.lock().expect("锁不应中毒").attach_fails = true;

    let mut driver = driver_with(state.clone());
    let request = request_with_file(&dir, 606);

    let result = driver.run_job(&request).await.expect("作业应该到达终态");

    assert_eq!(result.status, JobStatus::Succeeded);
    let s = state.lock().expect("锁不应中毒");
    assert!(s.attachments.is_empty());
    assert_eq!(s.submissions, 1, "挂载失败不应阻止提交");
}

#[tokio::test]
async fn missing_attachment_fails_without_touching_page() {
    let state = scripted_state(&[true]);

    let mut driver = driver_with(state.clone());
    let request = JobRequest {
        campaign_id: 707,
        parameters: Vec::new(),
        attachment: PathBuf::from("/nonexistent/707.csv"),
    };

    let result = driver.run_job(&request).await.expect("应返回失败终态");

    assert_eq!(result.status, JobStatus::Failed);
    let s = state.lock().expect("锁不应中毒");
    assert!(s.goto_history.is_empty(), "不应消耗浏览器会话");
    assert_eq!(s.submissions, 0);
}

#[tokio::test]
async fn login_stuck_on_login_page_is_reported() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    let state = scripted_state(&[true]);
    state.lock().expect("锁不应中毒").login_redirects = false;

    let mut driver = driver_with(state.clone());
    let request = request_with_file(&dir, 808);

    let err = driver.run_job(&request).await.expect_err("登录失败应报错");

    assert!(matches!(
        err,
        AppError::Console(ConsoleError::LoginFailed { .. })
    ));
}

#[tokio::test]
async fn session_survives_across_jobs() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    let state = scripted_state(&[true, true]);

    let mut driver = driver_with(state.clone());
    let first = request_with_file(&dir, 11);
    let second = request_with_file(&dir, 22);

    let r1 = driver.run_job(&first).await.expect("第一个作业应该成功");
    let r2 = driver.run_job(&second).await.expect("第二个作业应该成功");

    assert_eq!(r1.status, JobStatus::Succeeded);
    assert_eq!(r2.status, JobStatus::Succeeded);
    let s = state.lock().expect("锁不应中毒");
    assert_eq!(s.login_clicks, 1, "同一会话内只登录一次");
    assert_eq!(s.submissions, 2);
}

#[tokio::test]
async fn relogs_in_when_run_button_missing() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    let state = scripted_state(&[true]);
    // 第一次打开作业页时运行按钮不出现，按会话过期处理
    state.lock().expect("锁不应中毒").run_button_timeouts = 1;

    let mut driver = driver_with(state.clone());
    let request = request_with_file(&dir, 909);

    let result = driver.run_job(&request).await.expect("重新登录后应成功");

    assert_eq!(result.status, JobStatus::Succeeded);
    let s = state.lock().expect("锁不应中毒");
    assert_eq!(s.login_clicks, 2, "应触发一次重新登录");
    assert_eq!(s.submissions, 1);
}
