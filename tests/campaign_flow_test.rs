//! 活动作业流程（重试循环）与运行汇总的行为测试

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use campaign_job_submit::config::Config;
use campaign_job_submit::error::{AppError, AppResult};
use campaign_job_submit::models::campaign::{JobRunResult, JobStatus};
use campaign_job_submit::models::locator::LocatorError;
use campaign_job_submit::models::summary::{RowCounts, RunStatus, RunSummary, RunTimings};
use campaign_job_submit::services::JobRequest;
use campaign_job_submit::workflow::{CampaignCtx, CampaignFlow, JobRunner};
use chrono::Local;

/// 按脚本吐结果的假执行方
struct FakeRunner {
    outcomes: VecDeque<AppResult<JobRunResult>>,
    calls: usize,
    last_request: Option<JobRequest>,
}

impl FakeRunner {
    fn new(outcomes: Vec<AppResult<JobRunResult>>) -> Self {
        Self {
            outcomes: outcomes.into(),
            calls: 0,
            last_request: None,
        }
    }
}

impl JobRunner for FakeRunner {
    async fn run_job(&mut self, request: &JobRequest) -> AppResult<JobRunResult> {
        self.calls += 1;
        self.last_request = Some(request.clone());
        self.outcomes
            .pop_front()
            .unwrap_or_else(|| Ok(JobRunResult::failed(request.campaign_id)))
    }
}

fn ctx_with_file(dir: &tempfile::TempDir, campaign_id: i64) -> CampaignCtx {
    let path = dir.path().join(format!("{}.csv", campaign_id));
    std::fs::write(&path, "A-1\n").expect("写输入文件失败");
    CampaignCtx::new(campaign_id, 1, 1, path)
}

fn flow(max_attempts: Option<usize>) -> CampaignFlow {
    let mut config = Config::default();
    config.max_job_attempts = max_attempts;
    CampaignFlow::new(&config)
}

#[tokio::test]
async fn retries_failed_attempt_until_success() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    let ctx = ctx_with_file(&dir, 101);
    let mut runner = FakeRunner::new(vec![
        Ok(JobRunResult::failed(101)),
        Ok(JobRunResult::succeeded(101, Some("完成".to_string()))),
    ]);

    let result = flow(None).run(&mut runner, &ctx).await;

    assert_eq!(result.status, JobStatus::Succeeded);
    assert_eq!(result.log_text.as_deref(), Some("完成"));
    assert_eq!(runner.calls, 2);
}

#[tokio::test]
async fn absorbs_session_errors_and_retries() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    let ctx = ctx_with_file(&dir, 202);
    let mut runner = FakeRunner::new(vec![
        Err(AppError::Other("浏览器断连".to_string())),
        Ok(JobRunResult::succeeded(202, None)),
    ]);

    let result = flow(None).run(&mut runner, &ctx).await;

    assert_eq!(result.status, JobStatus::Succeeded);
    assert_eq!(runner.calls, 2);
}

#[tokio::test]
async fn missing_artifact_fails_without_invoking_runner() {
    let ctx = CampaignCtx::new(303, 1, 1, PathBuf::from("/nonexistent/303.csv"));
    let mut runner = FakeRunner::new(Vec::new());

    let result = flow(None).run(&mut runner, &ctx).await;

    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(runner.calls, 0, "输入文件缺失时不应消耗会话");
}

#[tokio::test]
async fn attempt_cap_turns_into_failure() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    let ctx = ctx_with_file(&dir, 404);
    // 脚本耗尽后假执行方永远返回失败
    let mut runner = FakeRunner::new(Vec::new());

    let result = flow(Some(3)).run(&mut runner, &ctx).await;

    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(runner.calls, 3);
}

#[tokio::test]
async fn invalid_locator_is_not_retried() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    let ctx = ctx_with_file(&dir, 505);
    let mut runner = FakeRunner::new(vec![Err(AppError::Locator(LocatorError::Empty {
        what: "css 选择器",
    }))]);

    let result = flow(None).run(&mut runner, &ctx).await;

    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(runner.calls, 1, "程序性错误重试无意义");
}

#[tokio::test]
async fn request_carries_campaign_parameter_and_artifact() {
    let dir = tempfile::tempdir().expect("建临时目录失败");
    let ctx = ctx_with_file(&dir, 606);
    let mut runner = FakeRunner::new(vec![Ok(JobRunResult::succeeded(606, None))]);

    flow(None).run(&mut runner, &ctx).await;

    let request = runner.last_request.expect("应该发出过请求");
    assert_eq!(request.campaign_id, 606);
    assert_eq!(
        request.parameters,
        vec![("CAMPAIGN_ID".to_string(), "606".to_string())]
    );
    assert_eq!(request.attachment, ctx.artifact_path);
}

// ========== 运行汇总 ==========

fn summary_with(status: RunStatus, results: Vec<JobRunResult>) -> RunSummary {
    let now = Local::now();
    RunSummary {
        status,
        run_id: "20251103120000".to_string(),
        cut_date: "2025-11-03".to_string(),
        due_date: Some("2025-11-10".to_string()),
        results,
        row_counts: RowCounts::default(),
        timings: RunTimings {
            started_at: now,
            finished_at: now,
            fetch: Duration::ZERO,
            console: Duration::ZERO,
            persist: Duration::ZERO,
        },
    }
}

#[test]
fn run_status_follows_results() {
    let all_ok = vec![
        JobRunResult::succeeded(1, None),
        JobRunResult::succeeded(2, None),
        JobRunResult::succeeded(3, None),
    ];
    assert_eq!(RunStatus::from_results(&all_ok), RunStatus::Succeeded);

    let one_ko = vec![
        JobRunResult::succeeded(1, None),
        JobRunResult::failed(2),
        JobRunResult::succeeded(3, None),
    ];
    assert_eq!(RunStatus::from_results(&one_ko), RunStatus::Failed);
}

#[test]
fn exit_codes_cover_all_endings() {
    let ok = summary_with(
        RunStatus::Succeeded,
        vec![JobRunResult::succeeded(1, None)],
    );
    assert_eq!(ok.exit_code(), 0);
    assert_eq!(ok.ok_count(), 1);
    assert_eq!(ok.ko_count(), 0);

    let ko = summary_with(
        RunStatus::Failed,
        vec![JobRunResult::succeeded(1, None), JobRunResult::failed(2)],
    );
    assert_eq!(ko.exit_code(), 1);
    assert_eq!(ko.ko_count(), 1);

    // 人群为空：没有活动可运行
    let empty = summary_with(RunStatus::NoData, Vec::new());
    assert_eq!(empty.exit_code(), 2);
}
