//! 活动作业流程 - 流程层
//!
//! 核心职责：定义"一个活动"的完整运行流程
//!
//! 流程顺序：
//! 1. 校验输入文件存在（不存在直接判失败，不消耗浏览器会话）
//! 2. 驱动一次作业 → 成功则返回
//! 3. 失败或会话级错误 → 重试，直到成功或达到尝试上限

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::PageActions;
use crate::models::campaign::JobRunResult;
use crate::services::console_driver::{ConsoleDriver, JobRequest};
use crate::workflow::campaign_ctx::CampaignCtx;

/// 能把一次作业请求驱动到终态的执行方
///
/// 生产实现是控制台驱动；测试用脚本化的假实现替换。
#[allow(async_fn_in_trait)]
pub trait JobRunner {
    async fn run_job(&mut self, request: &JobRequest) -> AppResult<JobRunResult>;
}

impl<A: PageActions> JobRunner for ConsoleDriver<A> {
    async fn run_job(&mut self, request: &JobRequest) -> AppResult<JobRunResult> {
        ConsoleDriver::run_job(self, request).await
    }
}

/// 活动作业流程
///
/// - 编排单个活动从请求构建到终态的完整流程
/// - 决定何时重试、何时放弃
/// - 不持有任何资源（page、http），只依赖执行方
pub struct CampaignFlow {
    /// 活动 ID 在控制台上的参数名
    campaign_parameter: String,
    /// 尝试上限；None 表示重试到成功为止
    max_attempts: Option<usize>,
}

impl CampaignFlow {
    /// 创建新的活动作业流程
    pub fn new(config: &Config) -> Self {
        Self {
            campaign_parameter: config.campaign_parameter.clone(),
            max_attempts: config.max_job_attempts,
        }
    }

    /// 把一个活动运行到终态
    ///
    /// 永远返回一个结果，单个活动的任何失败都不会中断整次运行：
    /// - 本次尝试失败 → 重试（受尝试上限约束）
    /// - 会话级错误 → 记录后重试
    /// - 定位器非法是程序性错误，重试无意义，直接判失败
    pub async fn run<R: JobRunner>(&self, runner: &mut R, ctx: &CampaignCtx) -> JobRunResult {
        if !ctx.artifact_path.exists() {
            warn!(
                "{} ⚠️ 输入文件不存在，判失败: {}",
                ctx,
                ctx.artifact_path.display()
            );
            return JobRunResult::failed(ctx.campaign_id);
        }

        let request = JobRequest {
            campaign_id: ctx.campaign_id,
            parameters: vec![(
                self.campaign_parameter.clone(),
                ctx.campaign_id.to_string(),
            )],
            attachment: ctx.artifact_path.clone(),
        };

        let mut attempts = 0usize;
        loop {
            attempts += 1;
            info!("{} 第 {} 次尝试", ctx, attempts);

            match runner.run_job(&request).await {
                Ok(result) if result.status.is_succeeded() => {
                    info!("{} ✅ 活动作业成功 (尝试 {} 次)", ctx, attempts);
                    return result;
                }
                Ok(_) => {
                    warn!("{} ⚠️ 本次尝试失败，准备重试", ctx);
                }
                Err(AppError::Locator(e)) => {
                    error!("{} ❌ 定位器非法，无法继续: {}", ctx, e);
                    return JobRunResult::failed(ctx.campaign_id);
                }
                Err(e) => {
                    error!("{} ❌ 会话级错误，准备重试: {}", ctx, e);
                }
            }

            if let Some(cap) = self.max_attempts {
                if attempts >= cap {
                    error!("{} ❌ 已达尝试上限 {}，判失败", ctx, cap);
                    return JobRunResult::failed(ctx.campaign_id);
                }
            }
        }
    }
}
