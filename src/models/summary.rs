//! 运行汇总模型
//!
//! 核心对外层（邮件、指标等被排除的报告方）的唯一义务：
//! 返回一份结构化的运行汇总。

use std::time::Duration;

use chrono::{DateTime, Local};

use crate::models::campaign::JobRunResult;

/// 整次运行的最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// 所有活动都成功
    Succeeded,
    /// 至少一个活动失败，或运行被致命错误中断
    Failed,
    /// 目标人群为空，没有活动可处理
    NoData,
}

impl RunStatus {
    /// 由各活动结果推导整体状态
    pub fn from_results(results: &[JobRunResult]) -> Self {
        if results.iter().all(|r| r.status.is_succeeded()) {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
            RunStatus::NoData => "NO_DATA",
        }
    }
}

/// 仓库行数统计
#[derive(Debug, Clone, Copy, Default)]
pub struct RowCounts {
    /// 人群查询返回的原始行数
    pub population_rows: usize,
    /// 分组后保留的账户数
    pub partitioned_accounts: usize,
    /// 成功持久化的结果行数
    pub persisted_rows: usize,
}

/// 各阶段耗时
#[derive(Debug, Clone, Copy)]
pub struct RunTimings {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub fetch: Duration,
    pub console: Duration,
    pub persist: Duration,
}

/// 一次运行的结构化汇总
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub status: RunStatus,
    pub run_id: String,
    pub cut_date: String,
    /// 由基准日期解析出的到期日；--no-download 模式下未知
    pub due_date: Option<String>,
    pub results: Vec<JobRunResult>,
    pub row_counts: RowCounts,
    pub timings: RunTimings,
}

impl RunSummary {
    pub fn ok_count(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_succeeded()).count()
    }

    pub fn ko_count(&self) -> usize {
        self.results.len() - self.ok_count()
    }

    /// 进程退出码约定：0 成功，1 失败，2 无数据
    pub fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Succeeded => 0,
            RunStatus::Failed => 1,
            RunStatus::NoData => 2,
        }
    }
}
