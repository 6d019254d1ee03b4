//! # Campaign Job Submit
//!
//! 一个用于自动化营销活动作业提交的 Rust 应用程序：
//! 从数据仓库拉取目标人群，按活动分组落盘，再驱动网页版作业控制台
//! 逐个活动提交作业，最后把运行结果写回仓库。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `LivePage` - 唯一的 page owner，提供定位/点击/填写等页面动作
//! - `retry` - 截止时间内立即重试的包装器
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个服务只处理单一能力
//! - `WarehouseClient` - 仓库查询（提交/轮询/分页）与结果持久化
//! - `PopulationService` - 人群获取、按活动分组与落盘
//! - `ConsoleDriver` - 把一次作业驱动到终态
//! - `AccessTokenBroker` / `credentials` - 令牌链与控制台凭据
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个活动"的完整运行流程
//! - `CampaignCtx` - 上下文封装（campaign_id + 序号 + 输入文件）
//! - `CampaignFlow` - 流程编排（校验输入 → 驱动作业 → 重试到终态）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 运行编排器，管理资源和三个阶段的调度
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{LivePage, PageActions};
pub use models::{
    partition_accounts, CampaignPartition, ColumnarResult, JobRunResult, JobStatus, LocatorSpec,
    RunStatus, RunSummary,
};
pub use orchestrator::{App, RunOptions};
pub use services::{ConsoleDriver, JobRequest, PopulationService, WarehouseClient};
pub use workflow::{CampaignCtx, CampaignFlow, JobRunner};
