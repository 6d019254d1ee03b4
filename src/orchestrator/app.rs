//! 运行编排器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次完整运行的调度和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、初始化日志文件、获取控制台凭据
//! 2. **取数阶段**：拉取人群并按活动分组落盘（或从已有文件重建）
//! 3. **控制台阶段**：打开唯一的浏览器会话，按输入顺序逐个运行活动
//! 4. **持久化阶段**：把运行结果尽力写回仓库（失败不影响运行状态）
//! 5. **汇总**：产出结构化的运行汇总，包含各阶段耗时与行数统计
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个活动的细节，向下委托 CampaignFlow
//! - **资源所有者**：唯一创建并关闭 Browser 的模块
//! - **严格串行**：活动之间共用一条会话，绝不并发
//! - **无数据早退**：人群为空时在打开浏览器之前就收场

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Local;
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

use crate::browser;
use crate::config::Config;
use crate::error::{AppError, AppResult, FileError};
use crate::infrastructure::LivePage;
use crate::models::campaign::{CampaignPartition, JobRunResult};
use crate::models::summary::{RowCounts, RunStatus, RunSummary, RunTimings};
use crate::services::credentials::{console_credentials_from_env, ConsoleCredentials};
use crate::services::{ConsoleDriver, PopulationService, WarehouseClient};
use crate::utils::logging;
use crate::workflow::{CampaignCtx, CampaignFlow};

/// 持久化行的来源标记
const RESULT_SOURCE: &str = "campaign_job_submit";

/// 一次运行的选项
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// 基准日期（YYYY-MM-DD）
    pub cut_date: String,
    /// 跳过取数，直接使用已有的输入文件
    pub no_download: bool,
}

/// 应用主结构
pub struct App {
    config: Config,
    credentials: ConsoleCredentials,
    warehouse: WarehouseClient,
}

impl App {
    /// 初始化应用
    ///
    /// 凭据缺失是致命的前置条件失败，在任何活动开始前报出。
    pub async fn initialize(config: Config) -> AppResult<Self> {
        config.validate()?;

        logging::init_log_file(&config.output_log_file).map_err(|e| {
            AppError::File(FileError::WriteFailed {
                path: config.output_log_file.clone(),
                source: e.into(),
            })
        })?;
        logging::log_startup(&config);

        let credentials = console_credentials_from_env()?;
        let warehouse = WarehouseClient::new(&config);

        Ok(Self {
            config,
            credentials,
            warehouse,
        })
    }

    /// 运行应用主逻辑
    ///
    /// 永远尽力走到汇总：单个活动失败不中断运行，
    /// 只有仓库级/会话级的致命错误才会让整次运行报错返回。
    pub async fn run(&self, options: RunOptions) -> AppResult<RunSummary> {
        let run_id = Local::now().format("%Y%m%d%H%M%S").to_string();
        let started_at = Local::now();
        info!("🧾 运行标识: {} (基准日期: {})", run_id, options.cut_date);

        // ========== 阶段 1: 取数与分组 ==========
        let fetch_timer = Instant::now();
        let (partitions, due_date, population_rows) = self.gather_partitions(&options).await?;
        let fetch_elapsed = fetch_timer.elapsed();

        if partitions.is_empty() {
            warn!("⚠️ 没有可运行的活动，以无数据状态收场");
            let summary = self.no_data_summary(&options, run_id, started_at, fetch_elapsed);
            logging::log_final_stats(&summary, &self.config.output_log_file);
            return Ok(summary);
        }

        let accounts_total: usize = partitions.iter().map(|p| p.account_ids.len()).sum();
        logging::log_partitions_loaded(partitions.len(), accounts_total);

        // ========== 阶段 2: 按顺序运行所有活动 ==========
        let console_timer = Instant::now();
        let results = self.run_all_campaigns(&partitions).await?;
        let console_elapsed = console_timer.elapsed();

        // ========== 阶段 3: 结果持久化（尽力） ==========
        let persist_timer = Instant::now();
        let persisted_rows = match self
            .persist_results(&run_id, &options.cut_date, due_date.as_deref(), &partitions, &results)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                warn!("⚠️ 结果持久化失败，不影响运行状态: {}", e);
                0
            }
        };
        let persist_elapsed = persist_timer.elapsed();

        let summary = RunSummary {
            status: RunStatus::from_results(&results),
            run_id,
            cut_date: options.cut_date.clone(),
            due_date,
            results,
            row_counts: RowCounts {
                population_rows,
                partitioned_accounts: accounts_total,
                persisted_rows,
            },
            timings: RunTimings {
                started_at,
                finished_at: Local::now(),
                fetch: fetch_elapsed,
                console: console_elapsed,
                persist: persist_elapsed,
            },
        };
        logging::log_final_stats(&summary, &self.config.output_log_file);
        Ok(summary)
    }

    /// 取数阶段：拉取人群落盘，或从已有文件重建
    ///
    /// # 返回
    /// (活动分组, 到期日, 人群行数)；跳过取数时后两者分别是 None 和 0
    async fn gather_partitions(
        &self,
        options: &RunOptions,
    ) -> AppResult<(Vec<CampaignPartition>, Option<String>, usize)> {
        let service = PopulationService::new(&self.warehouse, &self.config);

        if options.no_download {
            info!("📁 跳过取数，使用 {}/ 里已有的输入文件", self.config.input_dir);
            let partitions = service.load_partition_files()?;
            return Ok((partitions, None, 0));
        }

        let Some(population) = service.fetch(&options.cut_date).await? else {
            return Ok((Vec::new(), None, 0));
        };
        service.write_partition_files(&population.partitions)?;
        Ok((
            population.partitions,
            Some(population.due_date),
            population.population_rows,
        ))
    }

    /// 控制台阶段：打开唯一的浏览器会话，串行运行所有活动
    async fn run_all_campaigns(
        &self,
        partitions: &[CampaignPartition],
    ) -> AppResult<Vec<JobRunResult>> {
        let (browser, page) = browser::open_session(&self.config).await?;
        let actions = LivePage::new(page, self.config.status_poll_interval());
        let mut driver = ConsoleDriver::new(actions, &self.config, self.credentials.clone());
        let flow = CampaignFlow::new(&self.config);

        let total = partitions.len();
        let mut results = Vec::with_capacity(total);
        for (idx, partition) in partitions.iter().enumerate() {
            logging::log_campaign_start(
                idx + 1,
                total,
                partition.campaign_id,
                partition.account_ids.len(),
            );
            let ctx = CampaignCtx::new(
                partition.campaign_id,
                idx + 1,
                total,
                self.config.partition_file(partition.campaign_id),
            );
            let result = flow.run(&mut driver, &ctx).await;
            log_campaign_outcome(&ctx, &result);
            results.push(result);
        }

        browser::close_session(browser).await;
        Ok(results)
    }

    /// 持久化阶段：确保结果表存在并批量写入
    async fn persist_results(
        &self,
        run_id: &str,
        cut_date: &str,
        due_date: Option<&str>,
        partitions: &[CampaignPartition],
        results: &[JobRunResult],
    ) -> AppResult<usize> {
        let dataset = &self.config.results_dataset;
        let table = &self.config.results_table;
        info!("📊 把运行结果写回 {}.{}...", dataset, table);

        self.warehouse.ensure_dataset(dataset).await?;
        self.warehouse
            .ensure_table(dataset, table, result_table_fields())
            .await?;

        let rows = build_result_rows(run_id, cut_date, due_date, partitions, results);
        self.warehouse.insert_all(dataset, table, &rows).await
    }

    fn no_data_summary(
        &self,
        options: &RunOptions,
        run_id: String,
        started_at: chrono::DateTime<Local>,
        fetch_elapsed: Duration,
    ) -> RunSummary {
        RunSummary {
            status: RunStatus::NoData,
            run_id,
            cut_date: options.cut_date.clone(),
            due_date: None,
            results: Vec::new(),
            row_counts: RowCounts::default(),
            timings: RunTimings {
                started_at,
                finished_at: Local::now(),
                fetch: fetch_elapsed,
                console: Duration::ZERO,
                persist: Duration::ZERO,
            },
        }
    }
}

/// 结果表的 REST 模式
fn result_table_fields() -> JsonValue {
    json!([
        { "name": "cut_date", "type": "DATE" },
        { "name": "due_date", "type": "DATE" },
        { "name": "campaign_id", "type": "INTEGER" },
        { "name": "account_id", "type": "STRING" },
        { "name": "collected_at", "type": "TIMESTAMP" },
        { "name": "job_status", "type": "STRING" },
        { "name": "run_id", "type": "STRING" },
        { "name": "source", "type": "STRING" },
    ])
}

/// 展开成每账户一行：同一活动下的所有账户共享该活动的终态
fn build_result_rows(
    run_id: &str,
    cut_date: &str,
    due_date: Option<&str>,
    partitions: &[CampaignPartition],
    results: &[JobRunResult],
) -> Vec<JsonValue> {
    let status_of: HashMap<i64, &str> = results
        .iter()
        .map(|r| (r.campaign_id, r.status.as_str()))
        .collect();
    let collected_at = Local::now().to_rfc3339();

    let mut rows = Vec::new();
    for partition in partitions {
        let Some(status) = status_of.get(&partition.campaign_id) else {
            continue;
        };
        for account_id in &partition.account_ids {
            rows.push(json!({
                "cut_date": cut_date,
                "due_date": due_date,
                "campaign_id": partition.campaign_id,
                "account_id": account_id,
                "collected_at": collected_at,
                "job_status": status,
                "run_id": run_id,
                "source": RESULT_SOURCE,
            }));
        }
    }
    rows
}

// ========== 日志辅助函数 ==========

fn log_campaign_outcome(ctx: &CampaignCtx, result: &JobRunResult) {
    if result.status.is_succeeded() {
        info!("{} ✓ 活动完成", ctx);
    } else {
        warn!("{} ❌ 活动以失败收场", ctx);
    }
}
