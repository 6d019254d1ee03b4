//! 人群获取与分组 - 业务能力层
//!
//! ## 职责
//! 两步取数：基准日期 → 到期日；到期日 → (账户, 活动) 人群。
//! 取回后按活动分组，并落盘为每活动一个输入文件（一行一个账户 ID）。
//!
//! 任一步取不到数据都不是错误，是"无数据"结局，由上层决定收场方式。

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError, FileError};
use crate::models::campaign::{partition_accounts, CampaignPartition};
use crate::services::warehouse::WarehouseClient;

/// 到期日列名
const DUE_DATE_COLUMN: &str = "due_date";
/// 人群查询的列名
const ACCOUNT_COLUMN: &str = "account_id";
const CAMPAIGN_COLUMN: &str = "campaign_id";

/// 一次人群拉取的结果
#[derive(Debug)]
pub struct Population {
    pub cut_date: String,
    pub due_date: String,
    /// 按活动分组后的人群，保持仓库返回的首现顺序
    pub partitions: Vec<CampaignPartition>,
    /// 分组前的人群行数
    pub population_rows: usize,
}

/// 人群服务
pub struct PopulationService<'a> {
    client: &'a WarehouseClient,
    config: &'a Config,
}

impl<'a> PopulationService<'a> {
    pub fn new(client: &'a WarehouseClient, config: &'a Config) -> Self {
        Self { client, config }
    }

    /// 从仓库拉取基准日期对应的人群
    ///
    /// # 返回
    /// - `Ok(Some(_))` - 取到了非空人群
    /// - `Ok(None)` - 日历上没有这一天，或人群为空（无数据结局）
    pub async fn fetch(&self, cut_date: &str) -> AppResult<Option<Population>> {
        validate_date("cut_date", cut_date)?;

        info!("🔍 查询基准日期 {} 对应的到期日...", cut_date);
        let Some(due_date) = self.lookup_due_date(cut_date).await? else {
            warn!("⚠️ 日历上没有基准日期 {} 对应的到期日", cut_date);
            return Ok(None);
        };
        validate_date(DUE_DATE_COLUMN, &due_date)?;
        info!("✓ 到期日: {}", due_date);

        info!("🔍 查询到期日 {} 的目标人群...", due_date);
        let result = self.client.execute(&self.population_sql(&due_date)).await?;
        if result.is_empty() {
            warn!("⚠️ 到期日 {} 的目标人群为空", due_date);
            return Ok(None);
        }

        let campaigns = result.int_values(CAMPAIGN_COLUMN).ok_or_else(|| {
            AppError::Other(format!("人群查询结果缺少 {} 列", CAMPAIGN_COLUMN))
        })?;
        let accounts = result.text_values(ACCOUNT_COLUMN).ok_or_else(|| {
            AppError::Other(format!("人群查询结果缺少 {} 列", ACCOUNT_COLUMN))
        })?;

        let partitions = partition_accounts(campaigns, accounts);
        if partitions.is_empty() {
            warn!("⚠️ 人群行全部缺少活动或账户，无可运行的活动");
            return Ok(None);
        }
        info!(
            "✓ 人群 {} 行，分为 {} 个活动组",
            result.row_count,
            partitions.len()
        );

        Ok(Some(Population {
            cut_date: cut_date.to_string(),
            due_date,
            partitions,
            population_rows: result.row_count,
        }))
    }

    async fn lookup_due_date(&self, cut_date: &str) -> AppResult<Option<String>> {
        let result = self.client.execute(&self.cutoff_sql(cut_date)).await?;
        let Some(values) = result.text_values(DUE_DATE_COLUMN) else {
            return Ok(None);
        };
        Ok(values.iter().flatten().next().map(|v| v.to_string()))
    }

    /// 每个活动写一个输入文件，文件名是活动 ID
    pub fn write_partition_files(&self, partitions: &[CampaignPartition]) -> AppResult<()> {
        let dir = Path::new(&self.config.input_dir);
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::file_write_failed(dir.display().to_string(), e))?;

        for partition in partitions {
            let path = self.config.partition_file(partition.campaign_id);
            let mut content = partition.account_ids.join("\n");
            content.push('\n');
            std::fs::write(&path, content)
                .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
            debug!(
                "已写入 {} ({} 个账户)",
                path.display(),
                partition.account_ids.len()
            );
        }
        info!(
            "📦 输入文件已写入 {}/ ({} 个活动)",
            self.config.input_dir,
            partitions.len()
        );
        Ok(())
    }

    /// 跳过取数时，从已有的输入文件重建活动分组
    ///
    /// 文件名主干就是活动 ID；认不出 ID 或内容为空的文件跳过。
    /// 文件系统的遍历顺序不稳定，按活动 ID 排序兜底。
    pub fn load_partition_files(&self) -> AppResult<Vec<CampaignPartition>> {
        let dir = Path::new(&self.config.input_dir);
        if !dir.is_dir() {
            return Err(AppError::File(FileError::DirectoryNotFound {
                path: dir.display().to_string(),
            }));
        }

        let mut partitions = Vec::new();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?;
        for entry in entries {
            let entry =
                entry.map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
                continue;
            }
            let campaign_id = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<i64>().ok());
            let Some(campaign_id) = campaign_id else {
                warn!("跳过无法识别活动 ID 的输入文件: {}", path.display());
                continue;
            };

            let content = std::fs::read_to_string(&path)
                .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
            let account_ids: Vec<String> = content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect();
            if account_ids.is_empty() {
                warn!("输入文件 {} 为空，跳过", path.display());
                continue;
            }
            partitions.push(CampaignPartition {
                campaign_id,
                account_ids,
            });
        }

        partitions.sort_by_key(|partition| partition.campaign_id);
        info!(
            "📦 从 {}/ 重建了 {} 个活动分组",
            self.config.input_dir,
            partitions.len()
        );
        Ok(partitions)
    }

    fn cutoff_sql(&self, cut_date: &str) -> String {
        format!(
            "SELECT {} FROM `{}.{}.{}` WHERE cut_date = '{}'",
            DUE_DATE_COLUMN,
            self.config.warehouse_project,
            self.config.source_dataset,
            self.config.cutoff_table,
            cut_date
        )
    }

    fn population_sql(&self, due_date: &str) -> String {
        format!(
            "SELECT {}, {} FROM `{}.{}.{}` WHERE {} = '{}'",
            ACCOUNT_COLUMN,
            CAMPAIGN_COLUMN,
            self.config.warehouse_project,
            self.config.source_dataset,
            self.config.population_table,
            DUE_DATE_COLUMN,
            due_date
        )
    }
}

/// 校验日期串是 YYYY-MM-DD；日期会被拼进 SQL，格式必须先卡死
pub fn validate_date(name: &str, value: &str) -> AppResult<()> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::Config(ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            expected: "YYYY-MM-DD 格式的日期".to_string(),
        })
    })?;
    Ok(())
}
