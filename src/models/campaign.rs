//! 营销活动领域模型
//!
//! 活动分组（partition）与单次作业运行结果。

use std::collections::{HashMap, HashSet};

/// 活动分组：共享同一个活动 ID 的账户集合
///
/// 不变量：活动 ID 永远有效（无法解析为整数的行在分组前已被丢弃）；
/// 账户顺序保持首次出现的顺序。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignPartition {
    /// 活动 ID
    pub campaign_id: i64,
    /// 该活动下的账户 ID 列表（有序）
    pub account_ids: Vec<String>,
}

/// 作业终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// 控制台报告成功
    Succeeded,
    /// 本次尝试失败
    Failed,
}

impl JobStatus {
    /// 持久化与日志使用的状态字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, JobStatus::Succeeded)
    }
}

/// 驱动一次远程作业到终态的结果
///
/// 创建后不再修改。
#[derive(Debug, Clone)]
pub struct JobRunResult {
    pub campaign_id: i64,
    pub status: JobStatus,
    /// 控制台执行日志（尽力获取，缺失不影响状态）
    pub log_text: Option<String>,
}

impl JobRunResult {
    pub fn succeeded(campaign_id: i64, log_text: Option<String>) -> Self {
        Self {
            campaign_id,
            status: JobStatus::Succeeded,
            log_text,
        }
    }

    pub fn failed(campaign_id: i64) -> Self {
        Self {
            campaign_id,
            status: JobStatus::Failed,
            log_text: None,
        }
    }
}

/// 把 (活动 ID, 账户 ID) 列按活动分组
///
/// 规则：
/// - 活动 ID 或账户 ID 为空的行直接丢弃
/// - 重复的 (活动, 账户) 对只保留第一次出现
/// - 活动之间、账户之间都保持首次出现的顺序
pub fn partition_accounts(
    campaign_ids: &[Option<i64>],
    account_ids: &[Option<String>],
) -> Vec<CampaignPartition> {
    let mut partitions: Vec<CampaignPartition> = Vec::new();
    let mut index_of: HashMap<i64, usize> = HashMap::new();
    let mut seen: HashSet<(i64, String)> = HashSet::new();

    for (campaign, account) in campaign_ids.iter().zip(account_ids.iter()) {
        let (Some(campaign), Some(account)) = (campaign, account) else {
            continue;
        };
        let account = account.trim();
        if account.is_empty() {
            continue;
        }
        if !seen.insert((*campaign, account.to_string())) {
            continue;
        }
        match index_of.get(campaign) {
            Some(&i) => partitions[i].account_ids.push(account.to_string()),
            None => {
                index_of.insert(*campaign, partitions.len());
                partitions.push(CampaignPartition {
                    campaign_id: *campaign,
                    account_ids: vec![account.to_string()],
                });
            }
        }
    }

    partitions
}
