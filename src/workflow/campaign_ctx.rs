//! 活动运行上下文
//!
//! 封装"我正在运行第几个活动、它的输入文件在哪"这一信息

use std::fmt::Display;
use std::path::PathBuf;

/// 活动运行上下文
///
/// 包含运行单个活动作业所需的所有上下文信息
#[derive(Debug, Clone)]
pub struct CampaignCtx {
    /// 活动 ID
    pub campaign_id: i64,

    /// 活动序号（从1开始，仅用于日志显示）
    pub campaign_index: usize,

    /// 本次运行的活动总数
    pub total: usize,

    /// 该活动的输入文件路径
    pub artifact_path: PathBuf,
}

impl CampaignCtx {
    /// 创建新的活动上下文
    pub fn new(campaign_id: i64, campaign_index: usize, total: usize, artifact_path: PathBuf) -> Self {
        Self {
            campaign_id,
            campaign_index,
            total,
            artifact_path,
        }
    }
}

impl Display for CampaignCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[活动 ID#{} 序号#{}/{}]",
            self.campaign_id, self.campaign_index, self.total
        )
    }
}
