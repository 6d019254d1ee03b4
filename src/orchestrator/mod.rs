//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责整次运行的调度和资源管理，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 运行编排器
//! - 管理应用生命周期（初始化、运行、收场）
//! - 编排三个阶段：取数分组 → 串行运行活动 → 结果持久化
//! - 管理浏览器资源（Browser、LivePage）
//! - 产出结构化的运行汇总
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (一次完整运行)
//!     ↓
//! workflow::CampaignFlow (处理单个活动)
//!     ↓
//! services (能力层：warehouse / population / console_driver)
//!     ↓
//! infrastructure (基础设施：LivePage / retry)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：App 管整次运行，CampaignFlow 管单个活动
//! 2. **资源隔离**：只有编排层持有 Browser
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod app;

// 重新导出主要类型
pub use app::{App, RunOptions};
