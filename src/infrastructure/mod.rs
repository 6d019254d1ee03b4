//! 基础设施层（Infrastructure Layer）
//!
//! 持有稀缺资源（Page），只向上暴露能力：
//! - `page_actions` - 页面动作能力（PageActions trait + LivePage）
//! - `retry` - 弹性操作包装器（截止时间内立即重试）

pub mod page_actions;
pub mod retry;

pub use page_actions::{LivePage, PageActions};
