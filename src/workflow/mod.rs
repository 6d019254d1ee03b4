pub mod campaign_ctx;
pub mod campaign_flow;

pub use campaign_ctx::CampaignCtx;
pub use campaign_flow::{CampaignFlow, JobRunner};
