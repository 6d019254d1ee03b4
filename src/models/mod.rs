pub mod campaign;
pub mod locator;
pub mod summary;
pub mod warehouse;

pub use campaign::{partition_accounts, CampaignPartition, JobRunResult, JobStatus};
pub use locator::{LocatorError, LocatorSpec, Query};
pub use summary::{RowCounts, RunStatus, RunSummary, RunTimings};
pub use warehouse::{ColumnarResult, QueryJob, QueryResponse};
