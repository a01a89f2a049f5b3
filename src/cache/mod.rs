pub mod dataset;
pub mod report;

pub use dataset::{CacheStatus, DatasetCache, MySqlDatasetSource, warmup_dataset_cache};
pub use report::{RedisReportCache, ReportCache};
