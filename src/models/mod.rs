pub mod config;
pub mod run;
pub mod work_item;

pub use config::{AppConfig, PipelineSettings, RunConfig};
pub use run::{ProcessedRecord, RunParameters};
pub use work_item::{WorkItem, WorkItemId, WorkOrigin, WorkStatus};
