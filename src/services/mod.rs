pub mod engine;
pub mod event_channel;
pub mod exif;
pub mod file_watcher;
pub mod lut_cache;
pub mod orchestrator;
pub mod work_queue;

pub use engine::{ColorTransformEngine, ImageProcessor};
pub use event_channel::{EventChannel, PipelineEvent};
pub use exif::{ExifSubset, MetadataError};
pub use file_watcher::{ChannelSource, DirectoryWatcher, FileEventSource};
pub use lut_cache::{load_lut, LutCache};
pub use orchestrator::{BatchHandle, BatchReport, Orchestrator, RunContext, WatchHandle};
pub use work_queue::{ProcessedLog, QueueError, WorkQueue};
