//! Owner of the work queue and driver of every item's lifecycle.
//!
//! Two triggers create items:
//!
//! - **Detection**: a [`FileEventSource`] reports an arrived file. The item
//!   is queued at once, waits the settle delay, then runs as an independent
//!   task. At most `max_concurrent` detection items process at a time.
//! - **Manual batch**: a list of paths is queued in one go and processed
//!   strictly in order by a single task.
//!
//! Detection tasks are tracked so that [`Orchestrator::drain`] can wait for
//! them after the watch loop stops.
//!
//! The orchestrator is the only writer of the queue and the history. Every
//! mutation is published on the [`EventChannel`] while the queue lock is
//! held, so subscribers observe changes in the order they happened.

use chrono::Utc;
use lattice_lut::LatticeTable;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, Mutex, RwLock, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{ConfigError, ProcessingError, SetupError};
use crate::models::{
    PipelineSettings, ProcessedRecord, RunConfig, RunParameters, WorkItem, WorkItemId,
    WorkOrigin, WorkStatus,
};
use crate::services::engine::{ColorTransformEngine, ImageProcessor};
use crate::services::event_channel::{EventChannel, PipelineEvent};
use crate::services::file_watcher::FileEventSource;
use crate::services::lut_cache::LutCache;
use crate::services::work_queue::{ProcessedLog, QueueError, WorkQueue};

/// Immutable snapshot shared by every item created under one configuration.
#[derive(Debug)]
pub struct RunContext {
    pub table: Arc<LatticeTable>,
    pub params: RunParameters,
    pub output_dir: PathBuf,
    pub lut_path: PathBuf,
    pub lut_name: String,
}

/// How a single item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    /// The item left the queue (explicit clear) before it could finish
    Dropped,
}

/// Tally of a finished manual batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.skipped
    }
}

/// A submitted manual batch.
pub struct BatchHandle {
    ids: Vec<WorkItemId>,
    task: JoinHandle<BatchReport>,
}

impl BatchHandle {
    /// Item ids in submission order.
    pub fn ids(&self) -> &[WorkItemId] {
        &self.ids
    }

    /// Wait until every item of the batch reached a terminal state.
    pub async fn wait(self) -> Result<BatchReport, ProcessingError> {
        self.task
            .await
            .map_err(|e| ProcessingError::Worker(e.to_string()))
    }
}

/// A running detection loop.
///
/// Dropping the handle also stops the loop. Items already dispatched keep
/// running either way.
pub struct WatchHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop listening for new files and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Watch loop ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

struct Inner {
    settings: PipelineSettings,
    queue: RwLock<WorkQueue>,
    history: RwLock<ProcessedLog>,
    events: EventChannel,
    run: RwLock<Option<Arc<RunContext>>>,
    luts: LutCache,
    permits: Semaphore,
    /// Dispatched detection items, awaited by `drain`
    detections: Mutex<JoinSet<()>>,
    next_id: AtomicU64,
    processor: Arc<dyn ImageProcessor>,
}

/// Cheap to clone; all clones share one queue.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(settings: PipelineSettings) -> Self {
        Self::with_processor(settings, Arc::new(ColorTransformEngine::new()))
    }

    /// Use a custom processor instead of the image pipeline.
    pub fn with_processor(settings: PipelineSettings, processor: Arc<dyn ImageProcessor>) -> Self {
        let inner = Inner {
            queue: RwLock::new(WorkQueue::new()),
            history: RwLock::new(ProcessedLog::new(settings.history_capacity)),
            events: EventChannel::new(settings.event_capacity),
            run: RwLock::new(None),
            luts: LutCache::new(),
            permits: Semaphore::new(settings.max_concurrent.max(1)),
            detections: Mutex::new(JoinSet::new()),
            next_id: AtomicU64::new(1),
            processor,
            settings,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Validate a run configuration, load its LUT and make it current.
    ///
    /// Items created afterwards use this snapshot. Items already queued keep
    /// the one they were created with. A malformed LUT leaves the previous
    /// configuration in place.
    ///
    /// The output directory is created if needed and stored in canonical
    /// form, so destinations compare equal to the absolute paths a watcher
    /// reports.
    pub async fn configure(&self, run: RunConfig) -> Result<(), SetupError> {
        if run.output_dir.exists() && !run.output_dir.is_dir() {
            return Err(ConfigError::NotADirectory(run.output_dir).into());
        }
        if !run.lut_path.is_file() {
            return Err(ConfigError::LutNotFound(run.lut_path).into());
        }
        let output_dir = canonical_output_dir(&run.output_dir).await?;

        let table = self.inner.luts.get_or_load(&run.lut_path).await?;
        let lut_name = run
            .lut_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!(
            lut = %lut_name,
            size = table.size(),
            strength = run.params.strength,
            quality = run.params.quality,
            dither = %run.params.dither,
            output = %output_dir.display(),
            "Run configured"
        );

        let context = RunContext {
            table,
            params: run.params,
            output_dir,
            lut_path: run.lut_path,
            lut_name,
        };
        *self.inner.run.write().await = Some(Arc::new(context));
        Ok(())
    }

    pub async fn run_context(&self) -> Option<Arc<RunContext>> {
        self.inner.run.read().await.clone()
    }

    /// Check that `watch_dir` can be watched under the current run and
    /// return its canonical form.
    ///
    /// Watching the output directory would grade every result again and
    /// overwrite the photos being watched, so it is rejected.
    pub async fn check_watch_dir(&self, watch_dir: &Path) -> Result<PathBuf, ConfigError> {
        let context = self.require_context().await?;
        if !watch_dir.is_dir() {
            return Err(ConfigError::NotADirectory(watch_dir.to_path_buf()));
        }
        let canonical = tokio::fs::canonicalize(watch_dir)
            .await
            .map_err(|_| ConfigError::NotADirectory(watch_dir.to_path_buf()))?;
        if canonical == context.output_dir {
            return Err(ConfigError::WatchIsOutput(canonical));
        }
        Ok(canonical)
    }

    async fn require_context(&self) -> Result<Arc<RunContext>, ConfigError> {
        self.run_context().await.ok_or(ConfigError::NotConfigured)
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    /// Queue every path as `Waiting`, then process them one at a time in
    /// submission order.
    ///
    /// While item `i` of `n` is processing its progress is `i / n`; it
    /// becomes 1 on completion.
    pub async fn submit_batch(&self, paths: Vec<PathBuf>) -> Result<BatchHandle, ConfigError> {
        let context = self.require_context().await?;

        let mut items = Vec::with_capacity(paths.len());
        for source in paths {
            let dest = manual_destination(&context.output_dir, &source);
            items.push(self.enqueue(source, dest, WorkOrigin::Manual).await);
        }
        let ids = items.iter().map(|item| item.id).collect();
        tracing::info!(count = items.len(), "Batch submitted");

        let this = self.clone();
        let task = tokio::spawn(async move {
            let total = items.len();
            let mut report = BatchReport::default();
            for (index, item) in items.iter().enumerate() {
                let progress = index as f32 / total as f32;
                match this.run_item(&context, item, progress).await {
                    Outcome::Completed => report.completed += 1,
                    Outcome::Failed => report.failed += 1,
                    Outcome::Dropped => report.skipped += 1,
                }
            }
            tracing::info!(
                completed = report.completed,
                failed = report.failed,
                skipped = report.skipped,
                "Batch finished"
            );
            report
        });

        Ok(BatchHandle { ids, task })
    }

    /// Consume arrival events from `source` until it closes or the returned
    /// handle is stopped.
    pub async fn start_watching<S>(&self, mut source: S) -> Result<WatchHandle, ConfigError>
    where
        S: FileEventSource + 'static,
    {
        self.require_context().await?;

        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let this = self.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Watch loop stopped");
                        break;
                    }
                    next = source.next_event() => match next {
                        Some(path) => this.on_detected(path).await,
                        None => {
                            tracing::debug!("Event source closed");
                            break;
                        }
                    },
                }
            }
        });

        Ok(WatchHandle { shutdown, task })
    }

    /// Queue a detected file and dispatch it after the settle delay.
    pub async fn on_detected(&self, source: PathBuf) {
        let Some(context) = self.run_context().await else {
            tracing::warn!(path = %source.display(), "File detected but no run configured");
            return;
        };
        let Some(file_name) = source.file_name() else {
            return;
        };
        let dest = context.output_dir.join(file_name);
        let resolved = tokio::fs::canonicalize(&source)
            .await
            .unwrap_or_else(|_| source.clone());
        if dest == resolved {
            // Our own output landing in a watched output directory
            tracing::debug!(path = %source.display(), "Ignoring output file");
            return;
        }

        let item = self.enqueue(source, dest, WorkOrigin::Detected).await;
        tracing::debug!(id = %item.id, file = %item.file_name, "File detected");

        let this = self.clone();
        let mut detections = self.inner.detections.lock().await;
        // Reap finished tasks so the set only holds live ones
        while let Some(finished) = detections.try_join_next() {
            log_join_error(finished);
        }
        detections.spawn(async move {
            tokio::time::sleep(this.inner.settings.settle_delay).await;
            let Ok(_permit) = this.inner.permits.acquire().await else {
                return;
            };
            this.run_item(&context, &item, 0.0).await;
        });
    }

    /// Wait until every dispatched detection item reached a terminal state.
    ///
    /// Call after stopping the watch loop. Items detected while draining are
    /// awaited too.
    pub async fn drain(&self) {
        loop {
            let mut pending = std::mem::take(&mut *self.inner.detections.lock().await);
            if pending.is_empty() {
                return;
            }
            tracing::info!(count = pending.len(), "Waiting for in-flight items");
            while let Some(finished) = pending.join_next().await {
                log_join_error(finished);
            }
        }
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Current queue contents in insertion order.
    pub async fn items(&self) -> Vec<WorkItem> {
        self.inner.queue.read().await.snapshot()
    }

    pub async fn item(&self, id: WorkItemId) -> Option<WorkItem> {
        self.inner.queue.read().await.get(id).cloned()
    }

    /// Successful items, newest first.
    pub async fn history(&self) -> Vec<ProcessedRecord> {
        self.inner.history.read().await.snapshot()
    }

    pub async fn clear_history(&self) {
        self.inner.history.write().await.clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> &EventChannel {
        &self.inner.events
    }

    /// Remove every item regardless of status. In-flight processing keeps
    /// running but its result is no longer reported on the queue.
    pub async fn clear(&self) -> usize {
        let mut queue = self.inner.queue.write().await;
        let removed = queue.clear();
        self.inner
            .events
            .publish(PipelineEvent::QueueCleared { removed });
        tracing::info!(removed, "Queue cleared");
        removed
    }

    // ========================================================================
    // Item lifecycle
    // ========================================================================

    async fn enqueue(&self, source: PathBuf, dest: PathBuf, origin: WorkOrigin) -> WorkItem {
        let id = WorkItemId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let item = WorkItem::new(id, source, dest, origin);

        let mut queue = self.inner.queue.write().await;
        queue.push(item.clone());
        self.inner.events.publish(PipelineEvent::queued(&item));
        item
    }

    /// Apply a queue mutation and publish the resulting status.
    ///
    /// Returns `None` when the item is gone or the transition is illegal.
    async fn update<F>(&self, id: WorkItemId, mutate: F) -> Option<WorkItem>
    where
        F: FnOnce(&mut WorkQueue) -> Result<WorkItem, QueueError>,
    {
        let mut queue = self.inner.queue.write().await;
        match mutate(&mut queue) {
            Ok(item) => {
                tracing::debug!(%id, status = %item.status, progress = item.progress, "Item updated");
                self.inner.events.publish(PipelineEvent::status_of(&item));
                Some(item)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Item update skipped");
                None
            }
        }
    }

    async fn run_item(&self, context: &Arc<RunContext>, item: &WorkItem, progress: f32) -> Outcome {
        let id = item.id;

        match tokio::fs::try_exists(&item.source_path).await {
            Ok(true) => {}
            Ok(false) => {
                let error = ProcessingError::SourceMissing(item.source_path.clone());
                return self.fail(id, &error).await;
            }
            Err(source) => {
                let error = ProcessingError::Read {
                    path: item.source_path.clone(),
                    source,
                };
                return self.fail(id, &error).await;
            }
        }

        let started = self
            .update(id, |queue| {
                queue.set_progress(id, progress)?;
                queue.transition(id, WorkStatus::Processing, None)
            })
            .await;
        if started.is_none() {
            return Outcome::Dropped;
        }

        match self.execute(context, &item.source_path, &item.dest_path).await {
            Ok(()) => self.complete(context, item).await,
            Err(e) => self.fail(id, &e).await,
        }
    }

    /// Run the processor on the blocking pool, bounded by the timeout.
    async fn execute(
        &self,
        context: &Arc<RunContext>,
        source: &Path,
        dest: &Path,
    ) -> Result<(), ProcessingError> {
        let processor = self.inner.processor.clone();
        let context = context.clone();
        let (source, dest) = (source.to_path_buf(), dest.to_path_buf());
        let task = tokio::task::spawn_blocking(move || {
            processor.process(&source, &dest, &context.table, &context.params)
        });

        let joined = match self.inner.settings.process_timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| ProcessingError::TimedOut(limit))?,
            None => task.await,
        };
        joined.map_err(|e| ProcessingError::Worker(e.to_string()))?
    }

    async fn complete(&self, context: &RunContext, item: &WorkItem) -> Outcome {
        let id = item.id;
        let completed = self
            .update(id, |queue| queue.transition(id, WorkStatus::Completed, None))
            .await;

        self.inner.history.write().await.record(ProcessedRecord {
            source_path: item.source_path.clone(),
            dest_path: item.dest_path.clone(),
            lut_name: context.lut_name.clone(),
            params: context.params,
            processed_at: Utc::now(),
        });
        tracing::info!(%id, file = %item.file_name, dest = %item.dest_path.display(), "Image completed");

        if completed.is_none() {
            return Outcome::Dropped;
        }
        self.schedule_prune(id);
        Outcome::Completed
    }

    async fn fail(&self, id: WorkItemId, error: &ProcessingError) -> Outcome {
        tracing::warn!(%id, error = %error, "Item failed");
        let reason = error.to_string();
        match self
            .update(id, |queue| {
                queue.transition(id, WorkStatus::Failed, Some(reason))
            })
            .await
        {
            Some(_) => Outcome::Failed,
            None => Outcome::Dropped,
        }
    }

    /// Drop a completed item after the grace window.
    fn schedule_prune(&self, id: WorkItemId) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.inner.settings.completed_grace).await;
            let mut queue = this.inner.queue.write().await;
            if queue.remove_completed(id).is_some() {
                tracing::debug!(%id, "Item pruned");
                this.inner.events.publish(PipelineEvent::ItemPruned { id });
            }
        });
    }
}

async fn canonical_output_dir(dir: &Path) -> Result<PathBuf, ConfigError> {
    let prepare = |source| ConfigError::OutputDir {
        path: dir.to_path_buf(),
        source,
    };
    tokio::fs::create_dir_all(dir).await.map_err(prepare)?;
    tokio::fs::canonicalize(dir).await.map_err(prepare)
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "Detection task ended abnormally");
    }
}

/// Destination for a manually submitted file: `<stem>_processed.<ext>` in
/// the output directory.
pub fn manual_destination(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let name = match source.extension() {
        Some(ext) => format!("{stem}_processed.{}", ext.to_string_lossy()),
        None => format!("{stem}_processed"),
    };
    output_dir.join(name)
}
