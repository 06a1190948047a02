//! Test harness around a configured orchestrator.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use lutwatch::lattice_lut::DitherMode;
use lutwatch::models::{
    PipelineSettings, RunConfig, RunParameters, WorkItem, WorkItemId, WorkStatus,
};
use lutwatch::services::Orchestrator;

use super::fixtures;

/// Temporary `in/`, `out/` and `luts/` directories plus an orchestrator
/// configured against them.
pub struct TestPipeline {
    pub dir: TempDir,
    pub orchestrator: Orchestrator,
}

impl TestPipeline {
    /// Identity LUT, full strength, no dithering.
    pub async fn new() -> Self {
        let params = RunParameters::new(100, 95, DitherMode::None).unwrap();
        Self::with_lut(&fixtures::identity_cube(2), params).await
    }

    pub async fn with_lut(cube: &str, params: RunParameters) -> Self {
        Self::with_settings(cube, params, fixtures::fast_settings()).await
    }

    pub async fn with_settings(
        cube: &str,
        params: RunParameters,
        settings: PipelineSettings,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["in", "out", "luts"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let lut_path = dir.path().join("luts").join("test.cube");
        std::fs::write(&lut_path, cube).unwrap();

        let orchestrator = Orchestrator::new(settings);
        orchestrator
            .configure(RunConfig {
                lut_path,
                output_dir: dir.path().join("out"),
                params,
            })
            .await
            .unwrap();

        Self { dir, orchestrator }
    }

    /// Canonical root, matching how the orchestrator stores paths.
    pub fn root(&self) -> PathBuf {
        self.dir.path().canonicalize().unwrap()
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root().join("in")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("out")
    }

    pub fn input(&self, name: &str) -> PathBuf {
        self.input_dir().join(name)
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.output_dir().join(name)
    }

    /// Poll until the item reaches `status` or panic after `timeout`.
    pub async fn wait_for(
        &self,
        id: WorkItemId,
        status: WorkStatus,
        timeout: Duration,
    ) -> WorkItem {
        wait_for_item(&self.orchestrator, timeout, |item| {
            item.id == id && item.status == status
        })
        .await
    }

    /// Poll until the item named `file_name` reaches `status`.
    pub async fn wait_for_file(
        &self,
        file_name: &str,
        status: WorkStatus,
        timeout: Duration,
    ) -> WorkItem {
        wait_for_item(&self.orchestrator, timeout, |item| {
            item.file_name == file_name && item.status == status
        })
        .await
    }
}

async fn wait_for_item(
    orchestrator: &Orchestrator,
    timeout: Duration,
    predicate: impl Fn(&WorkItem) -> bool,
) -> WorkItem {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(item) = orchestrator.items().await.into_iter().find(|i| predicate(i)) {
            return item;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!(
                "no matching item within {timeout:?}; queue: {:?}",
                orchestrator.items().await
            );
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Read an output image as RGB.
pub fn read_rgb(path: &Path) -> image::RgbImage {
    image::open(path)
        .unwrap_or_else(|e| panic!("cannot open {}: {e}", path.display()))
        .to_rgb8()
}
