//! Directory watcher for the detection trigger.
//!
//! Reports image files that were created in, or moved into, the watched
//! directory. The orchestrator consumes events through [`FileEventSource`],
//! so tests can drive it with a [`ChannelSource`] instead of the real
//! filesystem.

use async_trait::async_trait;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Extensions accepted by the detection trigger.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "tiff", "tif", "bmp", "webp"];

/// Prefix camera apps use while a file is still being written.
const PENDING_PREFIX: &str = ".pending-";

/// Stream of newly arrived files.
#[async_trait]
pub trait FileEventSource: Send {
    /// Wait for the next arrived file. `None` means the source is closed.
    async fn next_event(&mut self) -> Option<PathBuf>;
}

/// Whether `path` names an image the pipeline should pick up.
pub fn is_image_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with(PENDING_PREFIX) {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Extract the arrived image from a raw notify event, if any.
///
/// Only creations and rename targets count. Writes to existing files are
/// ignored so that an image being filled in is reported once. Backends that
/// pair a rename with a separate `To` event also send `Both`; only `To` is
/// used so the file is not queued twice.
pub fn arrived_path(event: &Event) -> Option<PathBuf> {
    let path = match event.kind {
        EventKind::Create(_) => event.paths.first(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.first(),
        // FSEvents does not say which side of the rename a path is
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            event.paths.first().filter(|path| path.exists())
        }
        _ => None,
    }?;
    is_image_file(path).then(|| path.clone())
}

/// Watches one directory (non-recursively) using the platform backend.
pub struct DirectoryWatcher {
    receiver: mpsc::Receiver<PathBuf>,
    /// Handle to the watcher (kept alive)
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    pub fn new(dir: &Path) -> Result<Self, notify::Error> {
        let (tx, receiver) = mpsc::channel::<PathBuf>(100);

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(path) = arrived_path(&event) {
                        // Receiver gone means the watcher is being dropped
                        let _ = tx.blocking_send(path);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "File watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %dir.display(), "Directory watcher started");
        Ok(Self {
            receiver,
            _watcher: watcher,
        })
    }
}

#[async_trait]
impl FileEventSource for DirectoryWatcher {
    async fn next_event(&mut self) -> Option<PathBuf> {
        self.receiver.recv().await
    }
}

/// In-memory event source fed through an mpsc sender.
pub struct ChannelSource {
    receiver: mpsc::Receiver<PathBuf>,
}

impl ChannelSource {
    pub fn new(buffer: usize) -> (mpsc::Sender<PathBuf>, Self) {
        let (tx, receiver) = mpsc::channel(buffer.max(1));
        (tx, Self { receiver })
    }
}

#[async_trait]
impl FileEventSource for ChannelSource {
    async fn next_event(&mut self) -> Option<PathBuf> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("/in/IMG_0001.jpg")));
        assert!(is_image_file(Path::new("/in/IMG_0001.JPEG")));
        assert!(is_image_file(Path::new("scan.tif")));
        assert!(is_image_file(Path::new("shot.webp")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("warm.cube")));
        assert!(!is_image_file(Path::new("/in/jpg")));
    }

    #[test]
    fn test_pending_files_ignored() {
        assert!(!is_image_file(Path::new("/in/.pending-1700000000-IMG.jpg")));
    }

    #[test]
    fn test_create_event_reports_path() {
        let e = event(EventKind::Create(CreateKind::File), &["/in/a.jpg"]);
        assert_eq!(arrived_path(&e), Some(PathBuf::from("/in/a.jpg")));
    }

    #[test]
    fn test_rename_any_requires_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.jpg");
        std::fs::write(&present, b"x").unwrap();

        let kind = EventKind::Modify(ModifyKind::Name(RenameMode::Any));
        let e = event(kind, &[present.to_str().unwrap()]);
        assert_eq!(arrived_path(&e), Some(present));

        let e = event(kind, &["/nonexistent/gone.jpg"]);
        assert_eq!(arrived_path(&e), None);
    }

    #[test]
    fn test_rename_to_reports_path() {
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/in/b.png"],
        );
        assert_eq!(arrived_path(&e), Some(PathBuf::from("/in/b.png")));
    }

    #[test]
    fn test_other_events_ignored() {
        let cases = [
            event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/in/a.jpg"],
            ),
            event(
                EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &["/in/a.jpg"],
            ),
            event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/in/.pending-a.jpg", "/in/a.jpg"],
            ),
            event(EventKind::Access(AccessKind::Any), &["/in/a.jpg"]),
            event(EventKind::Create(CreateKind::File), &["/in/a.txt"]),
        ];
        for e in &cases {
            assert_eq!(arrived_path(e), None, "{:?}", e.kind);
        }
    }

    #[tokio::test]
    async fn test_channel_source_delivers_in_order() {
        let (tx, mut source) = ChannelSource::new(4);
        tx.send(PathBuf::from("/in/1.jpg")).await.unwrap();
        tx.send(PathBuf::from("/in/2.jpg")).await.unwrap();
        drop(tx);

        assert_eq!(source.next_event().await, Some(PathBuf::from("/in/1.jpg")));
        assert_eq!(source.next_event().await, Some(PathBuf::from("/in/2.jpg")));
        assert_eq!(source.next_event().await, None);
    }

    #[test]
    fn test_watcher_missing_directory_fails() {
        assert!(DirectoryWatcher::new(Path::new("/nonexistent/lutwatch/in")).is_err());
    }
}
