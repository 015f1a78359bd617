//! File watching for live reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

const DEBOUNCE: Duration = Duration::from_millis(100);

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File was created
    Created(PathBuf),

    /// File contents or metadata changed
    Modified(PathBuf),

    /// File was deleted
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(path) | WatchEvent::Modified(path) | WatchEvent::Removed(path) => {
                path
            }
        }
    }
}

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch the given directories recursively. Missing directories are skipped.
    ///
    /// Returns the watcher and a channel to receive events. Events for a path
    /// are held until it has been quiet for 100ms, then the latest is sent.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            } else {
                tracing::debug!("Not watching missing directory {}", path.display());
            }
        }

        std::thread::spawn(move || {
            let mut pending = Debouncer::new(DEBOUNCE);

            loop {
                let received = match pending.next_deadline(Instant::now()) {
                    Some(wait) => sync_rx.recv_timeout(wait),
                    None => sync_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };

                match received {
                    Ok(event) => {
                        let now = Instant::now();
                        for path in &event.paths {
                            if let Some(e) = classify_event(path, &event.kind) {
                                pending.push(e, now);
                            }
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                }

                for e in pending.take_due(Instant::now()) {
                    if async_tx.blocking_send(e).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Per-path trailing-edge debounce.
struct Debouncer {
    quiet: Duration,
    pending: HashMap<PathBuf, (WatchEvent, Instant)>,
}

impl Debouncer {
    fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: HashMap::new(),
        }
    }

    /// Record an event, replacing any pending one for the same path.
    fn push(&mut self, event: WatchEvent, at: Instant) {
        self.pending.insert(event.path().to_path_buf(), (event, at));
    }

    /// Time until the next pending path goes quiet.
    fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.pending
            .values()
            .map(|(_, at)| (*at + self.quiet).saturating_duration_since(now))
            .min()
    }

    /// Remove and return the events whose path has been quiet long enough,
    /// oldest first.
    fn take_due(&mut self, now: Instant) -> Vec<WatchEvent> {
        let due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (_, at))| now.saturating_duration_since(*at) >= self.quiet)
            .map(|(path, _)| path.clone())
            .collect();

        let mut events: Vec<(WatchEvent, Instant)> = due
            .iter()
            .filter_map(|path| self.pending.remove(path))
            .collect();
        events.sort_by_key(|(_, at)| *at);
        events.into_iter().map(|(event, _)| event).collect()
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::event::{AccessKind, AccessMode};
    use notify::EventKind;

    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path.to_path_buf())),
        EventKind::Remove(_) => Some(WatchEvent::Removed(path.to_path_buf())),
        EventKind::Modify(_) | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            Some(WatchEvent::Modified(path.to_path_buf()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("style.scss");

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, ".a { color: red; }").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        let event = event.unwrap().expect("channel should not be closed");
        assert!(event.path().ends_with("style.scss"));
    }

    #[test]
    fn classifies_event_kinds() {
        use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind};
        use notify::EventKind;

        let path = Path::new("js/app.js");

        assert_eq!(
            classify_event(path, &EventKind::Create(CreateKind::File)),
            Some(WatchEvent::Created(path.to_path_buf()))
        );
        assert_eq!(
            classify_event(path, &EventKind::Modify(ModifyKind::Any)),
            Some(WatchEvent::Modified(path.to_path_buf()))
        );
        assert_eq!(
            classify_event(path, &EventKind::Remove(RemoveKind::File)),
            Some(WatchEvent::Removed(path.to_path_buf()))
        );
        assert_eq!(
            classify_event(path, &EventKind::Access(AccessKind::Close(AccessMode::Write))),
            Some(WatchEvent::Modified(path.to_path_buf()))
        );
        assert_eq!(
            classify_event(path, &EventKind::Access(AccessKind::Open(AccessMode::Read))),
            None
        );
        assert_eq!(classify_event(path, &EventKind::Any), None);
    }

    #[test]
    fn debounce_emits_latest_event_after_quiet_period() {
        let start = Instant::now();
        let path = PathBuf::from("sass/style.scss");
        let mut pending = Debouncer::new(DEBOUNCE);

        pending.push(WatchEvent::Created(path.clone()), start);
        pending.push(
            WatchEvent::Modified(path.clone()),
            start + Duration::from_millis(60),
        );

        // Still within the quiet period of the second event
        assert!(pending.take_due(start + Duration::from_millis(120)).is_empty());
        assert_eq!(
            pending.next_deadline(start + Duration::from_millis(120)),
            Some(Duration::from_millis(40))
        );

        assert_eq!(
            pending.take_due(start + Duration::from_millis(160)),
            vec![WatchEvent::Modified(path)]
        );
        assert_eq!(pending.next_deadline(start), None);
    }

    #[test]
    fn debounce_tracks_paths_independently() {
        let start = Instant::now();
        let mut pending = Debouncer::new(DEBOUNCE);

        pending.push(WatchEvent::Modified(PathBuf::from("a.js")), start);
        pending.push(
            WatchEvent::Modified(PathBuf::from("b.js")),
            start + Duration::from_millis(50),
        );

        assert_eq!(
            pending.take_due(start + Duration::from_millis(100)),
            vec![WatchEvent::Modified(PathBuf::from("a.js"))]
        );
        assert_eq!(
            pending.take_due(start + Duration::from_millis(150)),
            vec![WatchEvent::Modified(PathBuf::from("b.js"))]
        );
    }

    #[tokio::test]
    async fn rapid_writes_produce_one_event_after_the_last() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("app.js");

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, "first();").unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second_write = Instant::now();
        fs::write(&test_file, "second();").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("timeout waiting for file watch event")
            .expect("channel should not be closed");
        assert!(event.path().ends_with("app.js"));
        assert!(second_write.elapsed() >= DEBOUNCE);

        let extra = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        drop(watcher);
        assert!(extra.is_err(), "unexpected second event: {:?}", extra);
    }

    #[test]
    fn missing_directories_are_skipped() {
        let temp = tempdir().unwrap();
        assert!(FileWatcher::new(&[temp.path().join("absent")]).is_ok());
    }
}
