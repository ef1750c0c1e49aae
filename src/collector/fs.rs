//! Recursive filesystem watcher built on `notify`.

use crate::collector::types::{FsChange, ProducerError};
use crate::collector::Producer;
use crate::core::{SharedBuffer, StopSignal};
use crossbeam_channel::{select, unbounded};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::PathBuf;

/// Producer that appends `[file+]` / `[file~]` events for a subtree.
pub struct FsWatcher {
    root: PathBuf,
}

impl FsWatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

/// Map a backend event onto the changes we record.
///
/// Renames and access notifications are ignored.
pub fn classify(event: &Event) -> Vec<FsChange> {
    match event.kind {
        EventKind::Create(_) => event.paths.iter().cloned().map(FsChange::Created).collect(),
        EventKind::Modify(ModifyKind::Name(_)) => Vec::new(),
        EventKind::Modify(_) => event.paths.iter().cloned().map(FsChange::Modified).collect(),
        _ => Vec::new(),
    }
}

impl Producer for FsWatcher {
    fn name(&self) -> &'static str {
        "fs-watcher"
    }

    fn run(self: Box<Self>, buffer: SharedBuffer, stop: StopSignal) {
        let (tx, rx) = unbounded::<notify::Result<Event>>();

        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .and_then(|mut watcher| {
            watcher.watch(&self.root, RecursiveMode::Recursive)?;
            Ok(watcher)
        });

        // Held until the loop ends; dropping it unsubscribes.
        let _watcher = match watcher {
            Ok(w) => {
                tracing::info!(root = %self.root.display(), "watching filesystem");
                w
            }
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "file watch unavailable");
                buffer.add(ProducerError::FileWatch(e.to_string()).to_event_text());
                let _ = stop.receiver().recv();
                return;
            }
        };

        loop {
            select! {
                recv(rx) -> msg => match msg {
                    Ok(Ok(event)) => {
                        for change in classify(&event) {
                            buffer.add(change.to_event_text());
                        }
                    }
                    Ok(Err(e)) => buffer.add(ProducerError::FileWatch(e.to_string()).to_event_text()),
                    Err(_) => {
                        let _ = stop.receiver().recv();
                        break;
                    }
                },
                recv(stop.receiver()) -> _ => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TelemetryBuffer;
    use notify::event::{AccessKind, CreateKind, DataChange, RenameMode};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_classify_kinds() {
        let created = event(EventKind::Create(CreateKind::File), "/w/a.rs");
        assert_eq!(
            classify(&created),
            vec![FsChange::Created(PathBuf::from("/w/a.rs"))]
        );

        let modified = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            "/w/a.rs",
        );
        assert_eq!(
            classify(&modified),
            vec![FsChange::Modified(PathBuf::from("/w/a.rs"))]
        );

        let renamed = event(EventKind::Modify(ModifyKind::Name(RenameMode::Both)), "/w/a.rs");
        assert!(classify(&renamed).is_empty());

        let accessed = event(EventKind::Access(AccessKind::Any), "/w/a.rs");
        assert!(classify(&accessed).is_empty());
    }

    #[test]
    fn test_watcher_reports_created_file() {
        let dir = tempfile::tempdir().unwrap();
        let buffer: SharedBuffer = Arc::new(TelemetryBuffer::new(100));
        let stop = StopSignal::new();

        let handle = {
            let buffer = buffer.clone();
            let stop = stop.clone();
            let watcher = Box::new(FsWatcher::new(dir.path()));
            thread::spawn(move || watcher.run(buffer, stop))
        };

        // Give the backend time to subscribe.
        thread::sleep(Duration::from_millis(300));
        std::fs::write(dir.path().join("notes.md"), "hello").unwrap();

        let mut seen = false;
        for _ in 0..100 {
            if buffer
                .snapshot_all()
                .iter()
                .any(|l| l.contains("[file+]") && l.contains("notes.md"))
            {
                seen = true;
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }

        stop.cancel();
        handle.join().unwrap();
        assert!(seen, "created file not observed");
    }

    #[test]
    fn test_missing_root_is_reported() {
        let buffer: SharedBuffer = Arc::new(TelemetryBuffer::new(10));
        let stop = StopSignal::new();
        stop.cancel();

        Box::new(FsWatcher::new("/definitely/not/here/cta")).run(buffer.clone(), stop);

        let lines = buffer.snapshot_all();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[file] ERROR"));
    }
}
