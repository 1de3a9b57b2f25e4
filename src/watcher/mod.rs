//! Re-evaluate a source file when it is saved.
//!
//! Uses notify crate for cross-platform file system events.
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

/// Debounce applied by `eval-file --watch`. Editors often save in bursts.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(200);

/// Watches one source file and reports debounced saves.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    dir: PathBuf,
    file: PathBuf,
    file_name: Option<OsString>,
    debounce: Duration,
    dirty_since: Option<Instant>,
}

impl SourceWatcher {
    /// Start watching `path`.
    ///
    /// The parent directory is watched rather than the file, so editors
    /// that save by rename-and-replace are still noticed.
    ///
    /// # Errors
    /// Returns an error if the watcher cannot be created or the directory
    /// cannot be watched.
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> notify::Result<Self> {
        // Event paths arrive canonical.
        let file = path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        let file_name = file.file_name().map(std::ffi::OsStr::to_os_string);
        let dir = parent_dir(&file);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(file = %file.display(), dir = %dir.display(), "watching source");

        Ok(Self {
            _watcher: watcher,
            rx,
            dir,
            file,
            file_name,
            debounce,
            dirty_since: None,
        })
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Drain pending events; true once a save has settled for the debounce.
    pub fn poll_saved(&mut self) -> bool {
        let mut touched = false;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(ev) if self.concerns_file(&ev) => touched = true,
                Ok(ev) => tracing::trace!(kind = ?ev.kind, paths = ?ev.paths, "ignored fs event"),
                Err(err) => tracing::warn!(%err, "file watch error"),
            }
        }

        if touched {
            self.dirty_since = Some(Instant::now());
        }
        match self.dirty_since {
            Some(since) if since.elapsed() >= self.debounce => {
                self.dirty_since = None;
                true
            }
            _ => false,
        }
    }

    fn concerns_file(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.dir
                || path == &self.file
                || self
                    .file_name
                    .as_ref()
                    .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
        })
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
