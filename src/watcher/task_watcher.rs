//! Recursive watcher over the tasks directory.
//!
//! Notify events arrive on a debouncer thread; a bridge thread filters them
//! down to conversation files and forwards them to a tokio channel.

use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecursiveMode},
    DebounceEventResult,
};
use tokio::sync::mpsc;

use super::discovery::is_conversation_file;
use super::error::WatcherError;

/// Events emitted by the task watcher.
#[derive(Debug)]
pub enum WatchEvent {
    /// A conversation file was created or written to.
    Changed(PathBuf),
    /// A conversation file was deleted or renamed away.
    Removed(PathBuf),
    /// The underlying watcher reported an error.
    Error(WatcherError),
}

/// Watches a tasks directory recursively for conversation file changes.
pub struct TaskWatcher {
    root: PathBuf,
    stop_tx: std_mpsc::Sender<()>,
    bridge_handle: Option<thread::JoinHandle<()>>,
}

impl TaskWatcher {
    /// Start watching `root` for changes to files named `filename`.
    ///
    /// Events for the same file within `debounce` are merged.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is missing or the file watcher cannot be
    /// created.
    pub fn new(
        root: PathBuf,
        filename: &str,
        debounce: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>), WatcherError> {
        if !root.is_dir() {
            return Err(WatcherError::MissingRoot(root));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let (notify_tx, notify_rx) = std_mpsc::channel();

        let mut debouncer = new_debouncer(debounce, None, move |result| {
            let _ = notify_tx.send(result);
        })?;
        debouncer.watch(&root, RecursiveMode::Recursive)?;

        let filename = filename.to_string();
        let bridge_handle = thread::spawn(move || {
            loop {
                if stop_rx.try_recv().is_ok() {
                    break;
                }

                match notify_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(result) => {
                        if !Self::handle_debounce_result(result, &filename, &event_tx) {
                            break;
                        }
                    }
                    Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                    Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }

            // Keep debouncer alive until thread exits
            drop(debouncer);
        });

        tracing::info!(path = %root.display(), "Watching tasks directory");
        Ok((
            Self {
                root,
                stop_tx,
                bridge_handle: Some(bridge_handle),
            },
            event_rx,
        ))
    }

    /// Forward one debounced batch. Returns `false` once the receiver is gone.
    fn handle_debounce_result(
        result: DebounceEventResult,
        filename: &str,
        event_tx: &mpsc::UnboundedSender<WatchEvent>,
    ) -> bool {
        match result {
            Ok(events) => {
                let mut latest: Vec<(PathBuf, bool)> = Vec::new();
                for event in &events {
                    for path in &event.paths {
                        let Some(present) = classify(&event.kind, path, filename) else {
                            continue;
                        };
                        latest.retain(|(p, _)| p != path);
                        latest.push((path.clone(), present));
                    }
                }
                latest.into_iter().all(|(path, present)| {
                    let event = if present {
                        WatchEvent::Changed(path)
                    } else {
                        WatchEvent::Removed(path)
                    };
                    event_tx.send(event).is_ok()
                })
            }
            Err(errors) => errors
                .into_iter()
                .all(|error| event_tx.send(WatchEvent::Error(WatcherError::Notify(error))).is_ok()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop the bridge thread and release the underlying watcher.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.bridge_handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Watcher bridge thread panicked");
            }
        }
    }
}

impl Drop for TaskWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Map a notify event on `path` to "file present" (`Some(true)`), "file
/// gone" (`Some(false)`), or not of interest (`None`).
fn classify(kind: &EventKind, path: &Path, filename: &str) -> Option<bool> {
    if !is_conversation_file(path, filename) {
        return None;
    }
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) => Some(path.is_file()),
        EventKind::Remove(_) => Some(false),
        _ => None,
    }
}
