//! Routes watcher events to one worker task per file.
//!
//! Each worker drains its own queue in order and runs the blocking pipeline
//! on the blocking pool, so a path is never scanned twice at once while
//! different paths proceed in parallel.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::pipeline::ChangelogProcessor;
use super::stats::ProcessorStats;
use crate::tracker::TrackerError;
use crate::watcher::WatchEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileJob {
    Scan,
    Forget,
}

/// Per-path worker pool fed by watcher events.
pub struct Dispatcher {
    processor: Arc<ChangelogProcessor>,
    queues: HashMap<PathBuf, mpsc::UnboundedSender<FileJob>>,
    workers: JoinSet<()>,
    cancel: CancellationToken,
}

impl Dispatcher {
    #[must_use]
    pub fn new(processor: Arc<ChangelogProcessor>, cancel: CancellationToken) -> Self {
        Self {
            processor,
            queues: HashMap::new(),
            workers: JoinSet::new(),
            cancel,
        }
    }

    /// Number of paths with a live worker.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.queues.len()
    }

    /// Queue the work for one event. Must be called inside a tokio runtime.
    pub fn dispatch(&mut self, event: WatchEvent) {
        let (path, job) = match event {
            WatchEvent::Changed(path) => (path, FileJob::Scan),
            WatchEvent::Removed(path) => (path, FileJob::Forget),
            WatchEvent::Error(e) => {
                tracing::warn!(error = %e, "File watcher error");
                self.processor.record_error();
                return;
            }
        };

        let queue = match self.queues.remove(&path) {
            Some(queue) if !queue.is_closed() => queue,
            _ => self.spawn_worker(path.clone()),
        };
        if queue.send(job).is_err() {
            tracing::debug!(path = %path.display(), "File worker already stopped");
            return;
        }
        // Dropping the sender after a forget lets the worker exit once idle.
        if job == FileJob::Scan {
            self.queues.insert(path, queue);
        }
    }

    fn spawn_worker(&mut self, path: PathBuf) -> mpsc::UnboundedSender<FileJob> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.workers.spawn(worker(
            Arc::clone(&self.processor),
            path,
            rx,
            self.cancel.clone(),
        ));
        tx
    }

    /// Route events until the channel closes or the token is cancelled, then
    /// wait for the workers and return the final statistics.
    ///
    /// On channel close every queued job still runs. On cancellation only
    /// scans already in progress finish.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<WatchEvent>) -> ProcessorStats {
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Shutdown requested, finishing in-flight scans");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => {
                        tracing::debug!("Event channel closed");
                        break;
                    }
                },
                Some(joined) = self.workers.join_next(), if !self.workers.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "File worker failed");
                        self.processor.record_error();
                    }
                }
            }
        }
        self.shutdown().await
    }

    /// Close every queue and wait for the workers to exit.
    pub async fn shutdown(mut self) -> ProcessorStats {
        self.queues.clear();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "File worker failed");
                self.processor.record_error();
            }
        }
        self.processor.stats()
    }
}

async fn worker(
    processor: Arc<ChangelogProcessor>,
    path: PathBuf,
    mut jobs: mpsc::UnboundedReceiver<FileJob>,
    cancel: CancellationToken,
) {
    while let Some(mut job) = jobs.recv().await {
        // A scan reads everything appended so far, so queued scans collapse.
        while job == FileJob::Scan {
            match jobs.try_recv() {
                Ok(next) => job = next,
                Err(_) => break,
            }
        }

        let processor_for_job = Arc::clone(&processor);
        let path_for_job = path.clone();
        let joined = tokio::task::spawn_blocking(move || match job {
            FileJob::Scan => scan(&processor_for_job, &path_for_job),
            FileJob::Forget => processor_for_job.forget(&path_for_job),
        })
        .await;
        if let Err(e) = joined {
            tracing::error!(path = %path.display(), error = %e, "Scan task failed");
            processor.record_error();
        }

        if cancel.is_cancelled() {
            break;
        }
    }
}

fn scan(processor: &ChangelogProcessor, path: &std::path::Path) {
    match processor.process_file(path) {
        Ok(_) => {}
        Err(TrackerError::FileVanished(_)) => {
            tracing::debug!(path = %path.display(), "File vanished before scan");
            processor.forget(path);
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read file, will retry");
            processor.record_error();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::{ChangelogWriter, RecordSink};
    use crate::config::RoovisionConfig;
    use crate::ledger::Ledger;
    use std::io::Write;
    use tempfile::TempDir;

    fn pair(id: &str, message: &str) -> String {
        format!(
            r#"{{"name":"new_task","input":{{"mode":"code","message":"{message}","todos":""}}}},{{"content":"Subtask {id} completed.\n\nResult:\nok"}},{{"type":"text","text":"<environment_details>"}}"#
        )
    }

    fn setup(dir: &TempDir) -> (Arc<ChangelogProcessor>, ChangelogWriter) {
        let writer = ChangelogWriter::new(dir.path().join("out"));
        let ledger = Ledger::open(dir.path().join("logs"), 1024 * 1024, 3).unwrap();
        let processor = ChangelogProcessor::new(
            &RoovisionConfig::default(),
            ledger,
            Arc::new(writer.clone()) as Arc<dyn RecordSink>,
        );
        (Arc::new(processor), writer)
    }

    fn append(path: &std::path::Path, text: &str) {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_events_for_two_files_are_processed() {
        let dir = TempDir::new().unwrap();
        let (processor, writer) = setup(&dir);
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        append(&a, "[");
        append(&b, "[");
        processor.initialize_file(&a).unwrap();
        processor.initialize_file(&b).unwrap();

        append(&a, &pair("09d0cb0e-5c00-4df2-90cf-f52c4f85bcfc", "one"));
        append(&b, &pair("1a2b3c4d-0000-4abc-8def-0123456789ab", "two"));

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(WatchEvent::Changed(a.clone())).unwrap();
        tx.send(WatchEvent::Changed(b.clone())).unwrap();
        tx.send(WatchEvent::Changed(a.clone())).unwrap();
        drop(tx);

        let dispatcher = Dispatcher::new(Arc::clone(&processor), CancellationToken::new());
        let stats = dispatcher.run(rx).await;

        assert_eq!(stats.changelogs_written, 2);
        assert_eq!(stats.errors, 0);
        assert_eq!(writer.changelog_count(), 2);
    }

    #[tokio::test]
    async fn test_removed_event_forgets_cursor() {
        let dir = TempDir::new().unwrap();
        let (processor, _writer) = setup(&dir);
        let a = dir.path().join("a.json");
        append(&a, "[");
        processor.initialize_file(&a).unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(WatchEvent::Removed(a.clone())).unwrap();
        drop(tx);

        Dispatcher::new(Arc::clone(&processor), CancellationToken::new())
            .run(rx)
            .await;
        assert!(!processor.is_tracked(&a));
    }

    #[tokio::test]
    async fn test_removed_path_releases_worker() {
        let dir = TempDir::new().unwrap();
        let (processor, writer) = setup(&dir);
        let a = dir.path().join("a.json");
        append(&a, "[");
        processor.initialize_file(&a).unwrap();

        let mut dispatcher = Dispatcher::new(Arc::clone(&processor), CancellationToken::new());
        dispatcher.dispatch(WatchEvent::Changed(a.clone()));
        assert_eq!(dispatcher.active_workers(), 1);
        dispatcher.dispatch(WatchEvent::Removed(a.clone()));
        assert_eq!(dispatcher.active_workers(), 0);

        // The worker drains its queue, then exits as its channel is closed.
        let joined = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            dispatcher.workers.join_next(),
        )
        .await
        .unwrap();
        assert!(matches!(joined, Some(Ok(()))));
        assert!(!processor.is_tracked(&a));

        // A later write to the same path gets a fresh worker.
        append(&a, &pair("09d0cb0e-5c00-4df2-90cf-f52c4f85bcfc", "again"));
        dispatcher.dispatch(WatchEvent::Changed(a.clone()));
        assert_eq!(dispatcher.active_workers(), 1);
        let stats = dispatcher.shutdown().await;
        assert_eq!(stats.errors, 0);
        // First sight after a forget only baselines.
        assert!(processor.is_tracked(&a));
        assert_eq!(writer.changelog_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_dispatch() {
        let dir = TempDir::new().unwrap();
        let (processor, _writer) = setup(&dir);
        let cancel = CancellationToken::new();
        let (_tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(Dispatcher::new(processor, cancel.clone()).run(rx));
        cancel.cancel();
        let stats = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats, ProcessorStats::default());
    }

    #[tokio::test]
    async fn test_watcher_error_is_counted() {
        let dir = TempDir::new().unwrap();
        let (processor, _writer) = setup(&dir);
        let mut dispatcher = Dispatcher::new(Arc::clone(&processor), CancellationToken::new());
        dispatcher.dispatch(WatchEvent::Error(crate::watcher::WatcherError::ChannelClosed));
        assert_eq!(dispatcher.active_workers(), 0);
        assert_eq!(dispatcher.shutdown().await.errors, 1);
    }
}
