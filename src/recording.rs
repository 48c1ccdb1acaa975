//! Fire-and-forget access recording
//!
//! Search callers must never stall on storage I/O just to note that a chunk
//! was retrieved. Recording is submitted to a bounded background worker; when
//! the queue is full or the worker is gone, the caller records inline (the
//! store already swallows recording errors). The caller never awaits
//! completion and recording failures are never surfaced to it.

use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::constants::RECORDING_QUEUE_CAPACITY;
use crate::memory::storage::GravityStore;
use crate::memory::types::{AccessKind, LineRange};

/// One pending recording.
#[derive(Debug)]
pub struct AccessEvent {
    pub path: String,
    pub lines: LineRange,
    pub kind: AccessKind,
    pub query: Option<String>,
    pub score: Option<f64>,
    pub context: Option<String>,
}

impl AccessEvent {
    fn apply(&self, store: &GravityStore) {
        store.record_access(
            &self.path,
            self.lines,
            self.kind,
            self.query.as_deref(),
            self.score,
            self.context.as_deref(),
        );
    }
}

/// Bounded background worker draining access recordings.
pub struct AccessRecorder {
    store: Arc<GravityStore>,
    tx: Option<SyncSender<AccessEvent>>,
    handle: Option<JoinHandle<()>>,
}

impl AccessRecorder {
    /// Spawn the worker thread with the default queue capacity.
    pub fn spawn(store: Arc<GravityStore>) -> Self {
        Self::spawn_with_capacity(store, RECORDING_QUEUE_CAPACITY)
    }

    pub fn spawn_with_capacity(store: Arc<GravityStore>, capacity: usize) -> Self {
        let (tx, rx) = sync_channel::<AccessEvent>(capacity);
        let worker_store = Arc::clone(&store);
        let handle = std::thread::Builder::new()
            .name("gravity-recorder".to_string())
            .spawn(move || {
                for event in rx {
                    event.apply(&worker_store);
                }
                debug!("access recorder drained and stopped");
            });
        match handle {
            Ok(handle) => Self {
                store,
                tx: Some(tx),
                handle: Some(handle),
            },
            Err(err) => {
                // No worker available; every submission executes inline
                warn!(%err, "could not spawn recorder thread, recording inline");
                Self {
                    store,
                    tx: None,
                    handle: None,
                }
            }
        }
    }

    /// Submit without blocking; executes inline when no worker can take it.
    pub fn submit(&self, event: AccessEvent) {
        match &self.tx {
            Some(tx) => match tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) | Err(TrySendError::Disconnected(event)) => {
                    event.apply(&self.store);
                }
            },
            None => event.apply(&self.store),
        }
    }

    /// Stop accepting events and wait for the queue to drain.
    pub fn shutdown(mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("recorder thread panicked during shutdown");
            }
        }
    }
}

impl Drop for AccessRecorder {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringParams;
    use tempfile::TempDir;

    fn store() -> (Arc<GravityStore>, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let store = GravityStore::open(dir.path().join("gravity.db"), ScoringParams::default(), 90)
            .expect("open store");
        (Arc::new(store), dir)
    }

    fn event(path: &str) -> AccessEvent {
        AccessEvent {
            path: path.to_string(),
            lines: LineRange::WHOLE_FILE,
            kind: AccessKind::Read,
            query: None,
            score: None,
            context: None,
        }
    }

    #[test]
    fn test_events_recorded_after_shutdown() {
        let (store, _dir) = store();
        let recorder = AccessRecorder::spawn(Arc::clone(&store));
        for _ in 0..5 {
            recorder.submit(event("notes/a.md"));
        }
        recorder.shutdown();

        let record = store
            .get("notes/a.md", LineRange::WHOLE_FILE)
            .expect("get")
            .expect("record exists");
        assert_eq!(record.access_count, 5);
    }

    #[test]
    fn test_full_queue_falls_back_inline() {
        let (store, _dir) = store();
        // Zero-capacity queue: rendezvous channel, try_send fails whenever the
        // worker is mid-write, forcing the inline path regularly
        let recorder = AccessRecorder::spawn_with_capacity(Arc::clone(&store), 0);
        for _ in 0..10 {
            recorder.submit(event("notes/b.md"));
        }
        recorder.shutdown();

        let record = store
            .get("notes/b.md", LineRange::WHOLE_FILE)
            .expect("get")
            .expect("record exists");
        assert_eq!(record.access_count, 10);
    }
}
