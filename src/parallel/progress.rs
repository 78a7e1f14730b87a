//! Progress tracking for parallel operations

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

/// Thread-safe progress tracker for a dispatcher run.
///
/// Counters here feed progress display and instrumentation only; final run
/// statistics are reduced from task outcomes after the join.
pub struct ProgressTracker {
    sender: broadcast::Sender<ProgressUpdate>,
    total: AtomicUsize,
    completed: AtomicUsize,
    skipped: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Point-in-time view of the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub total: usize,
    pub completed: usize,
    pub skipped: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

impl ProgressState {
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed + self.skipped) as f64 / self.total as f64 * 100.0
    }
}

/// Progress update event
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    Started {
        total: usize,
    },
    FileStarted {
        path: PathBuf,
    },
    FileSkipped {
        path: PathBuf,
    },
    FileCompleted {
        path: PathBuf,
        processing_time: Duration,
    },
    Finished {
        state: ProgressState,
    },
}

impl ProgressTracker {
    /// Create a new progress tracker
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);

        Self {
            sender,
            total: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Receive progress events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    /// Reset counters for a new run
    pub fn start(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.skipped.store(0, Ordering::SeqCst);
        self.in_flight.store(0, Ordering::SeqCst);
        self.peak_in_flight.store(0, Ordering::SeqCst);

        let _ = self.sender.send(ProgressUpdate::Started { total });
    }

    /// Mark a file as entering the letterbox+encode stage.
    ///
    /// The returned guard holds the file in the in-flight gauge until it is
    /// completed or dropped.
    pub fn begin_file(self: &Arc<Self>, path: &Path) -> InFlightGuard {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let _ = self.sender.send(ProgressUpdate::FileStarted {
            path: path.to_path_buf(),
        });

        InFlightGuard {
            tracker: Arc::clone(self),
            path: path.to_path_buf(),
        }
    }

    /// Mark a file as skipped
    pub fn skip_file(&self, path: &Path) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(ProgressUpdate::FileSkipped {
            path: path.to_path_buf(),
        });
    }

    /// Announce the end of the run
    pub fn finish(&self) {
        let state = self.state();
        debug!("Progress finished: {:?}", state);
        let _ = self.sender.send(ProgressUpdate::Finished { state });
    }

    /// Get current state
    pub fn state(&self) -> ProgressState {
        ProgressState {
            total: self.total.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
        }
    }

    /// Highest number of files ever in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps one file counted as in flight
pub struct InFlightGuard {
    tracker: Arc<ProgressTracker>,
    path: PathBuf,
}

impl InFlightGuard {
    /// Count the file as completed
    pub fn complete(self, processing_time: Duration) {
        self.tracker.completed.fetch_add(1, Ordering::SeqCst);
        let _ = self.tracker.sender.send(ProgressUpdate::FileCompleted {
            path: self.path.clone(),
            processing_time,
        });
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_gauge_and_peak() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.start(3);

        let a = tracker.begin_file(Path::new("a.jpg"));
        let b = tracker.begin_file(Path::new("b.jpg"));
        assert_eq!(tracker.state().in_flight, 2);

        a.complete(Duration::from_millis(5));
        drop(b);
        let c = tracker.begin_file(Path::new("c.jpg"));
        c.complete(Duration::from_millis(5));

        let state = tracker.state();
        assert_eq!(state.in_flight, 0);
        assert_eq!(state.peak_in_flight, 2);
        assert_eq!(state.completed, 2);
    }

    #[test]
    fn test_completion_percentage() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.start(4);
        tracker.skip_file(Path::new("a.jpg"));
        tracker.begin_file(Path::new("b.jpg")).complete(Duration::ZERO);

        assert!((tracker.state().completion_percentage() - 50.0).abs() < f64::EPSILON);
        assert_eq!(ProgressState {
            total: 0,
            completed: 0,
            skipped: 0,
            in_flight: 0,
            peak_in_flight: 0,
        }
        .completion_percentage(), 100.0);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let tracker = Arc::new(ProgressTracker::new());
        let mut rx = tracker.subscribe();

        tracker.start(1);
        tracker.skip_file(Path::new("a.jpg"));
        tracker.finish();

        assert!(matches!(rx.recv().await.unwrap(), ProgressUpdate::Started { total: 1 }));
        assert!(matches!(rx.recv().await.unwrap(), ProgressUpdate::FileSkipped { .. }));
        match rx.recv().await.unwrap() {
            ProgressUpdate::Finished { state } => assert_eq!(state.skipped, 1),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
