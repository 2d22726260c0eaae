//! Progress tracking for pipeline runs.

use crate::core::types::TileCoord;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A progress update event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// The run has started.
    Started {
        total_tiles: usize,
    },
    /// A tile was resized and staged.
    TileStaged {
        coord: TileCoord,
        duration_ms: u64,
        index: usize,
        total: usize,
    },
    /// Overall staging progress.
    Progress {
        percent: f32,
        elapsed_ms: u64,
        estimated_remaining_ms: Option<u64>,
    },
    /// All tiles are staged and the canvas is being drawn.
    Composing {
        tiles: usize,
    },
    /// The run has completed.
    Completed {
        total_duration_ms: u64,
        tiles_processed: usize,
    },
    /// The run was cancelled.
    Cancelled,
    /// The run failed.
    Error {
        coord: Option<TileCoord>,
        message: String,
    },
}

/// Callback type for progress updates.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Shared flag used to stop a run early.
///
/// Clones share the flag, so a handle taken from a pipeline can be moved to
/// another thread and cancel the run in flight. The flag stays set until
/// [`reset`](Self::reset) is called.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Create a handle that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear a previous cancellation request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Tracks the progress of one run and allows cancellation.
pub struct ProgressTracker {
    /// Total number of tiles to stage.
    total_tiles: usize,
    /// Number of tiles staged so far.
    completed_tiles: AtomicUsize,
    /// Cancellation flag, possibly shared with the caller.
    cancel: CancelHandle,
    /// Start time.
    start_time: Option<Instant>,
    /// Progress callback.
    callback: Option<ProgressCallback>,
    /// Per-tile durations for estimation.
    tile_times: parking_lot::Mutex<Vec<u64>>,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new(total_tiles: usize) -> Self {
        Self {
            total_tiles,
            completed_tiles: AtomicUsize::new(0),
            cancel: CancelHandle::new(),
            start_time: None,
            callback: None,
            tile_times: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Set a callback for progress updates.
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Use an existing cancellation flag.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Start tracking.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.send_update(ProgressUpdate::Started {
            total_tiles: self.total_tiles,
        });
    }

    /// Report that a tile has been staged.
    pub fn tile_staged(&self, coord: TileCoord, duration_ms: u64) {
        let completed = self.completed_tiles.fetch_add(1, Ordering::Relaxed) + 1;
        self.tile_times.lock().push(duration_ms);

        self.send_update(ProgressUpdate::TileStaged {
            coord,
            duration_ms,
            index: completed,
            total: self.total_tiles,
        });
        self.send_progress_update();
    }

    /// Report that composition has begun.
    pub fn composing(&self) {
        self.send_update(ProgressUpdate::Composing {
            tiles: self.total_tiles,
        });
    }

    /// Number of tiles staged so far.
    pub fn completed_tiles(&self) -> usize {
        self.completed_tiles.load(Ordering::Relaxed)
    }

    /// Total number of tiles in the run.
    pub fn total_tiles(&self) -> usize {
        self.total_tiles
    }

    /// Check if the run should stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.send_update(ProgressUpdate::Cancelled);
    }

    /// Report that the run stopped because of a cancellation request.
    pub fn report_cancelled(&self) {
        self.send_update(ProgressUpdate::Cancelled);
    }

    /// Report an error.
    pub fn report_error(&self, coord: Option<TileCoord>, message: String) {
        self.send_update(ProgressUpdate::Error { coord, message });
    }

    /// Milliseconds since [`start`](Self::start).
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    /// Complete tracking.
    pub fn complete(&self) {
        self.send_update(ProgressUpdate::Completed {
            total_duration_ms: self.elapsed_ms(),
            tiles_processed: self.completed_tiles(),
        });
    }

    /// Get current progress percentage.
    pub fn progress_percent(&self) -> f32 {
        if self.total_tiles == 0 {
            return 100.0;
        }
        (self.completed_tiles() as f32 / self.total_tiles as f32) * 100.0
    }

    /// Estimate remaining time in milliseconds.
    ///
    /// Based on the mean tile duration, so it overestimates when tiles are
    /// staged in parallel.
    pub fn estimated_remaining_ms(&self) -> Option<u64> {
        let times = self.tile_times.lock();
        if times.is_empty() {
            return None;
        }

        let avg_time: u64 = times.iter().sum::<u64>() / times.len() as u64;
        let remaining = self.total_tiles.saturating_sub(self.completed_tiles());

        Some(avg_time * remaining as u64)
    }

    fn send_update(&self, update: ProgressUpdate) {
        if let Some(ref callback) = self.callback {
            callback(update);
        }
    }

    fn send_progress_update(&self) {
        self.send_update(ProgressUpdate::Progress {
            percent: self.progress_percent(),
            elapsed_ms: self.elapsed_ms(),
            estimated_remaining_ms: self.estimated_remaining_ms(),
        });
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording() -> (ProgressCallback, Arc<Mutex<Vec<ProgressUpdate>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: ProgressCallback = Arc::new(move |update| sink.lock().push(update));
        (callback, events)
    }

    #[test]
    fn test_progress_calculation() {
        let tracker = ProgressTracker::new(10);
        assert_eq!(tracker.progress_percent(), 0.0);

        tracker.completed_tiles.store(5, Ordering::Relaxed);
        assert_eq!(tracker.progress_percent(), 50.0);

        assert_eq!(ProgressTracker::new(0).progress_percent(), 100.0);
    }

    #[test]
    fn test_cancellation_shared_with_handle() {
        let handle = CancelHandle::new();
        let tracker = ProgressTracker::new(10).with_cancel_handle(handle.clone());
        assert!(!tracker.is_cancelled());

        handle.cancel();
        assert!(tracker.is_cancelled());

        handle.reset();
        assert!(!tracker.is_cancelled());

        tracker.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_event_sequence() {
        let (callback, events) = recording();
        let mut tracker = ProgressTracker::new(2).with_callback(callback);

        tracker.start();
        tracker.tile_staged(TileCoord::new(0, 0), 4);
        tracker.tile_staged(TileCoord::new(1, 0), 6);
        tracker.composing();
        tracker.complete();

        let events = events.lock();
        assert_eq!(events[0], ProgressUpdate::Started { total_tiles: 2 });
        assert!(matches!(
            events[1],
            ProgressUpdate::TileStaged { index: 1, total: 2, duration_ms: 4, .. }
        ));
        assert!(matches!(
            events[4],
            ProgressUpdate::Progress { percent, estimated_remaining_ms: Some(0), .. } if percent == 100.0
        ));
        assert_eq!(events[5], ProgressUpdate::Composing { tiles: 2 });
        assert!(matches!(
            events[6],
            ProgressUpdate::Completed { tiles_processed: 2, .. }
        ));
    }

    #[test]
    fn test_estimate_uses_mean_duration() {
        let tracker = ProgressTracker::new(5);
        assert_eq!(tracker.estimated_remaining_ms(), None);

        tracker.tile_staged(TileCoord::new(0, 0), 10);
        tracker.tile_staged(TileCoord::new(1, 0), 30);
        assert_eq!(tracker.estimated_remaining_ms(), Some(60));
    }
}
