//! Queue tuning constants and progress bounds.
//!
//! Pure values shared by the store and the worker binary. Intervals are
//! defaults only; the worker reads overrides from the environment.

/// Lowest reportable progress value.
pub const PROGRESS_MIN: i32 = 0;

/// Highest reportable progress value. `complete` forces this.
pub const PROGRESS_MAX: i32 = 100;

/// Seconds between claim polls when the queue is empty.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Seconds between staleness sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Age after which a `running` job is treated as abandoned by a dead
/// worker and returned to the queue.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 30 * 60;

/// Whether a reported progress value is within the allowed range.
pub fn progress_in_range(progress: i32) -> bool {
    (PROGRESS_MIN..=PROGRESS_MAX).contains(&progress)
}
