//! Integration tests for the rotation sweep scheduler.
//!
//! Uses a paused Tokio clock (`start_paused = true`) so `sleep_until`
//! resolves as soon as the runtime is idle and no real time passes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rollcall_sweep::{SweepConfig, SweepScheduler, spawn_sweeper};
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

fn every_second() -> SweepConfig {
    SweepConfig {
        initial_jitter: Duration::ZERO,
        ..SweepConfig::every(Duration::from_secs(1))
    }
}

// =========================================================================
// Scheduler creation and accessors
// =========================================================================

#[test]
fn test_default_config_is_disabled() {
    let s = SweepScheduler::new(SweepConfig::default());
    assert!(s.is_disabled());
    assert_eq!(s.interval(), None);
}

#[test]
fn test_scheduler_initial_state() {
    let s = SweepScheduler::every(Duration::from_secs(2));
    assert_eq!(s.sweep_count(), 0);
    assert_eq!(s.interval(), Some(Duration::from_secs(2)));
    assert!(!s.is_paused());
    assert_eq!(s.metrics().total_sweeps, 0);
}

// =========================================================================
// Sweep firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_sweep_fires_each_interval() {
    let mut s = SweepScheduler::new(every_second());
    let start = Instant::now();

    for expected in 1..=3 {
        let info = s.wait_for_sweep().await;
        assert_eq!(info.sweep, expected);
        assert!(!info.overrun);
    }
    assert_eq!(Instant::now() - start, Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_initial_jitter_delays_only_first_sweep() {
    let mut s = SweepScheduler::new(SweepConfig {
        initial_jitter: Duration::from_millis(500),
        ..SweepConfig::every(Duration::from_secs(1))
    });
    let start = Instant::now();

    s.wait_for_sweep().await;
    let first = Instant::now() - start;
    assert!(first >= Duration::from_secs(1));
    assert!(first < Duration::from_millis(1_500));

    s.wait_for_sweep().await;
    assert_eq!(Instant::now() - start, first + Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_never_fires() {
    let mut s = SweepScheduler::new(SweepConfig::default());

    let result = tokio::time::timeout(Duration::from_secs(60), s.wait_for_sweep()).await;
    assert!(result.is_err(), "disabled scheduler should pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_late_wakeup_skips_ahead_without_burst() {
    let mut s = SweepScheduler::new(every_second());

    // Miss three deadlines before polling.
    tokio::time::advance(Duration::from_millis(3_500)).await;
    let late = s.wait_for_sweep().await;
    assert!(late.overrun);
    assert_eq!(late.sweeps_skipped, 2);

    // The next sweep is a full interval later, not immediately.
    let resumed = Instant::now();
    let next = s.wait_for_sweep().await;
    assert!(!next.overrun);
    assert_eq!(Instant::now() - resumed, Duration::from_secs(1));
    assert_eq!(s.metrics().total_overruns, 1);
    assert_eq!(s.metrics().total_skipped, 2);
}

// =========================================================================
// Pause / Resume
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_pause_prevents_sweeps() {
    let mut s = SweepScheduler::new(every_second());
    s.wait_for_sweep().await;

    s.pause();
    assert!(s.is_paused());

    let result = tokio::time::timeout(Duration::from_secs(5), s.wait_for_sweep()).await;
    assert!(result.is_err(), "paused scheduler should pend");
}

#[tokio::test(start_paused = true)]
async fn test_resume_schedules_one_interval_from_now() {
    let mut s = SweepScheduler::new(every_second());
    s.pause();
    tokio::time::advance(Duration::from_secs(10)).await;

    s.resume();
    let resumed = Instant::now();
    let info = s.wait_for_sweep().await;

    assert_eq!(info.sweep, 1);
    assert!(!info.overrun, "time spent paused is not an overrun");
    assert_eq!(Instant::now() - resumed, Duration::from_secs(1));
}

#[tokio::test]
async fn test_pause_resume_idempotent() {
    let mut s = SweepScheduler::every(Duration::from_secs(1));

    s.pause();
    s.pause();
    assert!(s.is_paused());

    s.resume();
    s.resume();
    assert!(!s.is_paused());
}

// =========================================================================
// Metrics
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_record_sweep_end_accumulates_rotations() {
    let mut s = SweepScheduler::new(every_second());

    s.wait_for_sweep().await;
    s.record_sweep_end(3);
    s.wait_for_sweep().await;
    s.record_sweep_end(0);

    let m = s.metrics();
    assert_eq!(m.total_sweeps, 2);
    assert_eq!(m.total_rotated, 3);
}

#[test]
fn test_record_sweep_end_without_sweep_only_counts_rotations() {
    let mut s = SweepScheduler::every(Duration::from_secs(1));

    s.record_sweep_end(1);

    assert_eq!(s.metrics().total_rotated, 1);
    assert_eq!(s.metrics().max_sweep_time, Duration::ZERO);
}

// =========================================================================
// Background task
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_spawn_sweeper_calls_sweep_until_stopped() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let handle = spawn_sweeper(every_second(), move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            2
        }
    });

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    let metrics = handle.stop().await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(metrics.total_sweeps, 3);
    assert_eq!(metrics.total_rotated, 6);
}

#[tokio::test(start_paused = true)]
async fn test_spawn_sweeper_disabled_never_calls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let handle = spawn_sweeper(SweepConfig::default(), move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        }
    });

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!handle.is_finished());
    let metrics = handle.stop().await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(metrics.total_sweeps, 0);
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_handle_pause_stops_calls_until_resumed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let handle = spawn_sweeper(every_second(), move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        }
    });

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    handle.pause();
    handle.pause();
    assert!(handle.is_paused());
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1, "no sweeps while paused");

    handle.resume();
    assert!(!handle.is_paused());
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let metrics = handle.stop().await;
    assert_eq!(metrics.total_sweeps, 2);
}
