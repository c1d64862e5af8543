//! Periodic sweep scheduler for Rollcall.
//!
//! Tokens rotate lazily: `get_token` replaces an expired token when the
//! teacher's screen asks for it. A screen that polls slower than the token
//! lifetime would then show a dead code between polls. The sweep closes
//! that gap by rotating every expired token on a fixed interval.
//!
//! # Disabled mode
//!
//! When `interval` is `None`, [`SweepScheduler::wait_for_sweep`] pends
//! forever and tokens only rotate on demand.
//!
//! # Integration
//!
//! [`spawn_sweeper`] runs the loop on its own task:
//!
//! ```ignore
//! let engine = Arc::clone(&engine);
//! let sweeper = spawn_sweeper(SweepConfig::every(Duration::from_secs(1)), move || {
//!     let engine = Arc::clone(&engine);
//!     async move { engine.rotate_expired().await }
//! });
//! // ...
//! let metrics = sweeper.stop().await;
//! ```
//!
//! Or drive a [`SweepScheduler`] yourself inside a `tokio::select!` loop.

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Full configuration for the sweep scheduler.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweeps. `None` = disabled (sweep never fires).
    ///
    /// With a sweep running, an expired token is replaced shortly after its
    /// deadline, so a student who submits it sees `InvalidToken` instead of
    /// `TokenExpired`.
    pub interval: Option<Duration>,
    /// Random delay (0–max) added to the *first* sweep so several servers
    /// started together don't sweep in lockstep.
    pub initial_jitter: Duration,
    /// Warn when one sweep takes longer than this fraction of the interval.
    /// Default: 0.5.
    pub slow_sweep_threshold: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: None,
            initial_jitter: Duration::from_millis(100),
            slow_sweep_threshold: 0.5,
        }
    }
}

impl SweepConfig {
    /// Shortest interval allowed. Sweeping faster than this only burns
    /// lock acquisitions.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

    /// A config that sweeps every `interval`.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Default::default()
        }
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`SweepScheduler::new`]. Rules:
    /// - `interval` raised to [`Self::MIN_INTERVAL`] if shorter (`None` stays `None`).
    /// - `slow_sweep_threshold` clamped to `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if let Some(interval) = self.interval {
            if interval < Self::MIN_INTERVAL {
                warn!(
                    requested_ms = interval.as_millis() as u64,
                    min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                    "sweep interval below minimum — raising"
                );
                self.interval = Some(Self::MIN_INTERVAL);
            }
        }
        self.slow_sweep_threshold = self.slow_sweep_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Sweep info (returned to caller each sweep)
// ---------------------------------------------------------------------------

/// Information about a due sweep, returned by [`SweepScheduler::wait_for_sweep`].
#[derive(Debug, Clone)]
pub struct SweepInfo {
    /// Monotonically increasing sweep number (starts at 1).
    pub sweep: u64,
    /// `true` if this sweep fired late (more than 10% of the interval).
    pub overrun: bool,
    /// How many whole intervals were skipped because of the delay.
    pub sweeps_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime metrics for the sweep scheduler.
#[derive(Debug, Clone, Default)]
pub struct SweepMetrics {
    /// Sweeps executed.
    pub total_sweeps: u64,
    /// Tokens rotated across all sweeps, as reported to
    /// [`SweepScheduler::record_sweep_end`].
    pub total_rotated: u64,
    /// Sweeps that fired late.
    pub total_overruns: u64,
    /// Intervals skipped after late wake-ups.
    pub total_skipped: u64,
    /// Longest single sweep observed.
    pub max_sweep_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval sweep scheduler.
///
/// Late wake-ups never cause a burst: the next sweep is always scheduled
/// one interval after the moment this one actually fired.
pub struct SweepScheduler {
    config: SweepConfig,
    sweep_count: u64,
    /// When the next sweep should fire (Tokio instant for `sleep_until`).
    next_sweep: Option<TokioInstant>,
    /// Wall-clock instant the current sweep started.
    /// Set by `wait_for_sweep`, consumed by `record_sweep_end`.
    sweep_start: Option<Instant>,
    paused: bool,
    metrics: SweepMetrics,
}

impl SweepScheduler {
    /// Create a new scheduler from config.
    pub fn new(config: SweepConfig) -> Self {
        let config = config.validated();

        let next_sweep = config.interval.map(|d| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max = config.initial_jitter.as_micros() as u64;
                Duration::from_micros(rand::rng().random_range(0..max))
            };
            TokioInstant::now() + d + jitter
        });

        match config.interval {
            None => debug!("sweep scheduler created in disabled mode"),
            Some(interval) => debug!(
                interval_ms = interval.as_millis() as u64,
                "sweep scheduler created"
            ),
        }

        Self {
            config,
            sweep_count: 0,
            next_sweep,
            sweep_start: None,
            paused: false,
            metrics: SweepMetrics::default(),
        }
    }

    /// Create a scheduler that sweeps every `interval`.
    pub fn every(interval: Duration) -> Self {
        Self::new(SweepConfig::every(interval))
    }

    /// Wait until the next sweep is due.
    ///
    /// When disabled or paused, this future pends forever; `tokio::select!`
    /// will still process other branches.
    pub async fn wait_for_sweep(&mut self) -> SweepInfo {
        let (next, interval) = match (self.next_sweep, self.config.interval) {
            (Some(next), Some(interval)) if !self.paused => (next, interval),
            _ => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.sweep_count += 1;
        self.sweep_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let mut sweeps_skipped = 0u64;
        if overrun {
            sweeps_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
            self.metrics.total_overruns += 1;
            if sweeps_skipped > 0 {
                warn!(
                    sweep = self.sweep_count,
                    skipped = sweeps_skipped,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "sweep fired late — skipping ahead"
                );
            }
        }
        self.metrics.total_skipped += sweeps_skipped;
        self.metrics.total_sweeps += 1;

        // Always schedule from now, not from the missed deadline.
        self.next_sweep = Some(now + interval);

        trace!(sweep = self.sweep_count, overrun, "sweep due");

        SweepInfo {
            sweep: self.sweep_count,
            overrun,
            sweeps_skipped,
        }
    }

    /// Record that the current sweep finished after rotating `rotated`
    /// tokens.
    pub fn record_sweep_end(&mut self, rotated: usize) {
        self.metrics.total_rotated += rotated as u64;
        if rotated > 0 {
            debug!(sweep = self.sweep_count, rotated, "sweep rotated tokens");
        }

        let Some(start) = self.sweep_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        if elapsed > self.metrics.max_sweep_time {
            self.metrics.max_sweep_time = elapsed;
        }

        if let Some(interval) = self.config.interval {
            let utilization = elapsed.as_secs_f64() / interval.as_secs_f64();
            if utilization >= self.config.slow_sweep_threshold {
                warn!(
                    sweep = self.sweep_count,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    interval_ms = interval.as_secs_f64() * 1000.0,
                    "sweep is slow relative to its interval"
                );
            }
        }
    }

    /// Pause sweeping. `wait_for_sweep` will pend until [`resume`](Self::resume) is called.
    ///
    /// Safe to call multiple times (idempotent).
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(sweep = self.sweep_count, "sweep scheduler paused");
        }
    }

    /// Resume sweeping. The next sweep fires one interval from now.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(interval) = self.config.interval {
                self.next_sweep = Some(TokioInstant::now() + interval);
            }
            debug!(sweep = self.sweep_count, "sweep scheduler resumed");
        }
    }

    /// Whether the scheduler is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether sweeping is disabled (no interval configured).
    pub fn is_disabled(&self) -> bool {
        self.config.interval.is_none()
    }

    /// Sweeps fired so far.
    pub fn sweep_count(&self) -> u64 {
        self.sweep_count
    }

    /// Snapshot of current metrics.
    pub fn metrics(&self) -> &SweepMetrics {
        &self.metrics
    }

    /// The configured interval, or `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.config.interval
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// What the owner of a [`SweepHandle`] wants the loop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Pause,
    Stop,
}

/// Handle to a sweep loop started by [`spawn_sweeper`].
pub struct SweepHandle {
    control_tx: watch::Sender<Control>,
    task: JoinHandle<SweepMetrics>,
}

impl SweepHandle {
    /// Suspends sweeping. Idempotent.
    pub fn pause(&self) {
        self.control_tx.send_replace(Control::Pause);
    }

    /// Resumes sweeping; the next sweep fires one interval from now.
    pub fn resume(&self) {
        self.control_tx.send_replace(Control::Run);
    }

    /// Whether [`pause`](Self::pause) is in effect.
    pub fn is_paused(&self) -> bool {
        *self.control_tx.borrow() == Control::Pause
    }

    /// Stops the loop after any in-flight sweep and returns its metrics.
    pub async fn stop(self) -> SweepMetrics {
        self.control_tx.send_replace(Control::Stop);
        match self.task.await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(error = %e, "sweep task ended abnormally");
                SweepMetrics::default()
            }
        }
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns a task that calls `sweep` on every interval until
/// [`SweepHandle::stop`] is called. `sweep` returns how many tokens it
/// rotated.
pub fn spawn_sweeper<F, Fut>(config: SweepConfig, mut sweep: F) -> SweepHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = usize> + Send,
{
    let (control_tx, mut control_rx) = watch::channel(Control::Run);
    let mut scheduler = SweepScheduler::new(config);

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = control_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let control = *control_rx.borrow_and_update();
                    match control {
                        Control::Run => scheduler.resume(),
                        Control::Pause => scheduler.pause(),
                        Control::Stop => break,
                    }
                }
                _ = scheduler.wait_for_sweep() => {
                    let rotated = sweep().await;
                    scheduler.record_sweep_end(rotated);
                }
            }
        }
        debug!(sweeps = scheduler.sweep_count(), "sweep loop stopped");
        scheduler.metrics().clone()
    });

    SweepHandle { control_tx, task }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_raises_tiny_interval() {
        let config = SweepConfig::every(Duration::from_millis(1)).validated();
        assert_eq!(config.interval, Some(SweepConfig::MIN_INTERVAL));
    }

    #[test]
    fn test_validated_keeps_disabled() {
        let config = SweepConfig::default().validated();
        assert!(config.interval.is_none());
    }

    #[test]
    fn test_validated_clamps_threshold() {
        let config = SweepConfig {
            slow_sweep_threshold: 3.0,
            ..SweepConfig::default()
        }
        .validated();
        assert_eq!(config.slow_sweep_threshold, 1.0);
    }
}
