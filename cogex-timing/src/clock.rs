use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source used to measure reaction times.
///
/// Wall-clock time is never involved: an instant returned by [`Clock::start`]
/// is only meaningful to the same clock's [`Clock::elapsed`].
pub trait Clock {
    type Instant: Copy + Debug;

    /// Marks a stimulus onset.
    fn start(&self) -> Self::Instant;

    /// Time since `since`. Never negative; a source that steps backwards
    /// yields `Duration::ZERO`.
    fn elapsed(&self, since: Self::Instant) -> Duration;
}

/// Observed tick granularity of a clock.
#[derive(Debug, Clone)]
pub struct ClockCalibration {
    pub samples: usize,
    pub resolution: Duration,
    pub jitter_ns: f64,
    pub min_tick: Duration,
    pub max_tick: Duration,
}

impl ClockCalibration {
    pub fn from_ticks(ticks: &[Duration]) -> Self {
        if ticks.is_empty() {
            return Self {
                samples: 0,
                resolution: Duration::ZERO,
                jitter_ns: 0.0,
                min_tick: Duration::ZERO,
                max_tick: Duration::ZERO,
            };
        }
        let ns: Vec<f64> = ticks.iter().map(|d| d.as_nanos() as f64).collect();
        let avg = ns.iter().sum::<f64>() / ns.len() as f64;
        let var = ns.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / ns.len() as f64;
        Self {
            samples: ticks.len(),
            resolution: Duration::from_nanos(avg.round() as u64),
            jitter_ns: var.sqrt(),
            min_tick: ticks.iter().copied().min().unwrap_or_default(),
            max_tick: ticks.iter().copied().max().unwrap_or_default(),
        }
    }

    /// True when the clock resolves well below a millisecond.
    pub fn is_sub_millisecond(&self) -> bool {
        self.samples > 0 && self.max_tick < Duration::from_millis(1)
    }
}

/// [`Clock`] backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    const SPIN_LIMIT: u32 = 1_000_000;

    pub fn new() -> Self {
        Self
    }

    /// Samples `samples` consecutive visible ticks of the clock.
    pub fn calibrate(&self, samples: usize) -> ClockCalibration {
        let mut ticks = Vec::with_capacity(samples);
        for _ in 0..samples {
            let from = Instant::now();
            let mut spins = 0;
            loop {
                let now = Instant::now();
                if now > from {
                    ticks.push(now - from);
                    break;
                }
                spins += 1;
                if spins >= Self::SPIN_LIMIT {
                    break;
                }
            }
        }
        let calibration = ClockCalibration::from_ticks(&ticks);
        tracing::debug!(
            samples = calibration.samples,
            resolution_ns = calibration.resolution.as_nanos() as u64,
            jitter_ns = calibration.jitter_ns,
            "clock calibrated"
        );
        calibration
    }
}

impl Clock for MonotonicClock {
    type Instant = Instant;

    fn start(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: Instant) -> Duration {
        Instant::now().saturating_duration_since(since)
    }
}

/// Manually driven clock for deterministic tests and replays.
///
/// Clones share the same time, so a test can keep a handle while the engine
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Steps the clock backwards, saturating at zero.
    pub fn rewind(&self, d: Duration) {
        let step = d.as_nanos() as u64;
        let _ = self
            .now_ns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(step))
            });
    }

    pub fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    type Instant = u64;

    fn start(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }

    fn elapsed(&self, since: u64) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::SeqCst).saturating_sub(since))
    }
}
