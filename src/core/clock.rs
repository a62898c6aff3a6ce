//! Engine clock: a calibrated hardware counter with a monotonic fallback.
//!
//! The engine is correct with any monotonic clock; the TSC path is a
//! performance optimization. The clock is created once at startup and
//! owned by the engine context, never by a process-wide singleton.

use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Calibration measured a dead time source: no time elapsed over the
/// calibration window, so neither the hardware counter nor the fallback
/// can produce usable timestamps. Fatal at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockError;

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock calibration measured zero elapsed time")
    }
}

impl std::error::Error for ClockError {}

/// Monotonic tick source with nanosecond conversions.
///
/// On x86_64 the clock calibrates `rdtsc` against [`Instant`] at
/// construction and serves timestamps straight from the counter. When
/// the measured frequency is implausible, or on other architectures,
/// it falls back to `Instant`-based nanoseconds (frequency 1 GHz, so
/// ticks are nanoseconds). A wall clock that does not advance at all
/// fails calibration with [`ClockError`].
#[derive(Debug)]
pub struct Clock {
    anchor: Instant,
    base_ticks: u64,
    ticks_per_sec: u64,
    tsc: bool,
}

impl Clock {
    /// Calibrate with the default window (3 samples x 2 ms).
    pub fn new() -> Result<Self, ClockError> {
        Self::with_calibration(3, Duration::from_millis(2))
    }

    /// Calibrate by sampling the raw counter against wall time.
    pub fn with_calibration(samples: u32, window: Duration) -> Result<Self, ClockError> {
        let anchor = Instant::now();
        let samples = samples.max(1);

        #[cfg(target_arch = "x86_64")]
        if let Some(freq) = calibrate_tsc(samples, window)? {
            debug!(frequency = freq, "calibrated hardware counter");
            return Ok(Self {
                anchor,
                base_ticks: read_tsc(),
                ticks_per_sec: freq,
                tsc: true,
            });
        }

        // Fallback path: the monotonic source must at least advance.
        #[cfg(not(target_arch = "x86_64"))]
        let _ = samples;
        std::thread::sleep(window);
        if anchor.elapsed().as_nanos() == 0 {
            return Err(ClockError);
        }

        debug!("hardware counter unavailable, using monotonic fallback");
        Ok(Self {
            anchor,
            base_ticks: 0,
            ticks_per_sec: NANOS_PER_SEC,
            tsc: false,
        })
    }

    /// Current time in clock ticks since construction.
    pub fn now(&self) -> u64 {
        #[cfg(target_arch = "x86_64")]
        if self.tsc {
            return read_tsc().wrapping_sub(self.base_ticks);
        }

        self.anchor.elapsed().as_nanos() as u64
    }

    /// Current time in nanoseconds since construction.
    pub fn now_nanos(&self) -> u64 {
        self.ticks_to_nanos(self.now())
    }

    pub fn ticks_to_nanos(&self, ticks: u64) -> u64 {
        (ticks as u128 * NANOS_PER_SEC as u128 / self.ticks_per_sec as u128) as u64
    }

    pub fn ticks_to_micros(&self, ticks: u64) -> f64 {
        ticks as f64 / (self.ticks_per_sec as f64 / 1_000_000.0)
    }

    /// Ticks per second of the underlying counter.
    pub fn frequency(&self) -> u64 {
        self.ticks_per_sec
    }

    /// Whether the hardware counter path is active.
    pub fn is_tsc(&self) -> bool {
        self.tsc
    }
}

#[cfg(target_arch = "x86_64")]
fn read_tsc() -> u64 {
    // Safe on every x86_64 CPU this engine targets.
    unsafe { std::arch::x86_64::_rdtsc() }
}

/// `Ok(Some(freq))` when the counter calibrates, `Ok(None)` when it is
/// unusable and the fallback should take over, `Err` when wall time
/// itself never advanced.
#[cfg(target_arch = "x86_64")]
fn calibrate_tsc(samples: u32, window: Duration) -> Result<Option<u64>, ClockError> {
    let mut total: u128 = 0;

    for _ in 0..samples {
        let start_wall = Instant::now();
        let start_tsc = read_tsc();

        std::thread::sleep(window);

        let end_tsc = read_tsc();
        let elapsed = start_wall.elapsed().as_nanos();

        if elapsed == 0 {
            return Err(ClockError);
        }
        if end_tsc <= start_tsc {
            return Ok(None);
        }

        total += (end_tsc - start_tsc) as u128 * NANOS_PER_SEC as u128 / elapsed;
    }

    let freq = (total / samples as u128) as u64;

    // Reject frequencies outside any plausible TSC range.
    if !(100_000_000..=10_000_000_000).contains(&freq) {
        return Ok(None);
    }

    Ok(Some(freq))
}
