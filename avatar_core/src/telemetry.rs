use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info};
use parking_lot::Mutex;

use crate::service::RateSink;

struct RateWindow {
    started: Instant,
    samples: u32,
    sum: f64,
}

/// Avatar simrate telemetry.
///
/// Keeps the latest sample for readers on any thread and logs the average
/// once per period. Samples are dropped rather than waited on when the window
/// lock is contended.
pub struct SimrateTelemetry {
    last_rate_bits: AtomicU32,
    average_rate_bits: AtomicU32,
    last_step_usec: AtomicU64,
    period: Duration,
    window: Mutex<RateWindow>,
}

impl SimrateTelemetry {
    pub fn new(period: Duration) -> Self {
        Self {
            last_rate_bits: AtomicU32::new(0f32.to_bits()),
            average_rate_bits: AtomicU32::new(0f32.to_bits()),
            last_step_usec: AtomicU64::new(0),
            period,
            window: Mutex::new(RateWindow {
                started: Instant::now(),
                samples: 0,
                sum: 0.0,
            }),
        }
    }

    #[inline]
    pub fn from_period_ms(period_ms: u32) -> Self {
        Self::new(Duration::from_millis(u64::from(period_ms)))
    }

    /// Most recent instantaneous simrate, as reported by the step.
    #[inline]
    pub fn last_rate(&self) -> f32 {
        f32::from_bits(self.last_rate_bits.load(Ordering::Relaxed))
    }

    /// Average over the last completed period. Zero until one completes.
    #[inline]
    pub fn average_rate(&self) -> f32 {
        f32::from_bits(self.average_rate_bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn last_step(&self) -> Duration {
        Duration::from_micros(self.last_step_usec.load(Ordering::Relaxed))
    }
}

impl Default for SimrateTelemetry {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl RateSink for SimrateTelemetry {
    fn report_rate(&self, ticks_per_second: f32) {
        self.last_rate_bits
            .store(ticks_per_second.to_bits(), Ordering::Relaxed);

        // Inf/NaN come from zero or skewed deltas; keep them out of the average.
        if !ticks_per_second.is_finite() {
            debug!("non-finite simrate sample: {ticks_per_second}");
            return;
        }

        let Some(mut w) = self.window.try_lock() else {
            return;
        };

        w.samples += 1;
        w.sum += f64::from(ticks_per_second);

        let elapsed = w.started.elapsed();
        if elapsed >= self.period {
            let avg = (w.sum / f64::from(w.samples)) as f32;
            self.average_rate_bits.store(avg.to_bits(), Ordering::Relaxed);

            info!(
                "avatar simrate={:.1} samples={} step_us={}",
                avg,
                w.samples,
                self.last_step_usec.load(Ordering::Relaxed)
            );

            w.samples = 0;
            w.sum = 0.0;
            w.started = Instant::now();
        }
    }

    #[inline]
    fn record_step(&self, elapsed: Duration) {
        self.last_step_usec
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);
    }
}
