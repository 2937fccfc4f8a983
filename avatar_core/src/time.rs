use std::{
    sync::OnceLock,
    thread,
    time::{Duration, Instant},
};

use crate::error::{UpdateError, UpdateResult};

pub const USECS_PER_SECOND: u64 = 1_000_000;

/// Shortest pacing sleep. The autonomous loop always yields at least this long.
pub const MIN_SLEEP_USEC: u64 = 1;

/// Clock and sleep primitive used by the scheduler.
///
/// `now_usec` must be monotonic. Tests substitute a scripted clock.
pub trait FramePacer: Send {
    fn now_usec(&self) -> u64;
    fn sleep_usec(&self, usec: u64);
}

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Monotonic microseconds since the process epoch.
///
/// The epoch is fixed by the first `SystemPacer::new()` or the first call here,
/// whichever comes first.
#[inline]
pub fn monotonic_usec() -> u64 {
    let epoch = *EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_micros() as u64
}

/// Real-time pacer backed by `Instant` and `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPacer;

impl SystemPacer {
    #[inline]
    pub fn new() -> Self {
        EPOCH.get_or_init(Instant::now);
        Self
    }
}

impl FramePacer for SystemPacer {
    #[inline]
    fn now_usec(&self) -> u64 {
        monotonic_usec()
    }

    fn sleep_usec(&self, usec: u64) {
        if usec == 0 {
            thread::yield_now();
            return;
        }
        thread::sleep(Duration::from_micros(usec));
    }
}

/// Microseconds between ticks for `rate` ticks per second, rounded to nearest.
///
/// 60 Hz gives 16667.
pub fn target_interval_usec(rate: u32) -> UpdateResult<u64> {
    if rate == 0 {
        return Err(UpdateError::InvalidRate(rate));
    }
    let rate = u64::from(rate);
    Ok((USECS_PER_SECOND + rate / 2) / rate)
}

/// Pacing sleep after a step that took `elapsed_usec`. Never below `MIN_SLEEP_USEC`.
#[inline]
pub fn pacing_sleep_usec(target_interval_usec: u64, elapsed_usec: u64) -> u64 {
    target_interval_usec
        .saturating_sub(elapsed_usec)
        .max(MIN_SLEEP_USEC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_for_common_rates() {
        assert_eq!(target_interval_usec(60).unwrap(), 16_667);
        assert_eq!(target_interval_usec(1).unwrap(), 1_000_000);
        assert_eq!(target_interval_usec(90).unwrap(), 11_111);
        assert_eq!(target_interval_usec(120).unwrap(), 8_333);
        assert_eq!(target_interval_usec(1_000_000).unwrap(), 1);
    }

    #[test]
    fn interval_is_within_half_a_microsecond_of_exact() {
        for rate in 1..=5_000u32 {
            let interval = target_interval_usec(rate).unwrap() as f64;
            let exact = USECS_PER_SECOND as f64 / f64::from(rate);
            assert!((interval - exact).abs() <= 0.5, "rate {rate}: {interval} vs {exact}");
        }
    }

    #[test]
    fn zero_rate_is_invalid() {
        assert!(matches!(target_interval_usec(0), Err(UpdateError::InvalidRate(0))));
    }

    #[test]
    fn overrun_step_still_yields() {
        assert_eq!(pacing_sleep_usec(16_667, 20_000), 1);
        assert_eq!(pacing_sleep_usec(16_667, 16_667), 1);
    }

    #[test]
    fn short_step_sleeps_the_remainder() {
        assert_eq!(pacing_sleep_usec(16_667, 5_000), 11_667);
        assert_eq!(pacing_sleep_usec(16_667, 0), 16_667);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let pacer = SystemPacer::new();
        let a = pacer.now_usec();
        pacer.sleep_usec(200);
        let b = pacer.now_usec();
        assert!(b >= a + 200);
    }
}
