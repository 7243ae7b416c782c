//! Monotonic time sources for operation timing.
//!
//! Metric timestamps are fractional milliseconds since the clock was created.
//! They are only meaningful relative to each other, never as wall-clock time.

use std::fmt;

/// The `Clock` used to timestamp every operation
pub trait Clock: fmt::Debug + Send + Sync {
    /// Milliseconds elapsed since this clock's origin
    fn now_ms(&self) -> f64;
}

/// A high resolution clock that operates with respect to real-clock time.
#[derive(Debug, Clone)]
pub struct RealClock {
    clock: quanta::Clock,
    start: quanta::Instant,
}

impl Default for RealClock {
    fn default() -> Self {
        let clock = quanta::Clock::new();
        let start = clock.now();
        Self { clock, start }
    }
}

impl Clock for RealClock {
    fn now_ms(&self) -> f64 {
        self.clock.now().duration_since(self.start).as_secs_f64() * 1_000.0
    }
}

/// A clock that follows the tokio runtime's notion of time.
///
/// Under a paused runtime this clock only moves when the runtime advances it,
/// which makes operation durations deterministic.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    start: tokio::time::Instant,
}

impl Default for TokioClock {
    fn default() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1_000.0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn real_clock_is_monotonic() {
        let clock = RealClock::default();
        let mut prev = clock.now_ms();
        for _ in 0..1_000 {
            let now = clock.now_ms();
            assert!(now >= prev, "{now} < {prev}");
            prev = now;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::default();
        assert!(clock.now_ms().abs() < f64::EPSILON);
        tokio::time::advance(Duration::from_millis(250)).await;
        assert!((clock.now_ms() - 250.0).abs() < 1e-6);
    }
}
