//! Lightweight profiling timers.
//!
//! Every inference and encoding stage in the pipeline keeps one of these around and reports it
//! as part of [`crate::timer`]-shaped telemetry, the same way the detector and landmark
//! extractor profile their resize/infer stages.

use std::time::{Duration, Instant};

/// Accumulates wall-clock time spent in a named section of code.
#[derive(Debug, Clone)]
pub struct Timer {
    name: &'static str,
    last: Duration,
    total: Duration,
    count: u32,
}

impl Timer {
    /// Creates a new, zeroed timer with the given name.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            last: Duration::ZERO,
            total: Duration::ZERO,
            count: 0,
        }
    }

    /// Returns the timer's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Times the execution of `f`, recording the elapsed duration.
    pub fn time<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();
        self.last = elapsed;
        self.total += elapsed;
        self.count += 1;
        result
    }

    /// Returns the duration of the most recently timed invocation.
    pub fn last(&self) -> Duration {
        self.last
    }

    /// Returns the total duration accumulated across all invocations.
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Returns the number of times [`Timer::time`] has been called.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns the mean duration across all invocations, or `None` if `time` was never called.
    pub fn mean(&self) -> Option<Duration> {
        if self.count == 0 {
            None
        } else {
            Some(self.total / self.count)
        }
    }
}

/// A cooperative deadline used to bound the total duration of a multi-stage pipeline run.
///
/// The orchestrator creates one of these from [`ProcessingOptions::processing_timeout`] and
/// checks it before every suspension point (face detection, landmark extraction, each JPEG 2000
/// encoding attempt), per the cancellation model the pipeline is specified to follow.
///
/// [`ProcessingOptions::processing_timeout`]: https://docs.rs/pivcard-core (see `pivcard_core::options`)
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Creates a deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// Returns whether the deadline has already passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Returns the amount of time remaining until the deadline, or `Duration::ZERO` if expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn timer_accumulates() {
        let mut t = Timer::new("test");
        t.time(|| thread::sleep(Duration::from_millis(1)));
        t.time(|| thread::sleep(Duration::from_millis(1)));
        assert_eq!(t.count(), 2);
        assert!(t.total() >= Duration::from_millis(2));
        assert!(t.mean().unwrap() > Duration::ZERO);
    }

    #[test]
    fn deadline_in_the_past_is_expired() {
        let d = Deadline::after(Duration::ZERO);
        thread::sleep(Duration::from_millis(1));
        assert!(d.is_expired());
        assert_eq!(d.remaining(), Duration::ZERO);
    }

    #[test]
    fn deadline_in_the_future_is_not_expired() {
        let d = Deadline::after(Duration::from_secs(60));
        assert!(!d.is_expired());
        assert!(d.remaining() > Duration::from_secs(1));
    }
}
