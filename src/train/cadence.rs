use std::time::{Duration, Instant};

/// When a periodic side effect (snapshot, validation) is due.
///
/// Fires when the batch counter hits a multiple of `batch_interval`, or when
/// strictly more than `time_interval` has passed since the last `reset`.
/// Either trigger alone is enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    last_fired_at: Instant,
    batch_interval: Option<usize>,
    time_interval: Duration,
}

impl Cadence {
    /// Count- and time-triggered.
    pub fn new(now: Instant, batch_interval: usize, time_interval: Duration) -> Self {
        Cadence { last_fired_at: now, batch_interval: Some(batch_interval), time_interval }
    }

    /// Time-triggered only.
    pub fn timed(now: Instant, time_interval: Duration) -> Self {
        Cadence { last_fired_at: now, batch_interval: None, time_interval }
    }

    pub fn should_fire(&self, now: Instant, batch_count: usize) -> bool {
        let by_count = matches!(self.batch_interval, Some(n) if n > 0 && batch_count % n == 0);
        by_count || self.elapsed(now) > self.time_interval
    }

    pub fn reset(&mut self, now: Instant) {
        self.last_fired_at = now;
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_fired_at)
    }

    pub fn time_interval(&self) -> Duration {
        self.time_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECS_240: Duration = Duration::from_secs(240);

    /// Simulates `batches` steps of `step` each, firing and resetting like the
    /// solver does; returns the batch numbers that fired.
    fn simulate(cadence: &mut Cadence, start: Instant, batches: usize, step: Duration) -> Vec<(usize, Duration)> {
        let mut fired = Vec::new();
        let mut now = start;
        for batch in 1..=batches {
            now += step;
            if cadence.should_fire(now, batch) {
                fired.push((batch, now - start));
                cadence.reset(now);
            }
        }
        fired
    }

    #[test]
    fn test_fast_batches_fire_on_count() {
        let t0 = Instant::now();
        let mut cadence = Cadence::new(t0, 100, SECS_240);
        let fired = simulate(&mut cadence, t0, 350, Duration::from_millis(10));
        let batches: Vec<usize> = fired.iter().map(|(b, _)| *b).collect();
        assert_eq!(batches, vec![100, 200, 300]);
    }

    #[test]
    fn test_slow_batches_fire_on_time() {
        let t0 = Instant::now();
        let mut cadence = Cadence::new(t0, 100, SECS_240);
        // 100 s per batch: time trigger after 3 batches (300 s > 240 s)
        let fired = simulate(&mut cadence, t0, 12, Duration::from_secs(100));
        let batches: Vec<usize> = fired.iter().map(|(b, _)| *b).collect();
        assert_eq!(batches, vec![3, 6, 9, 12]);
        for pair in fired.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= SECS_240);
        }
    }

    #[test]
    fn test_time_threshold_is_strict() {
        let t0 = Instant::now();
        let cadence = Cadence::timed(t0, SECS_240);
        assert!(!cadence.should_fire(t0 + SECS_240, 100));
        assert!(cadence.should_fire(t0 + SECS_240 + Duration::from_millis(1), 1));
    }

    #[test]
    fn test_reset_restarts_the_clock() {
        let t0 = Instant::now();
        let mut cadence = Cadence::timed(t0, Duration::from_secs(10));
        let later = t0 + Duration::from_secs(11);
        assert!(cadence.should_fire(later, 1));
        cadence.reset(later);
        assert!(!cadence.should_fire(later + Duration::from_secs(5), 2));
        assert_eq!(cadence.elapsed(later + Duration::from_secs(5)), Duration::from_secs(5));
    }
}
