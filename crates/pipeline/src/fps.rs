//! Rolling FPS estimator over the last 30 frame timestamps, matching the
//! `(n-1)/(t_last-t_first)` window used by the pipeline this was distilled
//! from.

use std::collections::VecDeque;
use std::time::Instant;

const WINDOW: usize = 30;

pub struct FpsEstimator {
    timestamps: VecDeque<Instant>,
}

impl Default for FpsEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsEstimator {
    pub fn new() -> Self {
        Self {
            timestamps: VecDeque::with_capacity(WINDOW),
        }
    }

    /// Record a frame's arrival time and return the current rolling FPS
    /// estimate (0.0 until at least two samples are available).
    pub fn tick(&mut self, now: Instant) -> f64 {
        if self.timestamps.len() >= WINDOW {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(now);

        if self.timestamps.len() < 2 {
            return 0.0;
        }
        let first = *self.timestamps.front().unwrap();
        let last = *self.timestamps.back().unwrap();
        let elapsed = last.duration_since(first).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        (self.timestamps.len() - 1) as f64 / elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn zero_until_two_samples() {
        let mut fps = FpsEstimator::new();
        let t0 = Instant::now();
        assert_eq!(fps.tick(t0), 0.0);
    }

    #[test]
    fn estimates_rate_from_uniform_spacing() {
        let mut fps = FpsEstimator::new();
        let t0 = Instant::now();
        for i in 0..10 {
            fps.tick(t0 + Duration::from_millis(i * 100));
        }
        let estimate = fps.tick(t0 + Duration::from_millis(1000));
        assert!((estimate - 10.0).abs() < 0.5);
    }

    #[test]
    fn window_bounded_at_30_samples() {
        let mut fps = FpsEstimator::new();
        let t0 = Instant::now();
        for i in 0..100 {
            fps.tick(t0 + Duration::from_millis(i * 33));
        }
        assert_eq!(fps.timestamps.len(), 30);
    }
}
