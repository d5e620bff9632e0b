//! Per-session frame timing

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Time between consecutive frame sends of one session
#[derive(Debug, Clone, Default)]
pub struct FrameTiming {
    last: Option<Instant>,
}

impl FrameTiming {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the baseline if there is none yet
    pub fn start(&mut self) {
        self.last.get_or_insert_with(Instant::now);
    }

    /// Time since the baseline, which then moves to now
    pub fn lap(&mut self) -> Duration {
        self.lap_at(Instant::now())
    }

    fn lap_at(&mut self, now: Instant) -> Duration {
        let elapsed = self
            .last
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last = Some(now);
        elapsed
    }
}

/// Rolling window FPS calculator
#[derive(Debug, Clone)]
pub struct FpsCalculator {
    frame_times: VecDeque<Instant>,
    window: Duration,
}

impl FpsCalculator {
    /// Calculator over a 1-second window
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(120),
            window,
        }
    }

    pub fn record_frame(&mut self) {
        self.record_at(Instant::now());
    }

    fn record_at(&mut self, now: Instant) {
        self.frame_times.push_back(now);
        while let Some(&oldest) = self.frame_times.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.frame_times.pop_front();
            } else {
                break;
            }
        }
    }

    /// Frames recorded within the last window
    pub fn current_fps(&self) -> f64 {
        self.frame_times.len() as f64 / self.window.as_secs_f64()
    }
}

impl Default for FpsCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_lap_is_measured_from_baseline() {
        let t0 = Instant::now();
        let mut timing = FrameTiming { last: Some(t0) };

        // start() keeps an existing baseline
        timing.start();
        assert_eq!(timing.last, Some(t0));

        assert_eq!(timing.lap_at(t0 + Duration::from_millis(33)), Duration::from_millis(33));
        assert_eq!(timing.lap_at(t0 + Duration::from_millis(70)), Duration::from_millis(37));
    }

    #[test]
    fn test_lap_without_baseline_is_zero() {
        let mut timing = FrameTiming::new();
        assert_eq!(timing.lap(), Duration::ZERO);
    }

    #[test]
    fn test_fps_window() {
        let mut fps = FpsCalculator::new();
        let t0 = Instant::now();
        for i in 0..30 {
            fps.record_at(t0 + Duration::from_millis(i * 33));
        }
        assert_eq!(fps.current_fps(), 30.0);

        // Two seconds later only the new frame remains in the window
        fps.record_at(t0 + Duration::from_secs(3));
        assert_eq!(fps.current_fps(), 1.0);
    }
}
