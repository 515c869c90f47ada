//! Frame timing passed to the per-frame slots.

use std::time::Duration;

/// Frame counter with total and per-frame elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTimer {
    frame: u64,
    elapsed: Duration,
    delta: Duration,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one frame that took `delta`.
    pub fn tick(&mut self, delta: Duration) {
        self.frame += 1;
        self.delta = delta;
        self.elapsed += delta;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn delta(&self) -> Duration {
        self.delta
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_accumulates() {
        let mut timer = FrameTimer::new();
        timer.tick(Duration::from_millis(16));
        timer.tick(Duration::from_millis(17));
        assert_eq!(timer.frame(), 2);
        assert_eq!(timer.delta(), Duration::from_millis(17));
        assert_eq!(timer.elapsed(), Duration::from_millis(33));
    }
}
