use std::time::Duration;

use crate::config::ScanConfig;

/// Tick interval that follows measured processing time
///
/// After each tick the interval moves halfway toward twice the tick's
/// processing time, then is clamped to `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveInterval {
    current: Duration,
    min: Duration,
    max: Duration,
}

impl AdaptiveInterval {
    pub fn new(initial: Duration, min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            current: initial.clamp(min, max),
            min,
            max,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            config.initial_tick_interval(),
            config.min_tick_interval(),
            config.max_tick_interval(),
        )
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn bounds(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    /// Fold in one tick's processing time and return the next interval
    pub fn update(&mut self, elapsed: Duration) -> Duration {
        let target = elapsed.saturating_mul(2);
        let next = if target >= self.current {
            self.current + (target - self.current) / 2
        } else {
            self.current - (self.current - target) / 2
        };
        self.current = next.clamp(self.min, self.max);
        self.current
    }

    pub fn reset(&mut self, initial: Duration) {
        self.current = initial.clamp(self.min, self.max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn slow_ticks_converge_to_ceiling() {
        let mut interval = AdaptiveInterval::new(ms(200), ms(100), ms(1000));
        let mut seen = Vec::new();
        for _ in 0..10 {
            seen.push(interval.update(ms(1500)));
        }
        assert!(seen.iter().all(|&d| d <= ms(1000)));
        assert_eq!(interval.current(), ms(1000));
    }

    #[test]
    fn fast_ticks_converge_to_floor() {
        let mut interval = AdaptiveInterval::new(ms(800), ms(100), ms(1000));
        for _ in 0..20 {
            interval.update(ms(1));
        }
        assert_eq!(interval.current(), ms(100));
    }

    #[test]
    fn moves_halfway_toward_target() {
        let mut interval = AdaptiveInterval::new(ms(200), ms(100), ms(1000));
        // target 600
        assert_eq!(interval.update(ms(300)), ms(400));
        // target 200
        assert_eq!(interval.update(ms(100)), ms(300));
    }

    #[test]
    fn initial_value_is_clamped() {
        let interval = AdaptiveInterval::new(ms(5), ms(100), ms(1000));
        assert_eq!(interval.current(), ms(100));
    }
}
