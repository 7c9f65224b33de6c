use std::time::Duration;

use tokio::time::Instant;

/// Lets at most one side effect through per window
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_fired: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether a side effect may fire at `now`; records it when allowed
    pub fn try_fire(&mut self, now: Instant) -> bool {
        let blocked = self
            .last_fired
            .is_some_and(|last| now.saturating_duration_since(last) < self.window);
        if !blocked {
            self.last_fired = Some(now);
        }
        !blocked
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}
