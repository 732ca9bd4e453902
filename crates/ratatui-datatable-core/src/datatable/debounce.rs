use std::time::Duration;
use std::time::Instant;

/// Trailing-edge debouncer driven by explicit timestamps.
///
/// Scheduling again before the deadline replaces the pending value and pushes the deadline out.
#[derive(Clone, Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    /// Returns the pending value once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, at)) if now >= *at => self.pending.take().map(|(v, _)| v),
            _ => None,
        }
    }

    /// Returns the pending value regardless of the deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(v, _)| v)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_bursts_into_the_last_value() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.schedule(1, t0);
        d.schedule(2, t0 + Duration::from_millis(50));
        assert_eq!(d.poll(t0 + Duration::from_millis(120)), None);
        assert_eq!(d.poll(t0 + Duration::from_millis(150)), Some(2));
        assert_eq!(d.poll(t0 + Duration::from_millis(500)), None);
    }

    #[test]
    fn flush_ignores_the_deadline() {
        let mut d = Debouncer::new(Duration::from_secs(10));
        d.schedule("x", Instant::now());
        assert_eq!(d.flush(), Some("x"));
        assert!(!d.is_pending());
    }
}
