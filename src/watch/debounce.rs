// src/watch/debounce.rs

use std::time::Duration;

use futures::future;
use futures::stream::{Stream, StreamExt};
use tokio::time::Instant;

/// Leading-edge rate limiter.
///
/// The first event always passes. After that an event passes only if at
/// least `delay` has elapsed since the last event that passed; suppressed
/// events do not extend the window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    pub fn admit_at(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.delay => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Drop items of `events` that arrive within `delay` of the last item that
/// was let through.
pub fn debounce<S>(events: S, delay: Duration) -> impl Stream<Item = S::Item>
where
    S: Stream,
{
    let mut debouncer = Debouncer::new(delay);
    events.filter(move |_| future::ready(debouncer.admit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn suppressed_events_do_not_extend_the_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(100));

        assert!(debouncer.admit_at(start));
        assert!(!debouncer.admit_at(start + ms(60)));
        assert!(!debouncer.admit_at(start + ms(99)));
        assert!(debouncer.admit_at(start + ms(100)));
        assert!(!debouncer.admit_at(start + ms(150)));
    }

    #[test]
    fn zero_delay_admits_everything() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::ZERO);
        assert!(debouncer.admit_at(start));
        assert!(debouncer.admit_at(start));
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_collapse_to_their_leading_event() {
        let start = Instant::now();
        let arrivals = stream::iter([0u64, 50, 1200]).then(move |at| async move {
            tokio::time::sleep_until(start + ms(at)).await;
            at
        });

        let passed: Vec<u64> = debounce(arrivals, ms(1000)).collect().await;
        assert_eq!(passed, vec![0, 1200]);
    }
}
