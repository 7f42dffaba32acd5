//! Rate gate allowing an action at most once per interval.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Limits how often an action may run.
///
/// The first call is always allowed; afterwards a call is allowed once at
/// least `interval` has elapsed since the last allowed one. An interval of
/// zero allows every call.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use workbench::Throttler;
///
/// let throttler = Throttler::new(Duration::from_secs(60));
/// assert!(throttler.execute(|| println!("reported")));
/// assert!(!throttler.execute(|| println!("skipped")));
/// ```
#[derive(Debug)]
pub struct Throttler {
    interval: Duration,
    last_allowed: Mutex<Option<Instant>>,
}

impl Throttler {
    /// Create a throttler with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_allowed: Mutex::new(None),
        }
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether an action may run now. A `true` result consumes the current
    /// window.
    pub fn allow(&self) -> bool {
        let now = Instant::now();
        let mut last_allowed = self.last_allowed.lock();

        if let Some(last) = *last_allowed {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        *last_allowed = Some(now);
        true
    }

    /// Run `action` if allowed. Returns whether it ran.
    pub fn execute<F: FnOnce()>(&self, action: F) -> bool {
        if !self.allow() {
            return false;
        }
        action();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_first_call_allowed() {
        let throttler = Throttler::new(Duration::from_millis(100));
        assert!(throttler.allow());
    }

    #[test]
    fn test_window() {
        let throttler = Throttler::new(Duration::from_millis(200));

        assert!(throttler.allow());
        assert!(!throttler.allow());

        thread::sleep(Duration::from_millis(250));
        assert!(throttler.allow());
        assert!(!throttler.allow());
    }

    #[test]
    fn test_zero_interval_allows_everything() {
        let throttler = Throttler::new(Duration::ZERO);
        assert!((0..100).all(|_| throttler.allow()));
    }

    #[test]
    fn test_execute() {
        let throttler = Throttler::new(Duration::from_millis(5));
        let count = AtomicU32::new(0);

        assert!(throttler.execute(|| {
            count.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(!throttler.execute(|| {
            count.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        thread::sleep(Duration::from_millis(10));

        assert!(throttler.execute(|| {
            count.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_allow_yields_one() {
        const THREADS: usize = 10;

        let throttler = Arc::new(Throttler::new(Duration::from_millis(200)));
        let barrier = Arc::new(Barrier::new(THREADS));
        let allowed = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let throttler = Arc::clone(&throttler);
                let barrier = Arc::clone(&barrier);
                let allowed = Arc::clone(&allowed);
                thread::spawn(move || {
                    barrier.wait();
                    if throttler.allow() {
                        allowed.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(allowed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_race_safety() {
        const THREADS: usize = 50;
        const ITERATIONS: usize = 100;
        const INTERVAL: Duration = Duration::from_millis(10);

        let throttler = Arc::new(Throttler::new(INTERVAL));
        let allowed = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let throttler = Arc::clone(&throttler);
                let allowed = Arc::clone(&allowed);
                thread::spawn(move || {
                    for _ in 0..ITERATIONS {
                        if throttler.allow() {
                            allowed.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_millis(1));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let elapsed = started.elapsed();
        let allowed = allowed.load(Ordering::SeqCst) as u128;
        let windows = elapsed.as_millis() / INTERVAL.as_millis() + 1;
        assert!(allowed >= 1);
        assert!(allowed <= windows, "{allowed} calls allowed in {elapsed:?}");
    }
}
