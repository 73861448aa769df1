//! Small synchronization helpers for the render engine.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Manual-reset event. Stays set until explicitly reset, releasing every
/// waiter.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    set: Mutex<bool>,
    condvar: Condvar,
}

impl Signal {
    pub fn set(&self) {
        *self.set.lock() = true;
        self.condvar.notify_all();
    }

    pub fn reset(&self) {
        *self.set.lock() = false;
    }

    pub fn wait(&self) {
        let mut set = self.set.lock();
        while !*set {
            self.condvar.wait(&mut set);
        }
    }

    /// Returns whether the signal was set before `timeout` elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut set = self.set.lock();
        while !*set {
            if self.condvar.wait_until(&mut set, deadline).timed_out() {
                break;
            }
        }
        *set
    }
}

/// Pausable wall clock for session timing.
#[derive(Debug, Default)]
pub(crate) struct Stopwatch {
    inner: Mutex<StopwatchState>,
}

#[derive(Debug, Default)]
struct StopwatchState {
    accumulated: Duration,
    started: Option<Instant>,
}

impl Stopwatch {
    /// Start (or keep) running.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.started.is_none() {
            inner.started = Some(Instant::now());
        }
    }

    /// Stop running, keeping the elapsed time.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if let Some(started) = inner.started.take() {
            inner.accumulated += started.elapsed();
        }
    }

    pub fn restart(&self) {
        let mut inner = self.inner.lock();
        inner.accumulated = Duration::ZERO;
        inner.started = Some(Instant::now());
    }

    pub fn reset(&self) {
        *self.inner.lock() = StopwatchState::default();
    }

    pub fn elapsed(&self) -> Duration {
        let inner = self.inner.lock();
        inner.accumulated + inner.started.map_or(Duration::ZERO, |s| s.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_signal_releases_waiters() {
        let signal = Arc::new(Signal::default());
        assert!(!signal.wait_timeout(Duration::from_millis(5)));

        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait())
        };
        signal.set();
        waiter.join().unwrap();

        // Manual reset: stays set for later waiters
        assert!(signal.wait_timeout(Duration::ZERO));
        signal.reset();
        assert!(!signal.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn test_stopwatch_pauses() {
        let clock = Stopwatch::default();
        assert_eq!(clock.elapsed(), Duration::ZERO);

        clock.restart();
        thread::sleep(Duration::from_millis(5));
        clock.stop();
        let stopped = clock.elapsed();
        assert!(stopped >= Duration::from_millis(5));

        thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.elapsed(), stopped);

        clock.start();
        thread::sleep(Duration::from_millis(1));
        assert!(clock.elapsed() > stopped);
        clock.reset();
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }
}
