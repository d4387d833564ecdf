use chrono::{DateTime, Local};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time as seen by the engine. Durations always come from `monotonic`;
/// `wall` is only used for file names and display.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin. Never goes backwards.
    fn monotonic(&self) -> Duration;

    fn wall(&self) -> DateTime<Local>;

    /// Sleeps for up to `timeout`, returning early with `true` once `stop`
    /// fires.
    fn sleep_or_stop(&self, timeout: Duration, stop: &StopSignal) -> bool {
        stop.wait_timeout(timeout)
    }
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// One-shot cancellation flag shared between the control path and a
/// producer loop. Once triggered it stays triggered.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let mut stopped = self.inner.stopped.lock();
        *stopped = true;
        self.inner.cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.stopped.lock()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.inner.stopped.lock();
        while !*stopped {
            if self.inner.cvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}
