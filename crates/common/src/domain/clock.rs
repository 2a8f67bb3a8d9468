use chrono::{DateTime, Utc};

/// Source of the timestamps written into device records
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock used in production
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock that moves forward by a fixed step on every read
#[cfg(any(test, feature = "testing"))]
pub struct SteppingClock {
    start: DateTime<Utc>,
    step: chrono::Duration,
    ticks: std::sync::atomic::AtomicI32,
}

#[cfg(any(test, feature = "testing"))]
impl SteppingClock {
    pub fn new(start: DateTime<Utc>, step: chrono::Duration) -> Self {
        Self {
            start,
            step,
            ticks: std::sync::atomic::AtomicI32::new(0),
        }
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self
            .ticks
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.start + self.step * tick
    }
}
