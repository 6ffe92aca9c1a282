use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// Shared last-activity timestamp.
///
/// The copy loop calls [`mark`](ActivityTimer::mark) after every successful
/// read; an independent watchdog polls [`idle_for`](ActivityTimer::idle_for)
/// or [`is_idle`](ActivityTimer::is_idle) to enforce idle timeouts. The
/// timestamp is kept as milliseconds relative to a base instant in an
/// atomic, so concurrent marks and reads never observe a torn value.
pub struct ActivityTimer {
    base: Instant,
    last_mark_ms: AtomicU64,
}

impl ActivityTimer {
    /// A fresh timer counts as "active just now".
    pub fn new() -> Self {
        ActivityTimer {
            base: Instant::now(),
            last_mark_ms: AtomicU64::new(0),
        }
    }

    pub fn mark(&self) {
        let now = self.base.elapsed().as_millis() as u64;
        self.last_mark_ms.store(now, Ordering::Relaxed);
    }

    /// Time since the last mark (or since creation if never marked).
    pub fn idle_for(&self) -> Duration {
        let now = self.base.elapsed().as_millis() as u64;
        let last = self.last_mark_ms.load(Ordering::Relaxed);
        Duration::from_millis(now.saturating_sub(last))
    }

    pub fn is_idle(&self, limit: Duration) -> bool {
        self.idle_for() >= limit
    }
}

impl Default for ActivityTimer {
    fn default() -> Self {
        ActivityTimer::new()
    }
}
