//! Wall Clock
//!
//! Game time is seconds since the Unix epoch as `f64`, which is what the
//! persisted expiry timestamps store.

/// Seconds since the Unix epoch.
pub type Timestamp = f64;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current time in seconds.
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let now = chrono::Utc::now();
        now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
    }
}

/// Manually driven clock for tests.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: parking_lot::Mutex<Timestamp>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: parking_lot::Mutex::new(start),
        }
    }

    pub fn set(&self, t: Timestamp) {
        *self.now.lock() = t;
    }

    pub fn advance(&self, secs: f64) {
        *self.now.lock() += secs;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// Render a duration as "H hours M minutes S seconds", dropping zero parts.
pub fn humanize_elapsed(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let plural = |n: u64| if n == 1 { "" } else { "s" };
    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{} hour{}", hours, plural(hours)));
    }
    if minutes > 0 {
        parts.push(format!("{} minute{}", minutes, plural(minutes)));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{} second{}", seconds, plural(seconds)));
    }
    parts.join(" ")
}

/// Render time left until `until` compactly: `1h05m` or `4m09s`.
pub fn format_remaining(until: Timestamp, now: Timestamp) -> String {
    let rem = (until - now) as i64;
    if rem <= 0 {
        return "0m".to_string();
    }
    if rem >= 3600 {
        format!("{}h{:02}m", rem / 3600, (rem % 3600) / 60)
    } else {
        format!("{}m{:02}s", rem / 60, rem % 60)
    }
}
