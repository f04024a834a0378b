//! # Rate Limiter
//!
//! Client-side advisory cooldown between successful sends, plus a per-second
//! countdown the presentation layer can watch. Prevents double submission and
//! casual spam; it is not an abuse control.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Tracks `last_sent_at` for one client session.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    cooldown: Duration,
    last_sent_at: Option<Instant>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, last_sent_at: None }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// `true` iff `now - last_sent_at >= cooldown`. Does not consume.
    pub fn allows(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }

    /// Marks a send at `now`.
    pub fn record(&mut self, now: Instant) {
        self.last_sent_at = Some(now);
    }

    /// Checks and, when allowed, records the send.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        if !self.allows(now) {
            return false;
        }
        self.record(now);
        true
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_sent_at {
            Some(last) => self.cooldown.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Remaining cooldown rounded up to whole seconds.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        ceil_secs(self.remaining(now))
    }
}

pub(crate) fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Seconds-left counter that ticks down once per second until zero.
pub struct Countdown {
    tx: Arc<watch::Sender<u64>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Countdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx), ticker: Mutex::new(None) }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    pub fn remaining(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Restarts the countdown from `secs`. Must be called inside a tokio runtime.
    pub fn start(&self, secs: u64) {
        self.stop();
        self.tx.send_replace(secs);
        if secs == 0 {
            return;
        }

        let tx = Arc::clone(&self.tx);
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let mut left = 0;
                tx.send_modify(|v| {
                    *v = v.saturating_sub(1);
                    left = *v;
                });
                if left == 0 {
                    break;
                }
            }
        });

        if let Ok(mut ticker) = self.ticker.lock() {
            *ticker = Some(handle);
        }
    }

    pub fn stop(&self) {
        if let Ok(mut ticker) = self.ticker.lock() {
            if let Some(handle) = ticker.take() {
                handle.abort();
            }
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}
