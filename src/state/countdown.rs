//! Cancellable periodic task driven by the shared clock.
//!
//! The race machine owns one of these while in `Starting` to produce the
//! countdown beep. There are no timers or threads: the owner polls it once
//! per tick with the current shared time.

/// Seconds after entering `Starting` before the first beep.
pub const COUNTDOWN_BEEP_DELAY: f64 = 1.0;

/// Seconds between countdown beeps.
pub const COUNTDOWN_BEEP_INTERVAL: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicTask {
    next_fire: f64,
    interval: f64,
    fired: u32,
    cancelled: bool,
}

impl PeriodicTask {
    /// Schedule the first firing `delay` seconds after `now`, then every
    /// `interval` seconds. A non-positive interval fires once.
    pub fn start(now: f64, delay: f64, interval: f64) -> Self {
        Self {
            next_fire: now + delay.max(0.0),
            interval,
            fired: 0,
            cancelled: false,
        }
    }

    /// The countdown beep schedule.
    pub fn countdown_beep(now: f64) -> Self {
        Self::start(now, COUNTDOWN_BEEP_DELAY, COUNTDOWN_BEEP_INTERVAL)
    }

    /// Number of firings that came due up to `now`. Ticks that skip past
    /// several deadlines report all of them.
    pub fn poll(&mut self, now: f64) -> u32 {
        if self.cancelled {
            return 0;
        }

        let mut due = 0;
        while self.next_fire <= now {
            due += 1;
            if self.interval <= 0.0 {
                self.cancelled = true;
                break;
            }
            self.next_fire += self.interval;
        }

        self.fired += due;
        due
    }

    /// Stop the task. Returns `true` only for the call that actually
    /// cancelled it.
    pub fn cancel(&mut self) -> bool {
        let was_running = !self.cancelled;
        self.cancelled = true;
        was_running
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Total firings so far.
    pub fn fired(&self) -> u32 {
        self.fired
    }
}
