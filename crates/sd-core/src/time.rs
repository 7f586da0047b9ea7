//! Simulation time model.
//!
//! # Design
//!
//! Time is a monotonically increasing `Tick` counter driven by the host
//! scheduler.  Systems do not run every tick: each one owns an
//! [`UpdateInterval`] and fires only when `tick % interval == offset`, so
//! work for different request kinds is spread across frames instead of
//! piling onto the same one.
//!
//! `SimClock` maps ticks to simulated seconds so path durations reported by
//! the router can be turned into arrival ticks.

use std::fmt;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Ticks elapsed from `earlier` to `self`, saturating at zero.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── UpdateInterval ───────────────────────────────────────────────────────────

/// Fixed-stride scheduling slot: fires on ticks where
/// `tick % interval == offset % interval`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpdateInterval {
    pub interval: u64,
    pub offset:   u64,
}

impl UpdateInterval {
    /// Fires on every tick.
    pub const EVERY_TICK: UpdateInterval = UpdateInterval { interval: 1, offset: 0 };

    pub const fn new(interval: u64, offset: u64) -> Self {
        Self { interval, offset }
    }

    /// `true` if the slot is due at `tick`.  A zero interval is treated as 1.
    #[inline]
    pub fn fires(self, tick: Tick) -> bool {
        let interval = self.interval.max(1);
        tick.0 % interval == self.offset % interval
    }
}

impl Default for UpdateInterval {
    fn default() -> Self {
        Self::EVERY_TICK
    }
}

impl fmt::Display for UpdateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {} (+{})", self.interval, self.offset)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Current tick plus the tick-to-seconds mapping.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// How many simulated seconds one tick represents.
    pub tick_duration_secs: f32,
    /// The current tick, advanced by `SimClock::advance()` each iteration.
    pub current_tick: Tick,
}

impl SimClock {
    pub fn new(tick_duration_secs: f32) -> Self {
        Self { tick_duration_secs, current_tick: Tick::ZERO }
    }

    /// Advance the clock by one tick.
    #[inline]
    pub fn advance(&mut self) {
        self.current_tick = Tick(self.current_tick.0 + 1);
    }

    /// Elapsed simulated seconds since tick 0.
    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.current_tick.0 as f64 * self.tick_duration_secs as f64
    }

    /// How many ticks span `secs` seconds?  Rounds up and never returns 0, so
    /// a trip always arrives on a later tick than it departs.
    pub fn ticks_for_secs(&self, secs: f32) -> u64 {
        if self.tick_duration_secs <= 0.0 || !secs.is_finite() {
            return 1;
        }
        ((secs / self.tick_duration_secs).ceil() as u64).max(1)
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.0}s)", self.current_tick, self.elapsed_secs())
    }
}
