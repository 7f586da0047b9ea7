//! Vehicle travel record.
//!
//! Vehicles use a **teleport-at-arrival** model: a vehicle logically stays
//! at `from` until `arrival`, then appears at `to`.  `position_at`
//! interpolates in between so spatial queries see moving vehicles roughly
//! where they are.

use sd_core::{Position, Tick};

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trip {
    pub from:      Position,
    pub to:        Position,
    pub departure: Tick,
    pub arrival:   Tick,
}

impl Trip {
    /// Fraction of the journey completed at `now`, in `[0.0, 1.0]`.
    pub fn progress(&self, now: Tick) -> f32 {
        if self.arrival <= self.departure {
            return 1.0;
        }
        let elapsed = now.since(self.departure) as f32;
        let total   = (self.arrival.0 - self.departure.0) as f32;
        (elapsed / total).min(1.0)
    }

    #[inline]
    pub fn position_at(&self, now: Tick) -> Position {
        self.from.lerp(self.to, self.progress(now))
    }
}
