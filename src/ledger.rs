//! Transition offset ledger.
//!
//! While the picture track is built, every clip records the cumulative
//! seconds of transition overlap accrued up to and including its own
//! transition. Downstream builders subtract that offset to convert nominal
//! timeline positions into visual time.

use crate::error::{CinegraphError, CinegraphResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LedgerEntry {
    /// Nominal position of the clip that recorded this entry.
    pub position: f64,
    /// Cumulative transition overlap at this clip, seconds.
    pub offset: f64,
}

#[derive(Clone, Debug, Default)]
pub struct TransitionLedger {
    entries: Vec<LedgerEntry>,
}

impl TransitionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the next clip in track order. `overlap` is the duration of
    /// the clip's own transition (0 for a plain concat boundary).
    pub fn record(&mut self, position: f64, overlap: f64) -> CinegraphResult<()> {
        let offset = self.total() + overlap;
        if overlap < 0.0 {
            return Err(CinegraphError::validation(
                "transition overlap must be non-negative",
            ));
        }
        if offset > position + crate::core::TIME_EPSILON {
            return Err(CinegraphError::timeline(format!(
                "cumulative transition overlap ({offset:.3}s) exceeds clip position \
                 ({position:.3}s); the clip would start before the timeline origin"
            )));
        }
        self.entries.push(LedgerEntry { position, offset });
        Ok(())
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Cumulative overlap recorded so far.
    pub fn total(&self) -> f64 {
        self.entries.last().map(|e| e.offset).unwrap_or(0.0)
    }

    /// Offset recorded for the clip at `index` in track order.
    pub fn offset_for(&self, index: usize) -> f64 {
        self.entries.get(index).map(|e| e.offset).unwrap_or(0.0)
    }

    /// Offset in force at a nominal timeline instant: the cumulative
    /// overlap of the last clip positioned at or before `t`. Overlays and
    /// cues use this to land in visual time.
    pub fn offset_at(&self, t: f64) -> f64 {
        self.entries
            .iter()
            .take_while(|e| e.position <= t + crate::core::TIME_EPSILON)
            .last()
            .map(|e| e.offset)
            .unwrap_or(0.0)
    }
}
